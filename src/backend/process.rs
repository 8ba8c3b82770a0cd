use crate::error::{ConvertError, Result};
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Output};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Owns a spawned backend process; a process still running when the guard
/// drops is killed and reaped.
pub struct ChildGuard {
    child: Option<Child>,
    backend: String,
}

impl ChildGuard {
    pub fn new(child: Child, backend: &str) -> Self {
        Self {
            child: Some(child),
            backend: backend.to_string(),
        }
    }

    fn try_wait(&mut self) -> std::io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Ok(None),
        }
    }

    fn take_pipes(&mut self) -> (Option<std::process::ChildStdout>, Option<std::process::ChildStderr>) {
        match self.child.as_mut() {
            Some(child) => (child.stdout.take(), child.stderr.take()),
            None => (None, None),
        }
    }

    fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Ok(Some(_)) = child.try_wait() {
            return;
        }
        if let Err(e) = child.kill() {
            warn!("failed to kill {} (pid {}): {e}", self.backend, child.id());
        }
        if let Err(e) = child.wait() {
            warn!("failed to reap {}: {e}", self.backend);
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Kills a process by id. Used for processes a backend started on our
/// behalf that are not our children (COM servers launched by the system).
pub fn kill_pid(pid: u32) -> std::io::Result<()> {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("taskkill");
        c.args(["/F", "/PID"]).arg(pid.to_string());
        c
    } else {
        // The shell builtin, since a `kill` binary is not always installed.
        let mut c = Command::new("sh");
        c.arg("-c").arg(format!("kill -9 {pid}"));
        c
    };
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::null());
    cmd.stderr(std::process::Stdio::null());
    hide_console(&mut cmd);
    let status = cmd.status()?;
    if status.success() {
        Ok(())
    } else {
        Err(std::io::Error::other(format!("kill {pid} exited with {status}")))
    }
}

/// Spawns `cmd` and waits for it, optionally bounded by `timeout`.
///
/// A spawn failure means the backend is unavailable. Exit status is returned
/// to the caller untouched; only waiting failures and timeouts are errors here.
pub fn run(cmd: &mut Command, backend: &str, timeout: Option<Duration>) -> Result<Output> {
    hide_console(cmd);
    debug!("{backend} run {:?} timeout={:?}", cmd, timeout);

    let child = cmd.spawn().map_err(|e| {
        ConvertError::unavailable(
            backend,
            format!("cannot launch {}: {e}", cmd.get_program().to_string_lossy()),
        )
    })?;
    let mut guard = ChildGuard::new(child, backend);

    // Drain pipes while waiting so a chatty child can't block on a full buffer.
    let (stdout, stderr) = guard.take_pipes();
    let stdout_thread = drain(stdout);
    let stderr_thread = drain(stderr);

    let start = Instant::now();
    loop {
        let polled = guard
            .try_wait()
            .map_err(|e| ConvertError::failed(backend, format!("waiting for process: {e}")))?;
        if let Some(status) = polled {
            let stdout = join(stdout_thread, backend)?;
            let stderr = join(stderr_thread, backend)?;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                warn!("{backend} timed out after {:?}", limit);
                guard.terminate();
                // Grandchildren may still hold the pipes open; the readers are
                // left detached instead of joined.
                drop(stdout_thread);
                drop(stderr_thread);
                return Err(ConvertError::failed(
                    backend,
                    format!("timed out after {:?}", limit),
                ));
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> JoinHandle<std::io::Result<Vec<u8>>> {
    std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut r) = reader {
            r.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn join(handle: JoinHandle<std::io::Result<Vec<u8>>>, backend: &str) -> Result<Vec<u8>> {
    handle
        .join()
        .map_err(|_| ConvertError::failed(backend, "output reader thread panicked"))?
        .map_err(|e| ConvertError::failed(backend, format!("reading process output: {e}")))
}

#[cfg(windows)]
fn hide_console(cmd: &mut Command) {
    use std::os::windows::process::CommandExt;
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    cmd.creation_flags(CREATE_NO_WINDOW);
}

#[cfg(not(windows))]
fn hide_console(_cmd: &mut Command) {}
