use super::{Invoker, ScriptResult, absolute, process, scratch::ScratchDir, stderr_text, write_script};
use crate::config::{Config, timeout_from_secs};
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::fsutil::remove_if_exists;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

const SCRIPT_NAME: &str = "office_automation.ps1";
const SCRIPT: &str = include_str!("../../scripts/office_automation.ps1");
const HOST: &str = "powershell";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfficeApp {
    Word,
    PowerPoint,
}

impl OfficeApp {
    /// Save-as format code understood by this application, if it can write
    /// `target` at all.
    pub fn format_code(self, target: Format) -> Option<u32> {
        match (self, target) {
            (OfficeApp::Word, Format::Pdf) => Some(17), // wdFormatPDF
            (OfficeApp::Word, Format::Docx) => Some(16), // wdFormatDocumentDefault
            (OfficeApp::PowerPoint, Format::Pdf) => Some(32), // ppSaveAsPDF
            _ => None,
        }
    }

    fn script_arg(self) -> &'static str {
        match self {
            OfficeApp::Word => "Word",
            OfficeApp::PowerPoint => "PowerPoint",
        }
    }
}

impl fmt::Display for OfficeApp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.script_arg())
    }
}

/// Drives a live Word or PowerPoint instance over COM through a PowerShell
/// host. The application writes straight to the final path and is quit by
/// the script. Neither the host nor an instance the script launched outlives
/// the call, and a failed call leaves no output behind.
pub struct AutomationInvoker {
    app: OfficeApp,
    host: PathBuf,
    visible: bool,
    timeout: Option<Duration>,
    scratch_root: Option<PathBuf>,
}

impl AutomationInvoker {
    pub fn new(app: OfficeApp, cfg: &Config) -> Self {
        let visible = match app {
            OfficeApp::Word => cfg.automation.word_visible,
            OfficeApp::PowerPoint => cfg.automation.powerpoint_visible,
        };
        Self {
            app,
            host: PathBuf::from(&cfg.automation.powershell_exe),
            visible,
            timeout: timeout_from_secs(cfg.automation.timeout_seconds),
            scratch_root: cfg.scratch_root(),
        }
    }

    fn command(
        &self,
        script: &Path,
        input: &Path,
        output: &Path,
        code: u32,
        pid_file: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.host);
        cmd.args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass", "-File"]);
        cmd.arg(script);
        cmd.arg("-App").arg(self.app.script_arg());
        cmd.arg("-InputPath").arg(input);
        cmd.arg("-OutputPath").arg(output);
        cmd.arg("-FileFormat").arg(code.to_string());
        cmd.arg("-Visible").arg(if self.visible { "1" } else { "0" });
        cmd.arg("-PidFile").arg(pid_file);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd
    }
}

impl Invoker for AutomationInvoker {
    fn name(&self) -> &str {
        self.app.script_arg()
    }

    fn convert(&self, input: &Path, output: &Path, target: Format) -> Result<()> {
        let code = self
            .app
            .format_code(target)
            .ok_or_else(|| ConvertError::UnsupportedConversion {
                from: self.app.to_string(),
                to: target.to_string(),
            })?;
        let input = absolute(input)?;
        let output = absolute(output)?;

        let scratch = ScratchDir::create(self.scratch_root.as_deref(), "office_automation_")?;
        let script = write_script(scratch.path(), SCRIPT_NAME, SCRIPT)?;

        let instance = OfficeInstance::new(scratch.path().join("office.pid"), self.app);
        let res = self.run_script(&script, &input, &output, code, instance.pid_file());
        // The application must be gone before a half-written output is removed.
        drop(instance);
        if res.is_err() {
            remove_if_exists(&output);
        }
        res?;

        info!(
            "{} converted {} -> {} (format {code})",
            self.app,
            input.display(),
            output.display()
        );
        Ok(())
    }
}

impl AutomationInvoker {
    fn run_script(
        &self,
        script: &Path,
        input: &Path,
        output: &Path,
        code: u32,
        pid_file: &Path,
    ) -> Result<()> {
        let mut cmd = self.command(script, input, output, code, pid_file);
        let out = process::run(&mut cmd, HOST, self.timeout)?;
        let report = ScriptResult::from_stdout(&out.stdout);
        debug!("{} automation status={} report={:?}", self.app, out.status, report);

        match report {
            Some(r) if r.failed_at_launch() => {
                return Err(ConvertError::unavailable(self.name(), r.error_text()));
            }
            Some(r) if !r.ok => return Err(ConvertError::failed(self.name(), r.error_text())),
            Some(_) if out.status.success() => {}
            _ => {
                return Err(ConvertError::failed(
                    self.name(),
                    format!("{HOST} exited with {}: {}", out.status, stderr_text(&out.stderr)),
                ));
            }
        }

        if !output.is_file() {
            return Err(ConvertError::BackendProducedNoOutput {
                backend: self.name().to_string(),
                expected: output.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// The Office process launched for one conversion, as recorded by the script.
///
/// The script deletes the record after `Quit()` succeeds. A record still
/// present on drop means the instance may be alive (host killed on timeout,
/// `Quit()` failed), so it is killed by id. Failures are logged only.
struct OfficeInstance {
    pid_file: PathBuf,
    app: OfficeApp,
}

impl OfficeInstance {
    fn new(pid_file: PathBuf, app: OfficeApp) -> Self {
        Self { pid_file, app }
    }

    fn pid_file(&self) -> &Path {
        &self.pid_file
    }
}

impl Drop for OfficeInstance {
    fn drop(&mut self) {
        let Ok(raw) = std::fs::read_to_string(&self.pid_file) else {
            return;
        };
        let Ok(pid) = raw.trim().trim_start_matches('\u{feff}').parse::<u32>() else {
            warn!("unreadable {} pid record: {:?}", self.app, raw.trim());
            return;
        };
        warn!("{} instance {pid} still running; killing it", self.app);
        if let Err(e) = process::kill_pid(pid) {
            warn!("failed to kill {} instance {pid}: {e}", self.app);
        }
        let _ = std::fs::remove_file(&self.pid_file);
    }
}