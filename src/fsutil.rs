use crate::error::{ConvertError, Result};
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// Bounded retry policy for relocating a finished artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for MovePolicy {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay: Duration::from_millis(250),
        }
    }
}

/// Lower-cased extension without the dot; empty when the path has none.
pub fn guess_ext(path: &Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default()
}

pub fn ensure_dir(p: &Path) -> io::Result<()> {
    fs::create_dir_all(p)
}

pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent)
            .map_err(|e| ConvertError::io(format!("create_dir_all {}", parent.display()), e)),
        _ => Ok(()),
    }
}

/// Best effort: a failure here resurfaces when the new file is moved into place.
pub fn remove_if_exists(path: &Path) {
    let meta = match fs::symlink_metadata(path) {
        Ok(m) => m,
        Err(_) => return,
    };
    let res = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match res {
        Ok(()) => debug!("removed stale output {}", path.display()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            warn!("no permission to remove stale output {}: {e}", path.display())
        }
        Err(e) => warn!("could not remove stale output {}: {e}", path.display()),
    }
}

pub fn atomic_move_with_retries(src: &Path, dst: &Path, policy: &MovePolicy) -> Result<()> {
    move_with_retries(src, dst, policy, move_once)
}

/// Retry loop around a single move attempt. Each failed attempt is followed by
/// `policy.delay` unless it was the last one.
pub fn move_with_retries<F>(src: &Path, dst: &Path, policy: &MovePolicy, mut attempt: F) -> Result<()>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    ensure_parent_dir(dst)?;
    let attempts = policy.attempts.max(1);
    let mut last_err = None;
    for n in 1..=attempts {
        match attempt(src, dst) {
            Ok(()) => {
                debug!("moved {} -> {} (attempt {n})", src.display(), dst.display());
                return Ok(());
            }
            Err(e) => {
                debug!("move attempt {n}/{attempts} failed: {e}");
                last_err = Some(e);
                if n < attempts {
                    std::thread::sleep(policy.delay);
                }
            }
        }
    }
    Err(ConvertError::MoveFailed {
        from: src.to_path_buf(),
        to: dst.to_path_buf(),
        source: last_err.unwrap_or_else(|| io::Error::other("move not attempted")),
    })
}

/// One relocation attempt: rename, or copy-then-delete across volumes.
pub fn move_once(src: &Path, dst: &Path) -> io::Result<()> {
    match fs::rename(src, dst) {
        Ok(()) => Ok(()),
        Err(e) if is_cross_device(&e) => copy_then_delete(src, dst),
        Err(e) => Err(e),
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    if err.kind() == io::ErrorKind::CrossesDevices {
        return true;
    }
    // EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows
    if cfg!(windows) {
        err.raw_os_error() == Some(17)
    } else {
        err.raw_os_error() == Some(18)
    }
}

/// Cross-volume half of [`move_once`]. The copy lands in a temp file beside
/// `dst` with the source's permissions and is renamed over it, so `dst` is
/// never observed half-written.
pub fn copy_then_delete(src: &Path, dst: &Path) -> io::Result<()> {
    let parent = dst
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut staged = tempfile::NamedTempFile::new_in(parent)?;
    {
        let mut reader = fs::File::open(src)?;
        io::copy(&mut reader, staged.as_file_mut())?;
    }
    fs::set_permissions(staged.path(), fs::metadata(src)?.permissions())?;
    staged.as_file().sync_all()?;
    staged.persist(dst).map_err(|e| e.error)?;
    fs::remove_file(src)
}
