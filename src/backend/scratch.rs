use crate::error::{ConvertError, Result};
use crate::fsutil::ensure_dir;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

/// Exclusively-owned staging directory for one backend invocation. It is
/// deleted with all its contents when dropped.
pub struct ScratchDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl ScratchDir {
    pub fn create(root: Option<&Path>, prefix: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match root {
            Some(root) => {
                ensure_dir(root)
                    .map_err(|e| ConvertError::io(format!("create scratch root {}", root.display()), e))?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| ConvertError::io("create scratch dir", e))?;

        let path = dir.path().to_path_buf();
        debug!("scratch dir {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            if let Err(e) = dir.close() {
                warn!("failed to remove scratch dir {}: {e}", self.path.display());
            }
        }
    }
}
