use crate::error::Result;
use crate::settings::{self, BackendConfig};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolves the configured backend from its persisted record.
///
/// Nothing is cached: every call re-reads the record, so switching backends
/// between conversions needs no restart.
#[derive(Debug, Clone)]
pub struct BackendLocator {
    record_path: PathBuf,
}

impl BackendLocator {
    pub fn new(record_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
        }
    }

    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    pub fn locate(&self) -> Result<BackendConfig> {
        let backend = settings::load(&self.record_path)?;
        debug!(
            "backend {} kind={} (record {})",
            backend.api_path.display(),
            backend.kind,
            self.record_path.display()
        );
        Ok(backend)
    }
}
