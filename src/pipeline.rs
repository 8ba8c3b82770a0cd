use crate::{
    config::Config,
    convert::ConvertContext,
    error::{ConvertError, Result},
    fsutil::guess_ext,
    locator::BackendLocator,
    registry,
    report::{ConversionReport, now_rfc3339},
};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Runs one conversion end to end: dispatch, backend lookup, invocation.
pub struct Pipeline {
    cfg: Config,
    locator: BackendLocator,
}

impl Pipeline {
    pub fn new(cfg: &Config) -> Self {
        Self {
            cfg: cfg.clone(),
            locator: BackendLocator::new(cfg.backend_record_path()),
        }
    }

    /// Formats come from the two paths' extensions. Dispatch and backend
    /// lookup both happen before anything touches the filesystem.
    pub fn convert_file(&self, input: &Path, output: &Path) -> Result<ConversionReport> {
        let started_at = now_rfc3339();
        let started = Instant::now();

        let converter = registry::get_converter(&guess_ext(input), &guess_ext(output))?;
        let backend = self.locator.locate()?;

        if !input.is_file() {
            return Err(ConvertError::io(
                format!("input {}", input.display()),
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a file"),
            ));
        }

        let key = converter.key();
        debug!("dispatch {key} via {}", backend.kind);
        let ctx = ConvertContext {
            cfg: &self.cfg,
            backend: &backend,
        };
        converter.convert(&ctx, input, output)?;

        let output_bytes = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            "converted {} ({key}) in {elapsed_ms}ms -> {} ({output_bytes} bytes)",
            input.display(),
            output.display()
        );

        Ok(ConversionReport {
            input: input.display().to_string(),
            output: output.display().to_string(),
            from: key.from,
            to: key.to,
            backend: backend.kind,
            backend_path: backend.api_path.display().to_string(),
            started: started_at,
            finished: now_rfc3339(),
            elapsed_ms,
            output_bytes,
        })
    }
}
