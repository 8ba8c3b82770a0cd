use super::{Invoker, ScriptResult, absolute, process, scratch::ScratchDir, stderr_text, write_script};
use crate::config::{Config, expand_tilde, timeout_from_secs};
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::fsutil::{MovePolicy, atomic_move_with_retries};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

const BACKEND: &str = "pdf2docx";
const SCRIPT_NAME: &str = "pdf2docx_runner.py";
const SCRIPT: &str = include_str!("../../scripts/pdf2docx_runner.py");
const EXIT_MISSING_LIBRARY: i32 = 3;

/// PDF -> DOCX through the Python `pdf2docx` package, used when the
/// configured backend is the headless tool.
pub struct Pdf2DocxInvoker {
    python_exe: PathBuf,
    timeout: Option<Duration>,
    scratch_root: Option<PathBuf>,
    moves: MovePolicy,
}

impl Pdf2DocxInvoker {
    pub fn new(cfg: &Config) -> Self {
        Self {
            python_exe: expand_tilde(cfg.pdf2docx.python_exe.trim()),
            timeout: timeout_from_secs(cfg.pdf2docx.timeout_seconds),
            scratch_root: cfg.scratch_root(),
            moves: cfg.moves.policy(),
        }
    }
}

impl Invoker for Pdf2DocxInvoker {
    fn name(&self) -> &str {
        BACKEND
    }

    fn convert(&self, input: &Path, output: &Path, target: Format) -> Result<()> {
        if target != Format::Docx {
            return Err(ConvertError::UnsupportedConversion {
                from: Format::Pdf.to_string(),
                to: target.to_string(),
            });
        }
        let input = absolute(input)?;
        let scratch = ScratchDir::create(self.scratch_root.as_deref(), "pdf2docx_")?;
        let script = write_script(scratch.path(), SCRIPT_NAME, SCRIPT)?;

        let mut staged_name = output.file_stem().map(OsString::from).unwrap_or_default();
        staged_name.push(".docx");
        let staged = scratch.path().join(staged_name);

        let mut cmd = Command::new(&self.python_exe);
        cmd.arg(&script);
        cmd.arg("--input").arg(&input);
        cmd.arg("--output").arg(&staged);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let out = process::run(&mut cmd, BACKEND, self.timeout)?;
        let report = ScriptResult::from_stdout(&out.stdout);
        debug!("pdf2docx status={} report={:?}", out.status, report);

        if !out.status.success() {
            let detail = report
                .as_ref()
                .map(ScriptResult::error_text)
                .unwrap_or_else(|| stderr_text(&out.stderr));
            if out.status.code() == Some(EXIT_MISSING_LIBRARY)
                || report.as_ref().is_some_and(ScriptResult::failed_at_launch)
            {
                return Err(ConvertError::unavailable(BACKEND, detail));
            }
            return Err(ConvertError::failed(BACKEND, detail));
        }

        if !staged.is_file() {
            return Err(ConvertError::BackendProducedNoOutput {
                backend: BACKEND.to_string(),
                expected: staged,
            });
        }

        atomic_move_with_retries(&staged, output, &self.moves)?;
        info!(
            "pdf2docx converted {} -> {}",
            input.display(),
            output.display()
        );
        Ok(())
    }
}
