use super::{Invoker, absolute, process, scratch::ScratchDir};
use crate::config::{Config, timeout_from_secs};
use crate::error::{ConvertError, Result};
use crate::format::Format;
use crate::fsutil::{MovePolicy, atomic_move_with_retries, guess_ext};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

/// Runs a headless conversion command (LibreOffice `soffice`) into a scratch
/// directory and moves the result into place.
pub struct HeadlessInvoker {
    exe: PathBuf,
    label: String,
    extra_args: Vec<String>,
    timeout: Option<Duration>,
    scratch_root: Option<PathBuf>,
    moves: MovePolicy,
}

impl HeadlessInvoker {
    pub fn new(exe: &Path, cfg: &Config) -> Self {
        let label = exe
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "headless tool".to_string());
        Self {
            exe: exe.to_path_buf(),
            label,
            extra_args: cfg.headless.extra_args.clone(),
            timeout: timeout_from_secs(cfg.headless.timeout_seconds),
            scratch_root: cfg.scratch_root(),
            moves: cfg.moves.policy(),
        }
    }

    fn command(&self, input: &Path, outdir: &Path, target: Format) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.args(["--headless", "--norestore", "--nolockcheck", "--nodefault"]);
        cmd.args(&self.extra_args);
        cmd.arg("--convert-to").arg(target.ext());
        cmd.arg("--outdir").arg(outdir);
        cmd.arg(input);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd
    }
}

impl Invoker for HeadlessInvoker {
    fn name(&self) -> &str {
        &self.label
    }

    fn convert(&self, input: &Path, output: &Path, target: Format) -> Result<()> {
        let input = absolute(input)?;
        let scratch = ScratchDir::create(self.scratch_root.as_deref(), "lo_convert_")?;

        let mut cmd = self.command(&input, scratch.path(), target);
        let out = process::run(&mut cmd, &self.label, self.timeout)?;
        if !out.status.success() {
            return Err(ConvertError::failed(
                &self.label,
                format!("exited with {}", out.status),
            ));
        }

        let produced = find_output(scratch.path(), &input, target)
            .ok_or_else(|| ConvertError::BackendProducedNoOutput {
                backend: self.label.clone(),
                expected: expected_name(scratch.path(), &input, target),
            })?;
        debug!("{} produced {}", self.label, produced.display());

        atomic_move_with_retries(&produced, output, &self.moves)?;
        info!(
            "{} converted {} -> {}",
            self.label,
            input.display(),
            output.display()
        );
        Ok(())
    }
}

fn expected_name(dir: &Path, input: &Path, target: Format) -> PathBuf {
    let mut name = input.file_stem().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(target.ext());
    dir.join(name)
}

/// Exact `<stem>.<ext>` first; otherwise the first file in `dir` whose stem and
/// extension match, ignoring case.
pub fn find_output(dir: &Path, input: &Path, target: Format) -> Option<PathBuf> {
    let expected = expected_name(dir, input, target);
    if expected.is_file() {
        return Some(expected);
    }

    let stem = input.file_stem()?.to_string_lossy().to_lowercase();
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .find(|p| {
            p.is_file()
                && guess_ext(p) == target.ext()
                && p
                    .file_stem()
                    .is_some_and(|s| s.to_string_lossy().to_lowercase() == stem)
        })
}
