pub mod automation;
pub mod headless;
pub mod pdf2docx;
pub mod process;
pub mod scratch;
pub mod types;

use crate::error::{ConvertError, Result};
use crate::format::Format;
use std::path::{Path, PathBuf};

pub use automation::{AutomationInvoker, OfficeApp};
pub use headless::HeadlessInvoker;
pub use pdf2docx::Pdf2DocxInvoker;
pub use types::ScriptResult;

/// One strategy for turning the file at `input` into `output` in `target`
/// format using an external program.
pub trait Invoker {
    fn name(&self) -> &str;
    fn convert(&self, input: &Path, output: &Path, target: Format) -> Result<()>;
}

pub(crate) fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path)
        .map_err(|e| ConvertError::io(format!("resolve {}", path.display()), e))
}

/// Drops an embedded helper script into `dir` so the host interpreter can run it.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, body)
        .map_err(|e| ConvertError::io(format!("write {}", path.display()), e))?;
    Ok(path)
}

pub(crate) fn stderr_text(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr).trim().to_string();
    if text.is_empty() {
        "no diagnostic output".to_string()
    } else {
        text
    }
}
