//! Single-step converters. Each one picks an invoker for the configured
//! backend kind, clears the way for the output and runs it.

use crate::backend::{AutomationInvoker, HeadlessInvoker, Invoker, OfficeApp, Pdf2DocxInvoker};
use crate::config::Config;
use crate::error::Result;
use crate::format::Format;
use crate::fsutil::{ensure_parent_dir, remove_if_exists};
use crate::settings::{BackendConfig, BackendKind};
use std::path::Path;
use tracing::debug;

/// Everything a converter needs, resolved by the caller before the call.
#[derive(Debug, Clone, Copy)]
pub struct ConvertContext<'a> {
    pub cfg: &'a Config,
    pub backend: &'a BackendConfig,
}

pub type ConvertFn = fn(&ConvertContext<'_>, &Path, &Path) -> Result<()>;

pub fn docx_to_pdf(ctx: &ConvertContext<'_>, input: &Path, output: &Path) -> Result<()> {
    match ctx.backend.kind {
        BackendKind::HeadlessTool => run(
            &HeadlessInvoker::new(&ctx.backend.api_path, ctx.cfg),
            input,
            output,
            Format::Pdf,
        ),
        BackendKind::DocumentEditor => run(
            &AutomationInvoker::new(OfficeApp::Word, ctx.cfg),
            input,
            output,
            Format::Pdf,
        ),
    }
}

/// Handles both `.ppt` and `.pptx`.
pub fn ppt_to_pdf(ctx: &ConvertContext<'_>, input: &Path, output: &Path) -> Result<()> {
    match ctx.backend.kind {
        BackendKind::HeadlessTool => run(
            &HeadlessInvoker::new(&ctx.backend.api_path, ctx.cfg),
            input,
            output,
            Format::Pdf,
        ),
        // The configured editor is the word processor; slides go through PowerPoint.
        BackendKind::DocumentEditor => run(
            &AutomationInvoker::new(OfficeApp::PowerPoint, ctx.cfg),
            input,
            output,
            Format::Pdf,
        ),
    }
}

pub fn pdf_to_docx(ctx: &ConvertContext<'_>, input: &Path, output: &Path) -> Result<()> {
    match ctx.backend.kind {
        BackendKind::DocumentEditor => run(
            &AutomationInvoker::new(OfficeApp::Word, ctx.cfg),
            input,
            output,
            Format::Docx,
        ),
        BackendKind::HeadlessTool => run(&Pdf2DocxInvoker::new(ctx.cfg), input, output, Format::Docx),
    }
}

fn run(invoker: &dyn Invoker, input: &Path, output: &Path, target: Format) -> Result<()> {
    ensure_parent_dir(output)?;
    remove_if_exists(output);
    debug!(
        "invoking {} for {} -> {}",
        invoker.name(),
        input.display(),
        output.display()
    );
    invoker.convert(input, output, target)
}
