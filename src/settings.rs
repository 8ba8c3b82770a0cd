//! The persisted backend record: which external program performs conversions.
//!
//! The record is a small JSON file written when the user picks a backend and
//! read back before every conversion.

use crate::config::expand_tilde;
use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// A headless document-conversion command (LibreOffice `soffice`).
    HeadlessTool,
    /// An interactive editor driven through its automation interface (Word).
    DocumentEditor,
}

impl BackendKind {
    /// Guesses the kind from an executable's file name.
    pub fn infer(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.starts_with("soffice") || name.starts_with("libreoffice") {
            Some(BackendKind::HeadlessTool)
        } else if name.starts_with("winword") {
            Some(BackendKind::DocumentEditor)
        } else {
            None
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::HeadlessTool => f.write_str("headless_tool"),
            BackendKind::DocumentEditor => f.write_str("document_editor"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendConfig {
    pub api_path: PathBuf,
    pub kind: BackendKind,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    api_path: Option<String>,
    #[serde(default)]
    kind: Option<BackendKind>,
}

pub fn load(path: &Path) -> Result<BackendConfig> {
    let missing = |reason: String| ConvertError::ConfigurationMissing {
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| missing(format!("cannot read: {e}")))?;
    let rec: RawRecord =
        serde_json::from_str(&raw).map_err(|e| missing(format!("malformed record: {e}")))?;

    let api_path = rec
        .api_path
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| missing("api_path missing".into()))?;
    let api_path = PathBuf::from(api_path);

    // Records written before `kind` existed only carry the path.
    let kind = match rec.kind {
        Some(k) => k,
        None => BackendKind::infer(&api_path).ok_or_else(|| {
            missing(format!(
                "kind missing and not inferable from {}",
                api_path.display()
            ))
        })?,
    };

    Ok(BackendConfig { api_path, kind })
}

/// Writes the record next to a `.tmp` sibling and renames it into place.
pub fn save(path: &Path, backend: &BackendConfig) -> Result<()> {
    let io_err = |what: &str, e| ConvertError::io(format!("{what} {}", path.display()), e);

    crate::fsutil::ensure_parent_dir(path)?;
    let body = serde_json::json!({
        "api_path": backend.api_path,
        "kind": backend.kind,
    });
    let text = serde_json::to_string_pretty(&body)
        .map_err(|e| io_err("serialize", std::io::Error::other(e)))?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    std::fs::write(&tmp, text).map_err(|e| io_err("write", e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err("replace", e))?;

    info!(
        "saved backend {} ({}) to {}",
        backend.api_path.display(),
        backend.kind,
        path.display()
    );
    Ok(())
}

/// Strips whitespace and quotes, and expands a leading `~/`.
pub fn normalize_candidate(raw: &str) -> PathBuf {
    let trimmed = raw.trim().trim_matches('"').trim_matches('\'');
    expand_tilde(trimmed)
}

pub fn validate_candidate(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(ConvertError::io(
            format!("backend candidate {}", path.display()),
            std::io::Error::new(std::io::ErrorKind::NotFound, "not a file"),
        ));
    }
    if BackendKind::infer(path).is_none() {
        warn!(
            "{} does not look like soffice or winword; saving anyway",
            path.display()
        );
    }
    Ok(())
}
