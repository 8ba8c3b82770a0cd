use crate::fsutil::MovePolicy;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub moves: Moves,
    #[serde(default)]
    pub headless: Headless,
    #[serde(default)]
    pub automation: Automation,
    #[serde(default)]
    pub pdf2docx: Pdf2Docx,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub output: Output,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    pub fn backend_record_path(&self) -> PathBuf {
        expand_tilde(&self.paths.backend_record)
    }

    /// `None` means the system temp directory.
    pub fn scratch_root(&self) -> Option<PathBuf> {
        if self.paths.scratch_dir.trim().is_empty() {
            None
        } else {
            Some(expand_tilde(&self.paths.scratch_dir))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub backend_record: String,
    pub scratch_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        let backend_record = if cfg!(windows) {
            "C:/PDF_Creator/config.json"
        } else {
            "~/.office-bridge/config.json"
        };
        Self {
            backend_record: backend_record.into(),
            scratch_dir: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Moves {
    pub attempts: u32,
    pub delay_ms: u64,
}
impl Default for Moves {
    fn default() -> Self {
        Self {
            attempts: 12,
            delay_ms: 250,
        }
    }
}
impl Moves {
    pub fn policy(&self) -> MovePolicy {
        MovePolicy {
            attempts: self.attempts,
            delay: Duration::from_millis(self.delay_ms),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Headless {
    pub timeout_seconds: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}
impl Default for Headless {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Automation {
    pub powershell_exe: String,
    pub word_visible: bool,
    pub powerpoint_visible: bool,
    pub timeout_seconds: u64,
}
impl Default for Automation {
    fn default() -> Self {
        Self {
            powershell_exe: "powershell".into(),
            word_visible: false,
            powerpoint_visible: true,
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pdf2Docx {
    pub python_exe: String,
    pub timeout_seconds: u64,
}
impl Default for Pdf2Docx {
    fn default() -> Self {
        Self {
            python_exe: "python".into(),
            timeout_seconds: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub print_report: bool,
}
impl Default for Output {
    fn default() -> Self {
        Self { print_report: true }
    }
}

/// 0 disables the timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        let home = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE"));
        if let Ok(home) = home {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}
