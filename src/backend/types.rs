use serde::{Deserialize, Serialize};

/// The one-line JSON report printed by the embedded helper scripts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptResult {
    pub ok: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Step that failed; `"launch"` means the application or library itself
    /// could not be started.
    #[serde(default)]
    pub stage: Option<String>,
}

impl ScriptResult {
    /// Parses the last non-empty line of a script's stdout.
    pub fn from_stdout(stdout: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(stdout);
        let line = text.lines().rev().find(|l| !l.trim().is_empty())?;
        serde_json::from_str(line.trim()).ok()
    }

    pub fn failed_at_launch(&self) -> bool {
        !self.ok && self.stage.as_deref() == Some("launch")
    }

    pub fn error_text(&self) -> String {
        self.error
            .clone()
            .unwrap_or_else(|| "unknown error".to_string())
    }
}
