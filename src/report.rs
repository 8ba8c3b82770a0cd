use crate::format::Format;
use crate::settings::BackendKind;
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;

/// Summary of one finished conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionReport {
    pub input: String,
    pub output: String,
    pub from: Format,
    pub to: Format,
    pub backend: BackendKind,
    pub backend_path: String,
    pub started: String,
    pub finished: String,
    pub elapsed_ms: u64,
    pub output_bytes: u64,
}

pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}
