use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Docx,
    Ppt,
    Pptx,
}

impl Format {
    pub const ALL: [Format; 4] = [Format::Pdf, Format::Docx, Format::Ppt, Format::Pptx];

    /// Parses a format tag such as `"PDF"`, `"docx"` or `".pptx"`.
    pub fn from_ext(raw: &str) -> Option<Self> {
        let tag = raw.trim().trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|f| f.ext().eq_ignore_ascii_case(tag))
    }

    pub fn ext(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Docx => "docx",
            Format::Ppt => "ppt",
            Format::Pptx => "pptx",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ext())
    }
}

/// Ordered (source, destination) pair used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConversionKey {
    pub from: Format,
    pub to: Format,
}

impl ConversionKey {
    pub const fn new(from: Format, to: Format) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for ConversionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}
