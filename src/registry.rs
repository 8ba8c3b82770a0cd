use crate::convert::{self, ConvertContext, ConvertFn};
use crate::error::{ConvertError, Result};
use crate::format::{ConversionKey, Format};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Direct single-step conversions only; nothing is chained.
static TABLE: [(ConversionKey, ConvertFn); 4] = [
    (ConversionKey::new(Format::Docx, Format::Pdf), convert::docx_to_pdf),
    (ConversionKey::new(Format::Ppt, Format::Pdf), convert::ppt_to_pdf),
    (ConversionKey::new(Format::Pptx, Format::Pdf), convert::ppt_to_pdf),
    (ConversionKey::new(Format::Pdf, Format::Docx), convert::pdf_to_docx),
];

#[derive(Clone, Copy)]
pub struct Converter {
    key: ConversionKey,
    run: ConvertFn,
}

impl Converter {
    pub fn key(&self) -> ConversionKey {
        self.key
    }

    pub fn convert(&self, ctx: &ConvertContext<'_>, input: &Path, output: &Path) -> Result<()> {
        (self.run)(ctx, input, output)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter").field("key", &self.key).finish()
    }
}

/// Looks up the converter for a pair of format tags, ignoring case.
pub fn get_converter(src_ext: &str, dst_ext: &str) -> Result<Converter> {
    let unsupported = || ConvertError::UnsupportedConversion {
        from: src_ext.trim().to_ascii_lowercase(),
        to: dst_ext.trim().to_ascii_lowercase(),
    };
    let from = Format::from_ext(src_ext).ok_or_else(unsupported)?;
    let to = Format::from_ext(dst_ext).ok_or_else(unsupported)?;
    let key = ConversionKey::new(from, to);
    TABLE
        .iter()
        .find(|(k, _)| *k == key)
        .map(|&(key, run)| Converter { key, run })
        .ok_or_else(unsupported)
}

pub fn available_targets_for(src_ext: &str) -> BTreeSet<Format> {
    let Some(from) = Format::from_ext(src_ext) else {
        return BTreeSet::new();
    };
    TABLE
        .iter()
        .filter(|(k, _)| k.from == from)
        .map(|(k, _)| k.to)
        .collect()
}

pub fn supported_keys() -> Vec<ConversionKey> {
    TABLE.iter().map(|(k, _)| *k).collect()
}
