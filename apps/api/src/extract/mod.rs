//! Text Extractor: turns resume bytes into plain text by MIME type.
//!
//! Supported: plain text, PDF, and word-processor XML (.docx).
//! A failure here never aborts a session; the caller records it as an
//! error entry for that one resume.

mod docx;
mod pdf;

use thiserror::Error;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("failed to read pdf: {0}")]
    Pdf(String),

    #[error("failed to parse docx: {0}")]
    Docx(String),
}

/// Extracts plain text from `data` according to `mime_type`.
///
/// MIME parameters (`; charset=...`) are ignored. Plain text is passed
/// through with invalid UTF-8 sequences replaced rather than rejected.
pub fn extract(mime_type: &str, data: &[u8]) -> Result<String, ExtractError> {
    let essence = mime_essence(mime_type);
    match essence.as_str() {
        MIME_TEXT => Ok(String::from_utf8_lossy(data).into_owned()),
        MIME_PDF => pdf::extract_pdf(data),
        MIME_DOCX => docx::extract_docx(data),
        _ => Err(ExtractError::UnsupportedFormat(mime_type.to_string())),
    }
}

fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
