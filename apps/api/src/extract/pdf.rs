use lopdf::Document;
use tracing::debug;

use super::ExtractError;

/// Concatenates page text in page-number order. A page without extractable
/// text contributes nothing; only an unreadable document is an error.
pub(super) fn extract_pdf(data: &[u8]) -> Result<String, ExtractError> {
    let doc = Document::load_mem(data).map_err(|e| ExtractError::Pdf(e.to_string()))?;

    let mut text = String::new();
    for page_number in doc.get_pages().keys() {
        match doc.extract_text(&[*page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            Err(e) => debug!("no extractable text on pdf page {page_number}: {e}"),
        }
    }
    Ok(text)
}
