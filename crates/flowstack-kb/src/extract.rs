use lopdf::Document;

use flowstack_core::error::{FlowstackError, Result};

/// Extract plain text from a PDF payload, pages concatenated in order.
///
/// A well-formed PDF with no extractable text (e.g. a pure scan) yields an
/// empty string rather than an error; the caller decides what emptiness
/// means.
pub fn pdf_text(bytes: &[u8]) -> Result<String> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| FlowstackError::Extraction(format!("Failed to load PDF: {e}")))?;

    let pages = doc.get_pages();
    let mut page_numbers: Vec<u32> = pages.keys().copied().collect();
    page_numbers.sort();

    let mut text = String::new();
    for page in page_numbers {
        if let Ok(page_text) = doc.extract_text(&[page]) {
            text.push_str(&page_text);
        }
    }

    Ok(text)
}
