//! Upload bytes to plain text

use crate::error::{Error, Result};
use crate::types::FileType;

/// Turns uploaded file bytes into text. Implementations may block.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String>;
}

/// Extractor for the supported upload types
#[derive(Debug, Clone, Copy, Default)]
pub struct FileExtractor;

impl TextExtractor for FileExtractor {
    fn extract(&self, filename: &str, data: &[u8]) -> Result<String> {
        if data.is_empty() {
            return Err(Error::invalid("File is empty"));
        }

        match FileType::from_filename(filename) {
            FileType::Pdf => extract_pdf(data),
            FileType::Txt | FileType::Markdown => String::from_utf8(data.to_vec())
                .map_err(|_| Error::invalid(format!("{} is not valid UTF-8 text", filename))),
            FileType::Unknown => Err(Error::invalid(format!(
                "Unsupported file type: {}. Supported types are .pdf, .txt, .text, .md",
                filename
            ))),
        }
    }
}

/// Extract PDF text page by page, prefixing each non-empty page with a marker
fn extract_pdf(data: &[u8]) -> Result<String> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(data)
        .map_err(|e| Error::invalid(format!("Error reading PDF: {}", e)))?;

    if pages.is_empty() {
        return Err(Error::invalid("PDF file is empty - no pages found"));
    }

    let text = join_pages(pages.iter().map(String::as_str));
    if text.is_empty() {
        return Err(Error::invalid("PDF file contains no extractable text"));
    }

    tracing::debug!("Extracted {} pages, {} chars from PDF", pages.len(), text.len());
    Ok(text)
}

fn join_pages<'a>(pages: impl Iterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for (i, page) in pages.enumerate() {
        let page = page.replace('\0', "");
        if page.trim().is_empty() {
            continue;
        }
        text.push_str(&format!("\n--- Page {} ---\n", i + 1));
        text.push_str(&page);
    }
    text.trim().to_string()
}
