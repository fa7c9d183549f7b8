//! PDF text extraction

use std::path::Path;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::error::{Error, Result};

/// How long pdf-extract may run before it is abandoned
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Text pulled from a PDF
#[derive(Debug, Clone)]
pub struct ExtractedPdf {
    /// All pages concatenated in order
    pub text: String,
    /// Number of pages in the document
    pub pages: usize,
}

/// PDF text extractor
pub struct PdfExtractor;

impl PdfExtractor {
    /// Extract text from a PDF file
    pub fn extract_file(path: &Path) -> Result<ExtractedPdf> {
        let data = std::fs::read(path).map_err(|e| {
            Error::file_parse(path.display().to_string(), format!("Failed to read: {}", e))
        })?;
        Self::extract(&path.display().to_string(), &data)
    }

    /// Extract text from PDF bytes
    ///
    /// Pages are read one by one with lopdf. When that yields nothing, pdf-extract
    /// gets one bounded attempt at the whole document.
    pub fn extract(filename: &str, data: &[u8]) -> Result<ExtractedPdf> {
        let doc = lopdf::Document::load_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("Failed to load PDF: {}", e)))?;

        let pages = doc.get_pages();
        let page_count = pages.len();
        let mut text = String::new();

        for page_number in pages.keys() {
            match doc.extract_text(&[*page_number]) {
                Ok(page_text) => text.push_str(&page_text),
                Err(e) => {
                    tracing::debug!("Could not extract text from page {}: {}", page_number, e)
                }
            }
        }

        if text.trim().is_empty() {
            tracing::warn!("Page extraction produced no text for {}, trying pdf-extract", filename);
            text = Self::extract_with_timeout(filename, data)?;
        }

        let text = cleanup_pdf_text(&text);
        if text.trim().is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }

        tracing::info!(
            "Extracted {} characters from {} pages of {}",
            text.chars().count(),
            page_count,
            filename
        );

        Ok(ExtractedPdf {
            text,
            pages: page_count,
        })
    }

    /// Run pdf-extract on a worker thread, giving up after a bounded wait
    fn extract_with_timeout(filename: &str, data: &[u8]) -> Result<String> {
        let data = data.to_vec();
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let _ = tx.send(pdf_extract::extract_text_from_mem(&data));
        });

        match rx.recv_timeout(EXTRACT_TIMEOUT) {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(Error::file_parse(filename, format!("pdf-extract failed: {}", e))),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::file_parse(
                filename,
                format!("Extraction timed out after {}s", EXTRACT_TIMEOUT.as_secs()),
            )),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(Error::file_parse(filename, "Extraction thread crashed"))
            }
        }
    }
}

/// Replace typographic glyphs with plain equivalents and drop NULs
fn cleanup_pdf_text(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\0' => {}
            '\u{2010}' | '\u{2011}' | '\u{2013}' => result.push('-'),
            '\u{2014}' => result.push_str("--"),
            '\u{2018}' | '\u{2019}' => result.push('\''),
            '\u{201C}' | '\u{201D}' => result.push('"'),
            '\u{2022}' => result.push_str("* "),
            '\u{2026}' => result.push_str("..."),
            '\u{00A0}' => result.push(' '),
            '\u{FB00}' => result.push_str("ff"),
            '\u{FB01}' => result.push_str("fi"),
            '\u{FB02}' => result.push_str("fl"),
            '\u{FB03}' => result.push_str("ffi"),
            '\u{FB04}' => result.push_str("ffl"),
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_replaces_glyphs() {
        let cleaned = cleanup_pdf_text("\u{201C}e\u{FB03}cient\u{201D}\u{00A0}\u{2013} it\u{2019}s\0");
        assert_eq!(cleaned, "\"efficient\" - it's");
    }

    #[test]
    fn test_non_pdf_bytes_are_rejected() {
        let err = PdfExtractor::extract("notes.pdf", b"plain text, not a PDF").unwrap_err();
        assert!(err.to_string().contains("notes.pdf"));
    }

    #[test]
    fn test_missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(PdfExtractor::extract_file(&dir.path().join("your_document.pdf")).is_err());
    }
}
