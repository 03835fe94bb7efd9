// PDF text extraction
// Wraps pdf-extract and normalises page text before chunking


use itertools::Itertools;
use std::fs;
use std::panic;
use std::path::Path;
use tracing::{debug, warn};

use crate::{QaError, Result};

/// Pulls plain text out of PDF files
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfExtractor;

impl PdfExtractor {
    #[inline]
    pub fn new() -> Self {
        Self
    }

    /// Extract the text of every page, whitespace-normalised
    ///
    /// Each page contributes its text followed by a single space, so the
    /// result of a multi-page document ends with a trailing space.
    #[inline]
    pub fn extract_text<P: AsRef<Path>>(&self, path: P) -> Result<String> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| {
            QaError::Extraction(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let pages = self.extract_pages(&bytes).map_err(|e| match e {
            QaError::Extraction(msg) => {
                QaError::Extraction(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;

        debug!("Extracted {} pages from {}", pages.len(), path.display());
        Ok(join_pages(&pages))
    }

    /// Extract raw per-page text from an in-memory PDF
    #[inline]
    pub fn extract_pages(&self, bytes: &[u8]) -> Result<Vec<String>> {
        // The parser panics on some malformed inputs
        let outcome = panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes));

        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(QaError::Extraction(format!("Invalid PDF: {e}"))),
            Err(_) => {
                warn!("PDF parser panicked while reading document");
                Err(QaError::Extraction(
                    "Invalid PDF: parser failed on malformed document".to_string(),
                ))
            }
        }
    }
}

/// Collapse every run of whitespace into a single space and trim the ends
#[inline]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().join(" ")
}

/// Normalise each page and append it followed by a single space
#[inline]
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> String {
    let mut text = String::new();
    for page in pages {
        text.push_str(&normalize_whitespace(page.as_ref()));
        text.push(' ');
    }
    text
}
