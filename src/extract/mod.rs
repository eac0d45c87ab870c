//! Text extraction from stored documents.
//!
//! The pipeline consumes extraction through the [`TextExtractor`] trait;
//! the production implementation shells out to poppler's `pdftotext` for
//! PDFs and reads text formats directly.

mod pdftotext;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

pub use pdftotext::ExternalToolExtractor;

/// Errors that can occur during text extraction.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("external tool not found: {0}")]
    ToolNotFound(String),

    #[error("extraction failed: {0}")]
    Failed(String),

    /// The source produced too little text to analyze.
    #[error("document is unreadable: extracted only {chars} characters of text")]
    Unreadable { chars: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result of text extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Extracted text content.
    pub text: String,
    /// Pages for PDFs, 1 for single-unit formats.
    pub unit_count: u32,
}

/// Extracts analyzable text from a stored document.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, path: &Path, mime_type: &str) -> Result<Extraction, ExtractionError>;
}
