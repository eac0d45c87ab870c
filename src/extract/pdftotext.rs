//! Extraction via external tools and direct file reads.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{Extraction, ExtractionError, TextExtractor};

/// Handle command output, extracting stdout on success.
fn handle_cmd_output(
    result: std::io::Result<std::process::Output>,
    tool_name: &str,
) -> Result<String, ExtractionError> {
    match result {
        Ok(output) => {
            if output.status.success() {
                Ok(String::from_utf8_lossy(&output.stdout).to_string())
            } else {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(ExtractionError::Failed(format!("{}: {}", tool_name, stderr)))
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ExtractionError::ToolNotFound(tool_name.to_string()))
        }
        Err(e) => Err(ExtractionError::Io(e)),
    }
}

/// Text extractor that uses external tools.
pub struct ExternalToolExtractor;

impl ExternalToolExtractor {
    pub fn new() -> Self {
        Self
    }

    async fn extract_pdf(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let output = Command::new("pdftotext")
            .arg("-layout")
            .arg(path)
            .arg("-")
            .output()
            .await;
        let text = handle_cmd_output(output, "pdftotext")?;
        let unit_count = self.pdf_page_count(path).await.unwrap_or(1);
        Ok(Extraction { text, unit_count })
    }

    /// Page count via `pdfinfo`, falling back to 1 when unavailable.
    async fn pdf_page_count(&self, path: &Path) -> Option<u32> {
        let output = Command::new("pdfinfo").arg(path).output().await;
        let stdout = handle_cmd_output(output, "pdfinfo").ok()?;
        stdout
            .lines()
            .find(|line| line.starts_with("Pages:"))
            .and_then(|line| line.trim_start_matches("Pages:").trim().parse().ok())
    }

    async fn extract_text_file(&self, path: &Path) -> Result<Extraction, ExtractionError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Extraction {
            text: String::from_utf8_lossy(&bytes).to_string(),
            unit_count: 1,
        })
    }
}

impl Default for ExternalToolExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextExtractor for ExternalToolExtractor {
    async fn extract(&self, path: &Path, mime_type: &str) -> Result<Extraction, ExtractionError> {
        debug!("Extracting text from {} ({})", path.display(), mime_type);
        match mime_type {
            "application/pdf" => self.extract_pdf(path).await,
            m if m.starts_with("text/") => self.extract_text_file(path).await,
            other => Err(ExtractionError::UnsupportedFileType(other.to_string())),
        }
    }
}
