//! Progress checkpoints and the client-facing status payload.
//!
//! Each pipeline stage reports a fixed checkpoint before and after its
//! work, so pollers see how far a run got even when a later stage fails.
//! Progress only moves forward within a run; a drop back to the accepted
//! checkpoint (together with a status change) means a new run started.

use serde::Serialize;

use crate::models::{Document, DocumentStatus};

/// The request was accepted and a run is starting.
pub const ACCEPTED: u8 = 10;
/// Text extraction started.
pub const EXTRACTING: u8 = 20;
/// Text extraction finished.
pub const EXTRACTED: u8 = 50;
/// Inference call started.
pub const INFERRING: u8 = 60;
/// Inference call finished.
pub const INFERRED: u8 = 85;
/// Analysis written to the store.
pub const PERSISTED: u8 = 90;
/// Analysis written through to the cache.
pub const CACHED: u8 = 95;
/// Run finalized.
pub const DONE: u8 = 100;

/// Status payload served to polling clients.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub status: DocumentStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusReport {
    pub fn from_document(doc: &Document) -> Self {
        let progress = match doc.status {
            DocumentStatus::Uploaded => 0,
            DocumentStatus::Processing => doc.progress,
            DocumentStatus::Analyzed => DONE,
            DocumentStatus::Error => 0,
        };
        Self {
            status: doc.status,
            progress,
            error_message: if doc.status == DocumentStatus::Error {
                doc.error_message.clone()
            } else {
                None
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn doc() -> Document {
        Document::new(
            "alice".to_string(),
            "contract.pdf".to_string(),
            "application/pdf".to_string(),
            b"bytes",
            PathBuf::from("/tmp/x"),
        )
    }

    #[test]
    fn test_report_tracks_status() {
        let mut d = doc();
        let report = StatusReport::from_document(&d);
        assert_eq!(report.status, DocumentStatus::Uploaded);
        assert_eq!(report.progress, 0);

        d.status = DocumentStatus::Processing;
        d.progress = EXTRACTED;
        assert_eq!(StatusReport::from_document(&d).progress, EXTRACTED);

        d.status = DocumentStatus::Analyzed;
        assert_eq!(StatusReport::from_document(&d).progress, DONE);

        d.status = DocumentStatus::Error;
        d.error_message = Some("unreadable".to_string());
        let report = StatusReport::from_document(&d);
        assert_eq!(report.progress, 0);
        assert_eq!(report.error_message.as_deref(), Some("unreadable"));
    }

    #[test]
    fn test_checkpoints_are_ordered() {
        let sequence = [
            ACCEPTED, EXTRACTING, EXTRACTED, INFERRING, INFERRED, PERSISTED, CACHED, DONE,
        ];
        assert!(sequence.windows(2).all(|w| w[0] < w[1]));
    }
}
