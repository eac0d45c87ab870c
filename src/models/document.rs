//! Document model for uploaded contract files.
//!
//! Content is identified by SHA-256 hash, enabling byte-identical
//! re-uploads to be recognized and served from a prior analysis.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::PathBuf;

/// Processing status of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Uploaded,
    Processing,
    Analyzed,
    Error,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Processing => "processing",
            Self::Analyzed => "analyzed",
            Self::Error => "error",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(Self::Uploaded),
            "processing" => Some(Self::Processing),
            "analyzed" => Some(Self::Analyzed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// An uploaded contract document.
///
/// The pipeline is the only writer of `status`, `progress`,
/// `error_message`, and `analysis_id` after the initial upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier for this document.
    pub id: String,
    /// Identifier of the owning user. Every repository operation filters
    /// on this, so a wrong-owner lookup behaves like a missing row.
    pub owner_id: String,
    /// Display name, usually the uploaded filename.
    pub display_name: String,
    /// MIME type of the stored content.
    pub mime_type: String,
    /// Size in bytes.
    pub file_size: u64,
    /// SHA-256 hash of the raw bytes, used for dedup.
    pub content_hash: String,
    /// Path to the stored file.
    pub storage_path: PathBuf,
    /// Current processing status.
    pub status: DocumentStatus,
    /// Pipeline progress, 0-100. Meaningful while status is `processing`.
    pub progress: u8,
    /// Failure message from the last pipeline run, if it failed.
    pub error_message: Option<String>,
    /// Id of the current analysis, set when a run completes.
    pub analysis_id: Option<String>,
    /// When the document was uploaded.
    pub created_at: DateTime<Utc>,
    /// When the document was last modified.
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Compute the SHA-256 content fingerprint of raw bytes.
    pub fn compute_fingerprint(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }

    /// Create a new document record for uploaded content.
    pub fn new(
        owner_id: String,
        display_name: String,
        mime_type: String,
        content: &[u8],
        storage_path: PathBuf,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id,
            display_name,
            mime_type,
            file_size: content.len() as u64,
            content_hash: Self::compute_fingerprint(content),
            storage_path,
            status: DocumentStatus::Uploaded,
            progress: 0,
            error_message: None,
            analysis_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Client-facing document data, without internal storage details.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub display_name: String,
    pub mime_type: String,
    pub file_size: u64,
    pub content_hash: String,
    pub status: DocumentStatus,
    pub progress: u8,
    pub error_message: Option<String>,
    pub analysis_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentView {
    pub fn from_document(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            display_name: doc.display_name.clone(),
            mime_type: doc.mime_type.clone(),
            file_size: doc.file_size,
            content_hash: doc.content_hash.clone(),
            status: doc.status,
            progress: doc.progress,
            error_message: doc.error_message.clone(),
            analysis_id: doc.analysis_id.clone(),
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}
