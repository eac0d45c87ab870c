//! Document ingestion and CRUD.

use std::sync::Arc;

use tracing::info;

use crate::cache::ResultCache;
use crate::error::CoreError;
use crate::models::{Document, DocumentView};
use crate::repository::{AnalysisRepository, DocumentRepository, JobRepository, RepositoryError};
use crate::storage::{detect_mime, mime_to_extension, BlobStore};

/// Service for uploading and managing documents.
pub struct DocumentService {
    docs: Arc<DocumentRepository>,
    analyses: Arc<AnalysisRepository>,
    jobs: Arc<JobRepository>,
    blobs: BlobStore,
    cache: Arc<ResultCache>,
}

impl DocumentService {
    pub fn new(
        docs: Arc<DocumentRepository>,
        analyses: Arc<AnalysisRepository>,
        jobs: Arc<JobRepository>,
        blobs: BlobStore,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            docs,
            analyses,
            jobs,
            blobs,
            cache,
        }
    }

    /// Store uploaded content and create its document record.
    pub fn ingest(
        &self,
        owner_id: &str,
        file_name: &str,
        content: &[u8],
    ) -> Result<Document, CoreError> {
        let mime_type = detect_mime(content, file_name);
        let content_hash = Document::compute_fingerprint(content);
        let path = self
            .blobs
            .save(content, &content_hash, mime_to_extension(&mime_type))
            .map_err(RepositoryError::Io)?;

        let doc = Document::new(
            owner_id.to_string(),
            file_name.to_string(),
            mime_type,
            content,
            path,
        );
        self.docs.save(&doc)?;
        info!(
            "Ingested document {} ({}, {} bytes) for {}",
            doc.id, doc.mime_type, doc.file_size, owner_id
        );
        Ok(doc)
    }

    pub fn get(&self, owner_id: &str, id: &str) -> Result<Document, CoreError> {
        self.docs
            .get(owner_id, id)?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", id)))
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<DocumentView>, CoreError> {
        let docs = self.docs.list(owner_id)?;
        Ok(docs.iter().map(DocumentView::from_document).collect())
    }

    /// Delete a document and everything hanging off it: queued jobs, the
    /// analysis, the cache entry, and the stored bytes (unless another
    /// document still shares the content-addressed blob).
    pub fn delete(&self, owner_id: &str, id: &str) -> Result<(), CoreError> {
        let doc = self
            .docs
            .get(owner_id, id)?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", id)))?;

        self.jobs.delete_for_document(id)?;
        self.analyses.delete_for_document(id)?;
        self.docs.delete(owner_id, id)?;
        self.cache.invalidate(id);

        if self.docs.count_by_content_hash(&doc.content_hash)? == 0 {
            self.blobs
                .delete(&doc.storage_path)
                .map_err(RepositoryError::Io)?;
        }

        info!("Deleted document {} for {}", id, owner_id);
        Ok(())
    }
}
