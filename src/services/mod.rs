//! Service layer for clauselens business logic.
//!
//! Domain logic separated from transport concerns, usable from the CLI,
//! the web server, or tests.

pub mod analysis;
pub mod documents;
pub mod notes;
pub mod worker;

use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResultCache;
use crate::config::Settings;
use crate::extract::ExternalToolExtractor;
use crate::llm::LlmClient;
use crate::repository::{AnalysisRepository, DocumentRepository, JobRepository};
use crate::storage::BlobStore;

pub use analysis::{AnalysisService, AnalyzeOutcome, FetchedAnalysis, StatusReport};
pub use documents::DocumentService;
pub use notes::NoteService;
pub use worker::WorkerPool;

/// The fully wired service graph for one process.
#[derive(Clone)]
pub struct ServiceSet {
    pub documents: Arc<DocumentService>,
    pub analysis: Arc<AnalysisService>,
    pub notes: Arc<NoteService>,
}

impl ServiceSet {
    /// Construct every service from settings, sharing one database, blob
    /// store, and result cache.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        settings.ensure_dirs()?;
        let db_path = settings.database_path();

        let docs = Arc::new(DocumentRepository::new(&db_path)?);
        let analyses = Arc::new(AnalysisRepository::new(&db_path)?);
        let jobs = Arc::new(JobRepository::new(&db_path)?);
        let blobs = BlobStore::new(&settings.documents_dir())?;
        let cache = Arc::new(ResultCache::new(Duration::from_secs(
            settings.cache.ttl_secs,
        )));

        let extractor = Arc::new(ExternalToolExtractor::new());
        let provider = Arc::new(LlmClient::new(settings.llm.clone())?);

        let analysis = Arc::new(AnalysisService::new(
            Arc::clone(&docs),
            Arc::clone(&analyses),
            Arc::clone(&jobs),
            extractor,
            provider,
            Arc::clone(&cache),
            settings.pipeline.clone(),
            settings.queue.clone(),
        ));

        let documents = Arc::new(DocumentService::new(
            Arc::clone(&docs),
            Arc::clone(&analyses),
            Arc::clone(&jobs),
            blobs,
            Arc::clone(&cache),
        ));

        let notes = Arc::new(NoteService::new(
            Arc::clone(&docs),
            Arc::clone(&analyses),
            Arc::clone(&cache),
        ));

        Ok(Self {
            documents,
            analysis,
            notes,
        })
    }
}
