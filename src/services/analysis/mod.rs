//! Analysis orchestration.
//!
//! Owns the per-document lifecycle: dedup resolution, the transition
//! into `processing` (guarded so only one run is ever active per
//! document), dispatch to the durable queue or an inline background
//! task, and the cache-first read path for completed results.

mod pipeline;
pub mod progress;

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::cache::ResultCache;
use crate::config::{PipelineConfig, QueueConfig};
use crate::error::CoreError;
use crate::extract::TextExtractor;
use crate::llm::AnalysisProvider;
use crate::models::{Analysis, Document, DocumentStatus};
use crate::repository::{
    AnalysisRepository, DocumentRepository, JobRepository, ProcessingClaim,
};

pub use progress::StatusReport;

/// Outcome of an analyze request. Callers get one of three answers,
/// never a generic success.
#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AnalyzeOutcome {
    /// A pipeline run was started; poll status for progress.
    Accepted,
    /// A completed analysis already exists for this document.
    AlreadyAnalyzed { analysis: Box<Analysis> },
    /// Byte-identical content was already analyzed for this owner; its
    /// result was adopted without running the pipeline.
    DuplicateOfExisting {
        source_document_id: String,
        analysis: Box<Analysis>,
    },
}

/// A completed analysis plus where the read was served from.
#[derive(Debug)]
pub struct FetchedAnalysis {
    pub analysis: Analysis,
    pub cache_hit: bool,
}

/// Orchestrates analysis runs for documents.
pub struct AnalysisService {
    pub(crate) docs: Arc<DocumentRepository>,
    pub(crate) analyses: Arc<AnalysisRepository>,
    pub(crate) jobs: Arc<JobRepository>,
    pub(crate) extractor: Arc<dyn TextExtractor>,
    pub(crate) provider: Arc<dyn AnalysisProvider>,
    pub(crate) cache: Arc<ResultCache>,
    pub(crate) pipeline_cfg: PipelineConfig,
    pub(crate) queue_cfg: QueueConfig,
}

impl AnalysisService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        docs: Arc<DocumentRepository>,
        analyses: Arc<AnalysisRepository>,
        jobs: Arc<JobRepository>,
        extractor: Arc<dyn TextExtractor>,
        provider: Arc<dyn AnalysisProvider>,
        cache: Arc<ResultCache>,
        pipeline_cfg: PipelineConfig,
        queue_cfg: QueueConfig,
    ) -> Self {
        Self {
            docs,
            analyses,
            jobs,
            extractor,
            provider,
            cache,
            pipeline_cfg,
            queue_cfg,
        }
    }

    /// Request analysis of a document.
    ///
    /// Returns immediately: the actual pipeline runs on a queue worker or
    /// a spawned background task. A request against a document whose run
    /// is already active fails with [`CoreError::ConcurrentRun`] rather
    /// than racing a second pipeline.
    pub async fn request_analysis(
        self: &Arc<Self>,
        owner_id: &str,
        document_id: &str,
        force_refresh: bool,
    ) -> Result<AnalyzeOutcome, CoreError> {
        let doc = self
            .docs
            .get(owner_id, document_id)?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", document_id)))?;

        if !force_refresh {
            // A finished document keeps serving its existing result.
            if doc.status == DocumentStatus::Analyzed {
                if let Some(existing) = self.read_through(document_id)? {
                    return Ok(AnalyzeOutcome::AlreadyAnalyzed {
                        analysis: Box::new(existing),
                    });
                }
                // Analysis row is gone despite the status; fall through
                // and run the pipeline again.
                warn!(
                    "Document {} is analyzed but has no analysis record; re-running",
                    document_id
                );
            }

            if let Some(outcome) = self.resolve_duplicate(owner_id, &doc)? {
                return Ok(outcome);
            }
        }

        self.claim(owner_id, document_id)?;

        if force_refresh {
            // The stale result must not outlive the request that asked
            // for a fresh one.
            self.cache.invalidate(document_id);
        }

        if self.queue_cfg.enabled {
            let job_id = self.jobs.enqueue(document_id, owner_id, force_refresh)?;
            debug!("Enqueued analysis job {} for document {}", job_id, document_id);
        } else {
            let service = Arc::clone(self);
            let owner = owner_id.to_string();
            let id = document_id.to_string();
            tokio::spawn(async move {
                service.run_inline(&owner, &id).await;
            });
        }

        Ok(AnalyzeOutcome::Accepted)
    }

    /// Dedup resolution: adopt the analysis of the most recent completed
    /// document with identical content, if one exists.
    ///
    /// Only a fully analyzed prior document short-circuits; matches that
    /// are still processing or failed are treated as unrelated.
    fn resolve_duplicate(
        &self,
        owner_id: &str,
        doc: &Document,
    ) -> Result<Option<AnalyzeOutcome>, CoreError> {
        let prior = match self
            .docs
            .find_completed_duplicate(owner_id, &doc.content_hash, &doc.id)?
        {
            Some(p) => p,
            None => return Ok(None),
        };
        let prior_analysis = match self.analyses.get_by_document(&prior.id)? {
            Some(a) => a,
            None => return Ok(None),
        };

        // Claim the document even though no pipeline will run, so a
        // concurrent request cannot start one underneath us.
        self.claim(owner_id, &doc.id)?;

        let copy = prior_analysis.duplicate_for(&doc.id);
        self.analyses.upsert(&copy)?;
        self.cache.set(&doc.id, &copy);
        self.docs.complete_analysis(&doc.id, &copy.id)?;

        info!(
            "Document {} deduplicated against {} (fingerprint {})",
            doc.id,
            prior.id,
            &doc.content_hash[..8.min(doc.content_hash.len())]
        );
        Ok(Some(AnalyzeOutcome::DuplicateOfExisting {
            source_document_id: prior.id,
            analysis: Box::new(copy),
        }))
    }

    fn claim(&self, owner_id: &str, document_id: &str) -> Result<(), CoreError> {
        match self
            .docs
            .try_begin_processing(owner_id, document_id, progress::ACCEPTED)?
        {
            ProcessingClaim::Started => Ok(()),
            ProcessingClaim::AlreadyRunning => {
                Err(CoreError::ConcurrentRun(document_id.to_string()))
            }
            ProcessingClaim::NotFound => {
                Err(CoreError::NotFound(format!("document {}", document_id)))
            }
        }
    }

    /// Client-facing processing status for a document.
    pub fn status(&self, owner_id: &str, document_id: &str) -> Result<StatusReport, CoreError> {
        let doc = self
            .docs
            .get(owner_id, document_id)?
            .ok_or_else(|| CoreError::NotFound(format!("document {}", document_id)))?;
        Ok(StatusReport::from_document(&doc))
    }

    /// Fetch the completed analysis for a document, cache first.
    pub fn get_analysis(
        &self,
        owner_id: &str,
        document_id: &str,
    ) -> Result<FetchedAnalysis, CoreError> {
        if self.docs.get(owner_id, document_id)?.is_none() {
            return Err(CoreError::NotFound(format!("document {}", document_id)));
        }

        if let Some(analysis) = self.cache.get(document_id) {
            return Ok(FetchedAnalysis {
                analysis,
                cache_hit: true,
            });
        }

        let analysis = self
            .analyses
            .get_by_document(document_id)?
            .ok_or_else(|| {
                CoreError::NotFound(format!("no analysis for document {}", document_id))
            })?;
        self.cache.set(document_id, &analysis);
        Ok(FetchedAnalysis {
            analysis,
            cache_hit: false,
        })
    }

    /// Cache read with fallback to the store, without a not-found error.
    fn read_through(&self, document_id: &str) -> Result<Option<Analysis>, CoreError> {
        if let Some(analysis) = self.cache.get(document_id) {
            return Ok(Some(analysis));
        }
        match self.analyses.get_by_document(document_id)? {
            Some(analysis) => {
                self.cache.set(document_id, &analysis);
                Ok(Some(analysis))
            }
            None => Ok(None),
        }
    }

    /// Job counts by status, for the status surfaces.
    pub fn job_counts(&self) -> Result<Vec<(String, u64)>, CoreError> {
        Ok(self.jobs.status_counts()?)
    }

    /// Whether the inference backend is reachable.
    pub async fn inference_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Exponential backoff delay before the given attempt's retry.
    pub(crate) fn backoff_delay_secs(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        self.queue_cfg
            .retry_base_secs
            .saturating_mul(1u64 << exponent)
    }

    /// Run the pipeline with retries as an in-process background task.
    ///
    /// Used when no durable queue is configured. Failures are recorded on
    /// the document, never silently dropped.
    pub(crate) async fn run_inline(&self, owner_id: &str, document_id: &str) {
        let max_attempts = self.queue_cfg.max_attempts.max(1);
        for attempt in 1..=max_attempts {
            let doc = match self.docs.get(owner_id, document_id) {
                Ok(Some(doc)) => doc,
                Ok(None) => return,
                Err(e) => {
                    error!("Failed to load document {}: {}", document_id, e);
                    return;
                }
            };
            if doc.status != DocumentStatus::Processing {
                // Deleted or finished by someone else; nothing to do.
                return;
            }

            match self.run_pipeline(&doc).await {
                Ok(_) => return,
                Err(err) => {
                    let message = err.to_string();
                    if err.is_retryable() && attempt < max_attempts {
                        let delay = self.backoff_delay_secs(attempt);
                        warn!(
                            "Analysis attempt {}/{} failed for document {}: {}; retrying in {}s",
                            attempt, max_attempts, document_id, message, delay
                        );
                        tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                    } else {
                        error!(
                            "Analysis failed for document {}: {}",
                            document_id, message
                        );
                        if let Err(e) = self.docs.mark_failed(document_id, &message) {
                            error!(
                                "Failed to record error state for document {}: {}",
                                document_id, e
                            );
                        }
                        return;
                    }
                }
            }
        }
    }
}
