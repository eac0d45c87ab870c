//! The staged analysis pipeline.
//!
//! extract -> infer -> persist -> cache -> finalize, with a progress
//! checkpoint written around every stage. A failure at any point aborts
//! the remaining stages; whatever progress was already recorded stays
//! visible for diagnostics.

use chrono::Utc;
use tracing::info;

use super::{progress, AnalysisService};
use crate::error::CoreError;
use crate::extract::ExtractionError;
use crate::llm::InferenceError;
use crate::models::{Analysis, Document};

impl AnalysisService {
    /// Execute one pipeline attempt for a document already claimed into
    /// `processing`. On success the document ends `analyzed`; the caller
    /// decides what a failure means (retry or `error`).
    pub(crate) async fn run_pipeline(&self, doc: &Document) -> Result<Analysis, CoreError> {
        let started = std::time::Instant::now();
        info!("Running analysis pipeline for document {}", doc.id);

        // Each attempt is a fresh run: progress restarts at the accepted
        // checkpoint and climbs monotonically from there.
        self.docs.reset_progress(&doc.id, progress::ACCEPTED)?;

        // Stage 1: extract text from the stored bytes.
        self.docs.set_progress(&doc.id, progress::EXTRACTING)?;
        let extraction = self
            .extractor
            .extract(&doc.storage_path, &doc.mime_type)
            .await?;
        let char_count = extraction.text.trim().chars().count();
        if char_count < self.pipeline_cfg.min_text_chars {
            return Err(ExtractionError::Unreadable { chars: char_count }.into());
        }
        self.docs.set_progress(&doc.id, progress::EXTRACTED)?;

        // Stage 2: inference, bounded by the configured timeout.
        self.docs.set_progress(&doc.id, progress::INFERRING)?;
        let timeout = std::time::Duration::from_secs(self.pipeline_cfg.inference_timeout_secs);
        let structured = tokio::time::timeout(
            timeout,
            self.provider.infer(&extraction.text, &doc.display_name),
        )
        .await
        .map_err(|_| InferenceError::Timeout(self.pipeline_cfg.inference_timeout_secs))??;
        self.docs.set_progress(&doc.id, progress::INFERRED)?;

        // Stage 3: persist, replacing any prior analysis for the document.
        let analysis = Analysis {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: doc.id.clone(),
            summary: structured.summary,
            clauses: structured.clauses,
            risks: structured.risks,
            key_findings: structured.key_findings,
            overall_risk_score: structured.overall_risk_score,
            model: structured.model,
            token_cost: structured.token_cost,
            duration_ms: started.elapsed().as_millis() as u64,
            completed_at: Utc::now(),
        };
        self.analyses.upsert(&analysis)?;
        self.docs.set_progress(&doc.id, progress::PERSISTED)?;

        // Stage 4: write through to the result cache.
        self.cache.set(&doc.id, &analysis);
        self.docs.set_progress(&doc.id, progress::CACHED)?;

        // Stage 5: finalize.
        if !self.docs.complete_analysis(&doc.id, &analysis.id)? {
            // The document was deleted mid-run; don't leave an orphan
            // analysis behind.
            self.analyses.delete_for_document(&doc.id)?;
            self.cache.invalidate(&doc.id);
            return Err(CoreError::NotFound(format!("document {}", doc.id)));
        }

        info!(
            "Document {} analyzed: {} clauses, {} risks, score {}, {} units, {}ms",
            doc.id,
            analysis.clauses.len(),
            analysis.risks.len(),
            analysis.overall_risk_score,
            extraction.unit_count,
            analysis.duration_ms
        );
        Ok(analysis)
    }
}
