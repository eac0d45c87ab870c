//! AI inference collaborator.
//!
//! The pipeline consumes inference through the [`AnalysisProvider`]
//! trait: extracted text and a display name in, a structured contract
//! review out. The production implementation talks to an Ollama API.

mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{LlmClient, LlmConfig, DEFAULT_ANALYSIS_PROMPT};

use crate::models::{Clause, Risk};

/// Structured result returned by the inference backend.
#[derive(Debug, Clone)]
pub struct StructuredAnalysis {
    pub summary: String,
    /// Clauses as identified by the model; notes are always empty here.
    pub clauses: Vec<Clause>,
    pub risks: Vec<Risk>,
    pub key_findings: Vec<String>,
    /// Overall risk score, 0-100.
    pub overall_risk_score: u8,
    /// Identifier of the model that produced the result.
    pub model: String,
    /// Token cost reported by the backend, when available.
    pub token_cost: Option<u64>,
}

/// Errors that can occur during inference.
///
/// Quota and credential failures are split out because retrying them
/// blindly cannot help; they need operator intervention.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("inference connection error: {0}")]
    Connection(String),

    #[error("inference API error: {0}")]
    Api(String),

    #[error("malformed model output: {0}")]
    MalformedOutput(String),

    #[error("inference quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("invalid inference credentials: {0}")]
    InvalidCredentials(String),

    #[error("inference timed out after {0}s")]
    Timeout(u64),
}

impl InferenceError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            InferenceError::QuotaExceeded(_) | InferenceError::InvalidCredentials(_)
        )
    }
}

/// Produces a structured analysis from extracted document text.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    async fn infer(
        &self,
        text: &str,
        display_name: &str,
    ) -> Result<StructuredAnalysis, InferenceError>;

    /// Whether the backend is reachable. Defaults to optimistic.
    async fn is_available(&self) -> bool {
        true
    }
}
