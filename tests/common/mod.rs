//! Shared test harness: an analysis service wired to mock extraction and
//! inference collaborators over a temporary data directory.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use clauselens::cache::ResultCache;
use clauselens::config::{PipelineConfig, QueueConfig};
use clauselens::extract::{Extraction, ExtractionError, TextExtractor};
use clauselens::llm::{AnalysisProvider, InferenceError, StructuredAnalysis};
use clauselens::models::{Clause, Document, DocumentStatus, Risk, RiskLevel};
use clauselens::repository::{AnalysisRepository, DocumentRepository, JobRepository};
use clauselens::services::{AnalysisService, DocumentService, NoteService};
use clauselens::storage::BlobStore;

pub const OWNER: &str = "alice";

/// Extractor returning a configurable text, ignoring the stored bytes.
pub struct MockExtractor {
    text: Mutex<String>,
}

impl MockExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: Mutex::new(text.to_string()),
        }
    }

    pub fn set_text(&self, text: &str) {
        *self.text.lock().unwrap() = text.to_string();
    }
}

#[async_trait]
impl TextExtractor for MockExtractor {
    async fn extract(&self, _path: &Path, _mime: &str) -> Result<Extraction, ExtractionError> {
        Ok(Extraction {
            text: self.text.lock().unwrap().clone(),
            unit_count: 1,
        })
    }
}

/// Inference mock: counts calls, optionally sleeps, and pops scripted
/// failures before succeeding.
pub struct MockProvider {
    calls: AtomicUsize,
    delay: Mutex<Duration>,
    failures: Mutex<VecDeque<InferenceError>>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Mutex::new(Duration::ZERO),
            failures: Mutex::new(VecDeque::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn push_failure(&self, failure: InferenceError) {
        self.failures.lock().unwrap().push_back(failure);
    }
}

#[async_trait]
impl AnalysisProvider for MockProvider {
    async fn infer(
        &self,
        _text: &str,
        display_name: &str,
    ) -> Result<StructuredAnalysis, InferenceError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(failure) = self.failures.lock().unwrap().pop_front() {
            return Err(failure);
        }

        Ok(StructuredAnalysis {
            summary: format!("analysis #{} of {}", call, display_name),
            clauses: vec![
                Clause {
                    category: "termination".to_string(),
                    excerpt: "either party may terminate on thirty days notice".to_string(),
                    risk_level: RiskLevel::Medium,
                    explanation: "termination without cause".to_string(),
                    notes: Vec::new(),
                },
                Clause {
                    category: "liability".to_string(),
                    excerpt: "liability is unlimited".to_string(),
                    risk_level: RiskLevel::Critical,
                    explanation: "no cap on damages".to_string(),
                    notes: Vec::new(),
                },
            ],
            risks: vec![Risk {
                severity: RiskLevel::High,
                category: "liability".to_string(),
                description: "uncapped exposure".to_string(),
                recommendation: "negotiate a cap".to_string(),
            }],
            key_findings: vec!["unlimited liability".to_string()],
            overall_risk_score: 66,
            model: "mock-model".to_string(),
            token_cost: Some(128),
        })
    }
}

pub struct Harness {
    pub _dir: TempDir,
    pub docs: Arc<DocumentRepository>,
    pub analyses: Arc<AnalysisRepository>,
    pub jobs: Arc<JobRepository>,
    pub cache: Arc<ResultCache>,
    pub extractor: Arc<MockExtractor>,
    pub provider: Arc<MockProvider>,
    pub analysis: Arc<AnalysisService>,
    pub documents: Arc<DocumentService>,
    pub notes: Arc<NoteService>,
}

impl Harness {
    pub fn new(queue_enabled: bool) -> Self {
        let queue = QueueConfig {
            enabled: queue_enabled,
            workers: 2,
            max_attempts: 3,
            retry_base_secs: 0,
            stall_timeout_secs: 600,
            poll_interval_ms: 20,
        };
        let pipeline = PipelineConfig {
            min_text_chars: 10,
            inference_timeout_secs: 60,
        };
        Self::with_config(queue, pipeline)
    }

    pub fn with_config(queue: QueueConfig, pipeline: PipelineConfig) -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("test.db");

        let docs = Arc::new(DocumentRepository::new(&db_path).unwrap());
        let analyses = Arc::new(AnalysisRepository::new(&db_path).unwrap());
        let jobs = Arc::new(JobRepository::new(&db_path).unwrap());
        let blobs = BlobStore::new(&dir.path().join("documents")).unwrap();
        let cache = Arc::new(ResultCache::new(Duration::from_secs(3600)));

        let extractor = Arc::new(MockExtractor::new(
            "This agreement is made between the parties for consulting services.",
        ));
        let provider = Arc::new(MockProvider::new());

        let analysis = Arc::new(AnalysisService::new(
            Arc::clone(&docs),
            Arc::clone(&analyses),
            Arc::clone(&jobs),
            Arc::clone(&extractor) as Arc<dyn TextExtractor>,
            Arc::clone(&provider) as Arc<dyn AnalysisProvider>,
            Arc::clone(&cache),
            pipeline,
            queue,
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

        Self {
            _dir: dir,
            docs,
            analyses,
            jobs,
            cache,
            extractor,
            provider,
            analysis,
            documents,
            notes,
        }
    }

    pub fn ingest(&self, content: &[u8]) -> Document {
        self.documents.ingest(OWNER, "contract.txt", content).unwrap()
    }

    /// Poll until the document reaches the given status, or panic.
    pub async fn wait_for(&self, document_id: &str, status: DocumentStatus) -> Document {
        for _ in 0..500 {
            let doc = self.docs.get(OWNER, document_id).unwrap().unwrap();
            if doc.status == status {
                return doc;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!(
            "timed out waiting for document {} to reach {:?}",
            document_id, status
        );
    }
}
