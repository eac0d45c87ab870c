//! Domain models for documents, analyses, and background jobs.

pub mod analysis;
pub mod document;
pub mod job;

pub use analysis::{Analysis, Clause, Note, Risk, RiskLevel};
pub use document::{Document, DocumentStatus, DocumentView};
pub use job::{AnalysisJob, JobStatus};
