//! clauselens - contract document analysis service.
//!
//! Ingests uploaded contract documents, runs a staged analysis pipeline
//! (text extraction, LLM inference, persistence, caching) in background
//! workers, and serves results to polling readers. Byte-identical
//! re-uploads are deduplicated by content hash so the expensive inference
//! stage runs at most once per distinct document.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod llm;
pub mod models;
pub mod repository;
pub mod server;
pub mod services;
pub mod storage;

pub use error::CoreError;
