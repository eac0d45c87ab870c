//! In-memory result cache for completed analyses.
//!
//! Keyed by document id with a TTL. The persisted analysis is the source
//! of truth; this cache is a disposable projection of it, repopulated on
//! read misses and invalidated (or overwritten) by every analysis
//! mutation before the mutating call returns. Any internal problem
//! degrades to a miss rather than an error.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::models::Analysis;

/// Entries above this trigger a prune of expired values on insert.
const PRUNE_THRESHOLD: usize = 256;

/// A cached value with expiration time.
struct CacheEntry {
    analysis: Analysis,
    expires_at: Instant,
}

impl CacheEntry {
    fn new(analysis: Analysis, ttl: Duration) -> Self {
        Self {
            analysis,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// TTL cache of completed analyses.
pub struct ResultCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Get the cached analysis for a document, or None if expired/missing.
    pub fn get(&self, document_id: &str) -> Option<Analysis> {
        self.entries.read().ok().and_then(|guard| {
            guard.get(document_id).and_then(|entry| {
                if entry.is_expired() {
                    None
                } else {
                    Some(entry.analysis.clone())
                }
            })
        })
    }

    /// Store (or overwrite) the analysis for a document.
    pub fn set(&self, document_id: &str, analysis: &Analysis) {
        if let Ok(mut guard) = self.entries.write() {
            guard.insert(
                document_id.to_string(),
                CacheEntry::new(analysis.clone(), self.ttl),
            );
            if guard.len() > PRUNE_THRESHOLD {
                guard.retain(|_, entry| !entry.is_expired());
            }
        }
    }

    /// Drop the cached analysis for a document.
    pub fn invalidate(&self, document_id: &str) {
        if let Ok(mut guard) = self.entries.write() {
            guard.remove(document_id);
        }
    }
}
