//! Clause note management.
//!
//! Notes are addressed by (clause index, note index) into the current
//! analysis. Every mutation persists the analysis and drops the cached
//! copy before returning, so a reader can never observe a stale note
//! list through the cache.

use std::sync::Arc;

use chrono::Utc;

use crate::cache::ResultCache;
use crate::error::CoreError;
use crate::models::{Analysis, Note};
use crate::repository::{AnalysisRepository, DocumentRepository};

/// Service for reviewer notes on analysis clauses.
pub struct NoteService {
    docs: Arc<DocumentRepository>,
    analyses: Arc<AnalysisRepository>,
    cache: Arc<ResultCache>,
}

impl NoteService {
    pub fn new(
        docs: Arc<DocumentRepository>,
        analyses: Arc<AnalysisRepository>,
        cache: Arc<ResultCache>,
    ) -> Self {
        Self {
            docs,
            analyses,
            cache,
        }
    }

    /// Load the authoritative analysis for a document the caller owns.
    /// Note mutations always read the store, never the cache.
    fn load(&self, owner_id: &str, document_id: &str) -> Result<Analysis, CoreError> {
        if self.docs.get(owner_id, document_id)?.is_none() {
            return Err(CoreError::NotFound(format!("document {}", document_id)));
        }
        self.analyses
            .get_by_document(document_id)?
            .ok_or_else(|| CoreError::NotFound(format!("no analysis for document {}", document_id)))
    }

    fn check_clause(analysis: &Analysis, clause_index: usize) -> Result<(), CoreError> {
        if clause_index >= analysis.clauses.len() {
            return Err(CoreError::InvalidIndex(format!(
                "clause index {} out of range ({} clauses)",
                clause_index,
                analysis.clauses.len()
            )));
        }
        Ok(())
    }

    fn check_note(
        analysis: &Analysis,
        clause_index: usize,
        note_index: usize,
    ) -> Result<(), CoreError> {
        Self::check_clause(analysis, clause_index)?;
        let notes = &analysis.clauses[clause_index].notes;
        if note_index >= notes.len() {
            return Err(CoreError::InvalidIndex(format!(
                "note index {} out of range ({} notes on clause {})",
                note_index,
                notes.len(),
                clause_index
            )));
        }
        Ok(())
    }

    fn store(&self, document_id: &str, analysis: &Analysis) -> Result<(), CoreError> {
        self.analyses.upsert(analysis)?;
        // Invalidate before returning so no reader sees the old copy.
        self.cache.invalidate(document_id);
        Ok(())
    }

    /// Append a note to a clause. Returns the created note.
    pub fn add_note(
        &self,
        owner_id: &str,
        document_id: &str,
        clause_index: usize,
        text: String,
    ) -> Result<Note, CoreError> {
        let mut analysis = self.load(owner_id, document_id)?;
        Self::check_clause(&analysis, clause_index)?;

        let note = Note::new(text);
        analysis.clauses[clause_index].notes.push(note.clone());
        self.store(document_id, &analysis)?;
        Ok(note)
    }

    /// Replace a note's text, stamping the update time. Sibling notes
    /// keep their positions.
    pub fn update_note(
        &self,
        owner_id: &str,
        document_id: &str,
        clause_index: usize,
        note_index: usize,
        text: String,
    ) -> Result<Note, CoreError> {
        let mut analysis = self.load(owner_id, document_id)?;
        Self::check_note(&analysis, clause_index, note_index)?;

        let note = &mut analysis.clauses[clause_index].notes[note_index];
        note.text = text;
        note.updated_at = Some(Utc::now());
        let updated = note.clone();

        self.store(document_id, &analysis)?;
        Ok(updated)
    }

    /// Delete a note. Later siblings shift down one position, so callers
    /// must not hold on to indices across a delete.
    pub fn delete_note(
        &self,
        owner_id: &str,
        document_id: &str,
        clause_index: usize,
        note_index: usize,
    ) -> Result<(), CoreError> {
        let mut analysis = self.load(owner_id, document_id)?;
        Self::check_note(&analysis, clause_index, note_index)?;

        analysis.clauses[clause_index].notes.remove(note_index);
        self.store(document_id, &analysis)
    }
}
