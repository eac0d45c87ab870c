//! Document repository for SQLite persistence.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, Result};
use crate::models::{Document, DocumentStatus};

/// Outcome of an atomic attempt to start processing a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingClaim {
    /// The document transitioned into `processing`.
    Started,
    /// A pipeline run is already active for this document.
    AlreadyRunning,
    /// No such document for this owner.
    NotFound,
}

/// Parse a database row into a Document.
fn row_to_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        display_name: row.get("display_name")?,
        mime_type: row.get("mime_type")?,
        file_size: row.get::<_, i64>("file_size")? as u64,
        content_hash: row.get("content_hash")?,
        storage_path: PathBuf::from(row.get::<_, String>("storage_path")?),
        status: DocumentStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(DocumentStatus::Uploaded),
        progress: row.get::<_, i64>("progress")?.clamp(0, 100) as u8,
        error_message: row.get("error_message")?,
        analysis_id: row.get("analysis_id")?,
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        updated_at: parse_datetime(&row.get::<_, String>("updated_at")?),
    })
}

/// SQLite-backed document repository.
pub struct DocumentRepository {
    db_path: PathBuf,
}

impl DocumentRepository {
    /// Create a new document repository.
    pub fn new(db_path: &Path) -> Result<Self> {
        let repo = Self {
            db_path: db_path.to_path_buf(),
        };
        repo.init_schema()?;
        Ok(repo)
    }

    fn connect(&self) -> Result<Connection> {
        super::connect(&self.db_path)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                display_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                file_size INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                storage_path TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'uploaded',
                progress INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                analysis_id TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_owner
                ON documents(owner_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_documents_dedup
                ON documents(owner_id, content_hash, status);
        "#,
        )?;
        Ok(())
    }

    /// Insert a freshly uploaded document.
    pub fn save(&self, doc: &Document) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO documents (
                id, owner_id, display_name, mime_type, file_size,
                content_hash, storage_path, status, progress,
                error_message, analysis_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
            params![
                doc.id,
                doc.owner_id,
                doc.display_name,
                doc.mime_type,
                doc.file_size as i64,
                doc.content_hash,
                doc.storage_path.to_string_lossy().into_owned(),
                doc.status.as_str(),
                doc.progress as i64,
                doc.error_message,
                doc.analysis_id,
                doc.created_at.to_rfc3339(),
                doc.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get a document by id, scoped to its owner.
    pub fn get(&self, owner_id: &str, id: &str) -> Result<Option<Document>> {
        let conn = self.connect()?;
        let doc = conn
            .query_row(
                "SELECT * FROM documents WHERE id = ?1 AND owner_id = ?2",
                params![id, owner_id],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// List an owner's documents, newest first.
    pub fn list(&self, owner_id: &str) -> Result<Vec<Document>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT * FROM documents WHERE owner_id = ?1 ORDER BY created_at DESC, id DESC",
        )?;
        let docs = stmt
            .query_map(params![owner_id], row_to_document)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(docs)
    }

    /// Delete a document row. Returns true if a row was removed.
    pub fn delete(&self, owner_id: &str, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            "DELETE FROM documents WHERE id = ?1 AND owner_id = ?2",
            params![id, owner_id],
        )?;
        Ok(changed > 0)
    }

    /// Find the most recent fully analyzed document with the same content
    /// fingerprint for this owner. Documents still processing or in error
    /// never count as duplicates.
    pub fn find_completed_duplicate(
        &self,
        owner_id: &str,
        content_hash: &str,
        exclude_id: &str,
    ) -> Result<Option<Document>> {
        let conn = self.connect()?;
        let doc = conn
            .query_row(
                r#"
                SELECT * FROM documents
                WHERE owner_id = ?1 AND content_hash = ?2
                  AND status = 'analyzed' AND id != ?3
                ORDER BY updated_at DESC
                LIMIT 1
                "#,
                params![owner_id, content_hash, exclude_id],
                row_to_document,
            )
            .optional()?;
        Ok(doc)
    }

    /// Atomically claim a document for a pipeline run.
    ///
    /// Only one run may be active per document, so the transition into
    /// `processing` happens inside an immediate transaction: re-entry
    /// from any state except `processing` clears the previous error and
    /// sets progress to the accepted checkpoint.
    pub fn try_begin_processing(
        &self,
        owner_id: &str,
        id: &str,
        accepted_progress: u8,
    ) -> Result<ProcessingClaim> {
        let conn = self.connect()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<ProcessingClaim> = (|| {
            let status: Option<String> = conn
                .query_row(
                    "SELECT status FROM documents WHERE id = ?1 AND owner_id = ?2",
                    params![id, owner_id],
                    |row| row.get(0),
                )
                .optional()?;

            let status = match status {
                Some(s) => s,
                None => return Ok(ProcessingClaim::NotFound),
            };
            if status == DocumentStatus::Processing.as_str() {
                return Ok(ProcessingClaim::AlreadyRunning);
            }

            conn.execute(
                r#"
                UPDATE documents
                SET status = 'processing', progress = ?2,
                    error_message = NULL, updated_at = ?3
                WHERE id = ?1
                "#,
                params![id, accepted_progress as i64, Utc::now().to_rfc3339()],
            )?;
            Ok(ProcessingClaim::Started)
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    /// Advance progress for an active run. Monotonic: a lower value never
    /// overwrites a higher one, and nothing is written once the document
    /// has left `processing`.
    pub fn set_progress(&self, id: &str, progress: u8) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE documents
            SET progress = MAX(progress, ?2), updated_at = ?3
            WHERE id = ?1 AND status = 'processing'
            "#,
            params![id, progress as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Reset progress at the start of a retry attempt. A fresh attempt is
    /// a new run, so this write is allowed to move progress backwards.
    pub fn reset_progress(&self, id: &str, progress: u8) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE documents SET progress = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'processing'",
            params![id, progress as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Finalize a successful run: `analyzed`, progress 100, analysis ref.
    /// Returns false when the document no longer exists.
    pub fn complete_analysis(&self, id: &str, analysis_id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE documents
            SET status = 'analyzed', progress = 100, analysis_id = ?2,
                error_message = NULL, updated_at = ?3
            WHERE id = ?1
            "#,
            params![id, analysis_id, Utc::now().to_rfc3339()],
        )?;
        Ok(changed > 0)
    }

    /// How many documents (any owner) still reference this content hash.
    /// Blobs are content-addressed, so stored bytes may only be removed
    /// when this reaches zero.
    pub fn count_by_content_hash(&self, content_hash: &str) -> Result<u64> {
        let conn = self.connect()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE content_hash = ?1",
            params![content_hash],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Record a failed run: `error`, progress 0, message kept for pollers.
    pub fn mark_failed(&self, id: &str, message: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE documents
            SET status = 'error', progress = 0, error_message = ?2, updated_at = ?3
            WHERE id = ?1
            "#,
            params![id, message, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn make_doc(owner: &str, content: &[u8]) -> Document {
        Document::new(
            owner.to_string(),
            "contract.pdf".to_string(),
            "application/pdf".to_string(),
            content,
            PathBuf::from("/tmp/ab/abcdef12.pdf"),
        )
    }

    fn repo() -> (DocumentRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = DocumentRepository::new(&dir.path().join("test.db")).unwrap();
        (repo, dir)
    }

    #[test]
    fn test_save_and_get_respects_owner() {
        let (repo, _dir) = repo();
        let doc = make_doc("alice", b"content");
        repo.save(&doc).unwrap();

        let fetched = repo.get("alice", &doc.id).unwrap().unwrap();
        assert_eq!(fetched.content_hash, doc.content_hash);
        assert_eq!(fetched.status, DocumentStatus::Uploaded);

        // Another owner sees nothing
        assert!(repo.get("bob", &doc.id).unwrap().is_none());
    }

    #[test]
    fn test_begin_processing_rejects_second_claim() {
        let (repo, _dir) = repo();
        let doc = make_doc("alice", b"content");
        repo.save(&doc).unwrap();

        assert_eq!(
            repo.try_begin_processing("alice", &doc.id, 10).unwrap(),
            ProcessingClaim::Started
        );
        assert_eq!(
            repo.try_begin_processing("alice", &doc.id, 10).unwrap(),
            ProcessingClaim::AlreadyRunning
        );
        assert_eq!(
            repo.try_begin_processing("alice", "missing", 10).unwrap(),
            ProcessingClaim::NotFound
        );

        let fetched = repo.get("alice", &doc.id).unwrap().unwrap();
        assert_eq!(fetched.status, DocumentStatus::Processing);
        assert_eq!(fetched.progress, 10);
    }

    #[test]
    fn test_progress_is_monotonic_within_a_run() {
        let (repo, _dir) = repo();
        let doc = make_doc("alice", b"content");
        repo.save(&doc).unwrap();
        repo.try_begin_processing("alice", &doc.id, 10).unwrap();

        repo.set_progress(&doc.id, 50).unwrap();
        repo.set_progress(&doc.id, 20).unwrap();
        assert_eq!(repo.get("alice", &doc.id).unwrap().unwrap().progress, 50);

        // A new attempt may reset
        repo.reset_progress(&doc.id, 10).unwrap();
        assert_eq!(repo.get("alice", &doc.id).unwrap().unwrap().progress, 10);
    }

    #[test]
    fn test_complete_and_fail_transitions() {
        let (repo, _dir) = repo();
        let doc = make_doc("alice", b"content");
        repo.save(&doc).unwrap();
        repo.try_begin_processing("alice", &doc.id, 10).unwrap();

        repo.mark_failed(&doc.id, "extraction produced no text").unwrap();
        let failed = repo.get("alice", &doc.id).unwrap().unwrap();
        assert_eq!(failed.status, DocumentStatus::Error);
        assert_eq!(failed.progress, 0);
        assert!(failed.error_message.is_some());
        assert!(failed.analysis_id.is_none());

        // Re-entry clears the error
        repo.try_begin_processing("alice", &doc.id, 10).unwrap();
        let retried = repo.get("alice", &doc.id).unwrap().unwrap();
        assert_eq!(retried.status, DocumentStatus::Processing);
        assert!(retried.error_message.is_none());

        repo.complete_analysis(&doc.id, "analysis-1").unwrap();
        let done = repo.get("alice", &doc.id).unwrap().unwrap();
        assert_eq!(done.status, DocumentStatus::Analyzed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.analysis_id.as_deref(), Some("analysis-1"));
    }

    #[test]
    fn test_duplicate_lookup_only_matches_analyzed() {
        let (repo, _dir) = repo();
        let first = make_doc("alice", b"same bytes");
        let second = make_doc("alice", b"same bytes");
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        // First is not yet analyzed: no duplicate match
        assert!(repo
            .find_completed_duplicate("alice", &second.content_hash, &second.id)
            .unwrap()
            .is_none());

        repo.try_begin_processing("alice", &first.id, 10).unwrap();
        repo.complete_analysis(&first.id, "analysis-1").unwrap();

        let hit = repo
            .find_completed_duplicate("alice", &second.content_hash, &second.id)
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, first.id);

        // Another owner with the same bytes never matches
        assert!(repo
            .find_completed_duplicate("bob", &second.content_hash, &second.id)
            .unwrap()
            .is_none());
    }
}
