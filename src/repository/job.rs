//! Durable job queue backed by SQLite.
//!
//! Workers claim waiting jobs inside an immediate transaction so two
//! workers never pick up the same job. Retry scheduling is expressed as
//! `status = 'waiting'` plus a `next_retry_at` gate; jobs whose workers
//! died mid-run are found by their stale `started_at` and requeued.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, parse_datetime_opt, Result};
use crate::models::{AnalysisJob, JobStatus};

fn row_to_job(row: &Row) -> rusqlite::Result<AnalysisJob> {
    Ok(AnalysisJob {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        owner_id: row.get("owner_id")?,
        force_refresh: row.get::<_, i64>("force_refresh")? != 0,
        status: JobStatus::from_str(&row.get::<_, String>("status")?)
            .unwrap_or(JobStatus::Waiting),
        attempts: row.get::<_, i64>("attempts")? as u32,
        last_error: row.get("last_error")?,
        next_retry_at: parse_datetime_opt(row.get::<_, Option<String>>("next_retry_at")?),
        created_at: parse_datetime(&row.get::<_, String>("created_at")?),
        started_at: parse_datetime_opt(row.get::<_, Option<String>>("started_at")?),
        finished_at: parse_datetime_opt(row.get::<_, Option<String>>("finished_at")?),
    })
}

/// SQLite-backed analysis job queue.
pub struct JobRepository {
    db_path: PathBuf,
}

impl JobRepository {
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
            CREATE TABLE IF NOT EXISTS analysis_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                document_id TEXT NOT NULL,
                owner_id TEXT NOT NULL,
                force_refresh INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'waiting',
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                next_retry_at TEXT,
                created_at TEXT NOT NULL,
                started_at TEXT,
                finished_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_claim
                ON analysis_jobs(status, next_retry_at, created_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_document
                ON analysis_jobs(document_id, created_at);
        "#,
        )?;
        Ok(())
    }

    /// Enqueue an analysis job. Returns the job id.
    pub fn enqueue(&self, document_id: &str, owner_id: &str, force_refresh: bool) -> Result<i64> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO analysis_jobs (document_id, owner_id, force_refresh, status, created_at)
            VALUES (?1, ?2, ?3, 'waiting', ?4)
            "#,
            params![
                document_id,
                owner_id,
                force_refresh as i64,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Atomically claim the next runnable job, bumping its attempt count.
    pub fn claim_next(&self) -> Result<Option<AnalysisJob>> {
        let conn = self.connect()?;
        let now = Utc::now().to_rfc3339();

        conn.execute("BEGIN IMMEDIATE", [])?;

        let result: Result<Option<AnalysisJob>> = (|| {
            let query_result = conn.query_row(
                r#"
                SELECT * FROM analysis_jobs
                WHERE status = 'waiting'
                  AND (next_retry_at IS NULL OR next_retry_at <= ?1)
                ORDER BY created_at ASC, id ASC
                LIMIT 1
                "#,
                params![now],
                row_to_job,
            );

            match query_result {
                Ok(mut job) => {
                    conn.execute(
                        r#"
                        UPDATE analysis_jobs
                        SET status = 'active', started_at = ?2, attempts = attempts + 1
                        WHERE id = ?1
                        "#,
                        params![job.id, now],
                    )?;
                    job.status = JobStatus::Active;
                    job.attempts += 1;
                    job.started_at = Some(Utc::now());
                    Ok(Some(job))
                }
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })();

        if result.is_ok() {
            conn.execute("COMMIT", [])?;
        } else {
            let _ = conn.execute("ROLLBACK", []);
        }

        result
    }

    pub fn mark_completed(&self, id: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE analysis_jobs
            SET status = 'completed', finished_at = ?2, last_error = NULL
            WHERE id = ?1
            "#,
            params![id, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Put a failed job back in the queue for a later attempt.
    pub fn schedule_retry(
        &self,
        id: i64,
        error: &str,
        next_retry_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE analysis_jobs
            SET status = 'waiting', last_error = ?2, next_retry_at = ?3, started_at = NULL
            WHERE id = ?1
            "#,
            params![id, error, next_retry_at.to_rfc3339()],
        )?;
        Ok(())
    }

    /// Park a job that exhausted its retry budget or hit a failure that
    /// will not self-resolve.
    pub fn mark_dead(&self, id: i64, error: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            r#"
            UPDATE analysis_jobs
            SET status = 'dead', last_error = ?2, finished_at = ?3
            WHERE id = ?1
            "#,
            params![id, error, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Requeue active jobs whose worker went silent.
    ///
    /// Returns how many jobs were rescued. The attempt that stalled still
    /// counts against the ceiling.
    pub fn requeue_stalled(&self, started_before: DateTime<Utc>) -> Result<usize> {
        let conn = self.connect()?;
        let changed = conn.execute(
            r#"
            UPDATE analysis_jobs
            SET status = 'waiting', started_at = NULL
            WHERE status = 'active' AND started_at IS NOT NULL AND started_at < ?1
            "#,
            params![started_before.to_rfc3339()],
        )?;
        Ok(changed)
    }

    /// Most recent job for a document, any status.
    pub fn latest_for_document(&self, document_id: &str) -> Result<Option<AnalysisJob>> {
        let conn = self.connect()?;
        let job = conn
            .query_row(
                r#"
                SELECT * FROM analysis_jobs
                WHERE document_id = ?1
                ORDER BY created_at DESC, id DESC
                LIMIT 1
                "#,
                params![document_id],
                row_to_job,
            )
            .optional()?;
        Ok(job)
    }

    /// Remove all jobs for a document (used by document deletion).
    pub fn delete_for_document(&self, document_id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM analysis_jobs WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(())
    }

    /// Job counts grouped by status, for observability.
    pub fn status_counts(&self) -> Result<Vec<(String, u64)>> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT status, COUNT(*) FROM analysis_jobs GROUP BY status ORDER BY status",
        )?;
        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    fn repo() -> (JobRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let repo = JobRepository::new(&dir.path().join("test.db")).unwrap();
        (repo, dir)
    }

    #[test]
    fn test_enqueue_and_claim() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", false).unwrap();

        let job = repo.claim_next().unwrap().unwrap();
        assert_eq!(job.document_id, "doc-1");
        assert_eq!(job.status, JobStatus::Active);
        assert_eq!(job.attempts, 1);

        // Nothing else to claim
        assert!(repo.claim_next().unwrap().is_none());
    }

    #[test]
    fn test_claims_come_in_fifo_order() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", false).unwrap();
        repo.enqueue("doc-2", "alice", false).unwrap();

        assert_eq!(repo.claim_next().unwrap().unwrap().document_id, "doc-1");
        assert_eq!(repo.claim_next().unwrap().unwrap().document_id, "doc-2");
    }

    #[test]
    fn test_retry_gate_respects_backoff_time() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", false).unwrap();
        let job = repo.claim_next().unwrap().unwrap();

        repo.schedule_retry(job.id, "timed out", Utc::now() + Duration::hours(1))
            .unwrap();
        assert!(repo.claim_next().unwrap().is_none());

        repo.schedule_retry(job.id, "timed out", Utc::now() - Duration::seconds(1))
            .unwrap();
        let retried = repo.claim_next().unwrap().unwrap();
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.last_error.as_deref(), Some("timed out"));
    }

    #[test]
    fn test_requeue_stalled_rescues_only_old_active_jobs() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", false).unwrap();
        let job = repo.claim_next().unwrap().unwrap();

        // Worker is recent: nothing to rescue
        assert_eq!(
            repo.requeue_stalled(Utc::now() - Duration::minutes(10)).unwrap(),
            0
        );

        // Everything started before "now + 1s" counts as stalled
        assert_eq!(
            repo.requeue_stalled(Utc::now() + Duration::seconds(1)).unwrap(),
            1
        );
        let rescued = repo.claim_next().unwrap().unwrap();
        assert_eq!(rescued.id, job.id);
        assert_eq!(rescued.attempts, 2);
    }

    #[test]
    fn test_dead_jobs_are_not_claimable() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", true).unwrap();
        let job = repo.claim_next().unwrap().unwrap();
        assert!(job.force_refresh);

        repo.mark_dead(job.id, "quota exhausted").unwrap();
        assert!(repo.claim_next().unwrap().is_none());

        let latest = repo.latest_for_document("doc-1").unwrap().unwrap();
        assert_eq!(latest.status, JobStatus::Dead);
        assert_eq!(latest.last_error.as_deref(), Some("quota exhausted"));
    }

    #[test]
    fn test_status_counts() {
        let (repo, _dir) = repo();
        repo.enqueue("doc-1", "alice", false).unwrap();
        repo.enqueue("doc-2", "alice", false).unwrap();
        let job = repo.claim_next().unwrap().unwrap();
        repo.mark_completed(job.id).unwrap();

        let counts = repo.status_counts().unwrap();
        assert!(counts.contains(&("completed".to_string(), 1)));
        assert!(counts.contains(&("waiting".to_string(), 1)));
    }
}
