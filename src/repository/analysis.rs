//! Analysis repository for SQLite persistence.
//!
//! One current analysis per document: writes upsert on `document_id`,
//! replacing the prior version instead of accumulating history. Clauses,
//! risks, and key findings are stored as JSON columns because their
//! category vocabulary is open-ended.

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{parse_datetime, Result};
use crate::models::{Analysis, Clause, Risk};

fn row_to_analysis(row: &Row) -> rusqlite::Result<(Analysis, String, String, String)> {
    let clauses_json: String = row.get("clauses")?;
    let risks_json: String = row.get("risks")?;
    let findings_json: String = row.get("key_findings")?;
    let analysis = Analysis {
        id: row.get("id")?,
        document_id: row.get("document_id")?,
        summary: row.get("summary")?,
        clauses: Vec::new(),
        risks: Vec::new(),
        key_findings: Vec::new(),
        overall_risk_score: row.get::<_, i64>("overall_risk_score")?.clamp(0, 100) as u8,
        model: row.get("model")?,
        token_cost: row.get::<_, Option<i64>>("token_cost")?.map(|c| c as u64),
        duration_ms: row.get::<_, i64>("duration_ms")? as u64,
        completed_at: parse_datetime(&row.get::<_, String>("completed_at")?),
    };
    Ok((analysis, clauses_json, risks_json, findings_json))
}

/// SQLite-backed analysis repository.
pub struct AnalysisRepository {
    db_path: PathBuf,
}

impl AnalysisRepository {
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
            CREATE TABLE IF NOT EXISTS analyses (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL UNIQUE,
                summary TEXT NOT NULL,
                clauses TEXT NOT NULL,
                risks TEXT NOT NULL,
                key_findings TEXT NOT NULL,
                overall_risk_score INTEGER NOT NULL,
                model TEXT NOT NULL,
                token_cost INTEGER,
                duration_ms INTEGER NOT NULL,
                completed_at TEXT NOT NULL
            );
        "#,
        )?;
        Ok(())
    }

    /// Insert or replace the analysis for a document.
    pub fn upsert(&self, analysis: &Analysis) -> Result<()> {
        let clauses = serde_json::to_string(&analysis.clauses)?;
        let risks = serde_json::to_string(&analysis.risks)?;
        let findings = serde_json::to_string(&analysis.key_findings)?;

        let conn = self.connect()?;
        conn.execute(
            r#"
            INSERT INTO analyses (
                id, document_id, summary, clauses, risks, key_findings,
                overall_risk_score, model, token_cost, duration_ms, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT(document_id) DO UPDATE SET
                id = excluded.id,
                summary = excluded.summary,
                clauses = excluded.clauses,
                risks = excluded.risks,
                key_findings = excluded.key_findings,
                overall_risk_score = excluded.overall_risk_score,
                model = excluded.model,
                token_cost = excluded.token_cost,
                duration_ms = excluded.duration_ms,
                completed_at = excluded.completed_at
            "#,
            params![
                analysis.id,
                analysis.document_id,
                analysis.summary,
                clauses,
                risks,
                findings,
                analysis.overall_risk_score as i64,
                analysis.model,
                analysis.token_cost.map(|c| c as i64),
                analysis.duration_ms as i64,
                analysis.completed_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Get the current analysis for a document.
    pub fn get_by_document(&self, document_id: &str) -> Result<Option<Analysis>> {
        let conn = self.connect()?;
        let found = conn
            .query_row(
                "SELECT * FROM analyses WHERE document_id = ?1",
                params![document_id],
                row_to_analysis,
            )
            .optional()?;

        match found {
            None => Ok(None),
            Some((mut analysis, clauses_json, risks_json, findings_json)) => {
                analysis.clauses = serde_json::from_str::<Vec<Clause>>(&clauses_json)?;
                analysis.risks = serde_json::from_str::<Vec<Risk>>(&risks_json)?;
                analysis.key_findings = serde_json::from_str::<Vec<String>>(&findings_json)?;
                Ok(Some(analysis))
            }
        }
    }

    /// Delete the analysis for a document, if any.
    pub fn delete_for_document(&self, document_id: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "DELETE FROM analyses WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::tempdir;

    use crate::models::{Note, RiskLevel};

    fn sample(document_id: &str) -> Analysis {
        Analysis {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            summary: "services agreement with broad indemnity".to_string(),
            clauses: vec![Clause {
                category: "indemnification".to_string(),
                excerpt: "Customer shall indemnify...".to_string(),
                risk_level: RiskLevel::High,
                explanation: "one-sided indemnity".to_string(),
                notes: vec![Note::new("flag for negotiation".to_string())],
            }],
            risks: vec![Risk {
                severity: RiskLevel::Critical,
                category: "liability".to_string(),
                description: "uncapped liability".to_string(),
                recommendation: "add a liability cap".to_string(),
            }],
            key_findings: vec!["no liability cap".to_string()],
            overall_risk_score: 78,
            model: "llama3.2".to_string(),
            token_cost: Some(2048),
            duration_ms: 1500,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_round_trip_is_structurally_equal() {
        let dir = tempdir().unwrap();
        let repo = AnalysisRepository::new(&dir.path().join("test.db")).unwrap();

        let analysis = sample("doc-1");
        repo.upsert(&analysis).unwrap();

        let loaded = repo.get_by_document("doc-1").unwrap().unwrap();
        assert_eq!(loaded.summary, analysis.summary);
        assert_eq!(loaded.clauses, analysis.clauses);
        assert_eq!(loaded.risks, analysis.risks);
        assert_eq!(loaded.key_findings, analysis.key_findings);
        assert_eq!(loaded.overall_risk_score, analysis.overall_risk_score);
        assert_eq!(loaded.token_cost, analysis.token_cost);
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let dir = tempdir().unwrap();
        let repo = AnalysisRepository::new(&dir.path().join("test.db")).unwrap();

        let first = sample("doc-1");
        repo.upsert(&first).unwrap();

        let mut second = sample("doc-1");
        second.summary = "revised after re-analysis".to_string();
        repo.upsert(&second).unwrap();

        let loaded = repo.get_by_document("doc-1").unwrap().unwrap();
        assert_eq!(loaded.id, second.id);
        assert_eq!(loaded.summary, "revised after re-analysis");

        // Still exactly one row for the document
        let conn = repo.connect().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM analyses WHERE document_id = 'doc-1'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_delete_for_document() {
        let dir = tempdir().unwrap();
        let repo = AnalysisRepository::new(&dir.path().join("test.db")).unwrap();

        repo.upsert(&sample("doc-1")).unwrap();
        repo.delete_for_document("doc-1").unwrap();
        assert!(repo.get_by_document("doc-1").unwrap().is_none());
    }
}
