//! Analysis model: the structured result of one pipeline run.
//!
//! A document has at most one current analysis. Re-analysis overwrites it
//! in place. Clause and risk categories are open strings because the
//! inference step may emit labels we have never seen; only risk levels are
//! a fixed vocabulary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk level assigned to a clause or risk finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Parse a risk level, tolerating case and surrounding whitespace.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

/// A reviewer note attached to a clause, addressed by position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn new(text: String) -> Self {
        Self {
            text,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// A contract clause identified by the inference step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    /// Open-ended category label (e.g. "termination", "indemnification").
    pub category: String,
    /// Source excerpt the clause was identified from.
    pub excerpt: String,
    pub risk_level: RiskLevel,
    pub explanation: String,
    /// Ordered notes; siblings keep their positions across add/update,
    /// and shift down on delete.
    #[serde(default)]
    pub notes: Vec<Note>,
}

/// A risk finding with a recommended mitigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Risk {
    pub severity: RiskLevel,
    /// Open-ended category label.
    pub category: String,
    pub description: String,
    pub recommendation: String,
}

/// The structured result of analyzing one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    pub document_id: String,
    pub summary: String,
    pub clauses: Vec<Clause>,
    pub risks: Vec<Risk>,
    pub key_findings: Vec<String>,
    /// Overall risk score, 0-100.
    pub overall_risk_score: u8,
    /// Identifier of the model that produced this analysis.
    pub model: String,
    /// Token cost reported by the inference backend, when available.
    pub token_cost: Option<u64>,
    /// Wall-clock pipeline duration in milliseconds.
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl Analysis {
    /// Copy this analysis for another document that carries byte-identical
    /// content. The copy gets its own id so deletion cascades stay local
    /// to each document.
    pub fn duplicate_for(&self, document_id: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            completed_at: Utc::now(),
            ..self.clone()
        }
    }
}
