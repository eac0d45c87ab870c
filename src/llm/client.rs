//! LLM client for contract analysis.
//!
//! Supports Ollama API for local LLM inference.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{AnalysisProvider, InferenceError, StructuredAnalysis};
use crate::models::{Clause, Risk, RiskLevel};

/// Request timeout for a single inference call.
const REQUEST_TIMEOUT_SECS: u64 = 300;

/// Marker appended to input text when it was cut at the size limit.
const TRUNCATION_MARKER: &str = "\n\n[document truncated for analysis]";

/// Default prompt for contract analysis.
pub const DEFAULT_ANALYSIS_PROMPT: &str = r#"You are a contract review assistant analyzing a legal document. Read the ENTIRE document before answering.

Identify the clauses that materially affect the parties' obligations and risk, the concrete risks the document creates, and an overall assessment.

Document Title: {title}

Document Content:
{content}

Respond with ONLY a JSON object, no prose or markdown fences, in exactly this shape:
{
  "summary": "2-4 sentence plain-language summary of what this contract does",
  "clauses": [
    {
      "category": "short lowercase label such as termination, indemnification, payment",
      "excerpt": "the exact source text of the clause, trimmed to the relevant sentences",
      "risk_level": "low|medium|high|critical",
      "explanation": "why this clause matters and what to watch for"
    }
  ],
  "risks": [
    {
      "severity": "low|medium|high|critical",
      "category": "short lowercase label",
      "description": "the concrete exposure",
      "recommendation": "what to negotiate or change"
    }
  ],
  "key_findings": ["one line per finding a reviewer must not miss"],
  "overall_risk_score": 0
}

CRITICAL INSTRUCTIONS:
1. risk_level and severity must be exactly one of: low, medium, high, critical
2. overall_risk_score is an integer from 0 (benign) to 100 (do not sign)
3. Use your own judgment for category labels; do not limit yourself to the examples
4. Quote excerpts from the document verbatim; never invent text
5. Output nothing except the JSON object"#;

/// Configuration for LLM client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Whether LLM analysis is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ollama API endpoint (default: http://localhost:11434)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Model to use for analysis
    #[serde(default = "default_model")]
    pub model: String,
    /// Maximum tokens in response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Temperature for generation (0.0 - 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Custom analysis prompt (uses {title} and {content} placeholders)
    #[serde(default)]
    pub analysis_prompt: Option<String>,
    /// Maximum characters of document content to send to the model
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_enabled() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_model() -> String {
    "llama3.2:latest".to_string()
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_content_chars() -> usize {
    24000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            analysis_prompt: None,
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl LlmConfig {
    /// Get the analysis prompt, using custom or default.
    pub fn get_analysis_prompt(&self) -> &str {
        self.analysis_prompt
            .as_deref()
            .unwrap_or(DEFAULT_ANALYSIS_PROMPT)
    }
}

/// Ollama API request format.
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    format: String,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

/// Ollama API response format.
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[allow(dead_code)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// JSON shape we ask the model to produce.
#[derive(Debug, Deserialize)]
struct AnalysisPayload {
    summary: String,
    #[serde(default)]
    clauses: Vec<ClausePayload>,
    #[serde(default)]
    risks: Vec<RiskPayload>,
    #[serde(default)]
    key_findings: Vec<String>,
    #[serde(default)]
    overall_risk_score: f64,
}

#[derive(Debug, Deserialize)]
struct ClausePayload {
    #[serde(default)]
    category: String,
    #[serde(default)]
    excerpt: String,
    risk_level: String,
    #[serde(default)]
    explanation: String,
}

#[derive(Debug, Deserialize)]
struct RiskPayload {
    severity: String,
    #[serde(default)]
    category: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    recommendation: String,
}

/// LLM client for contract analysis.
pub struct LlmClient {
    config: LlmConfig,
    client: Client,
}

impl LlmClient {
    /// Create a new LLM client with the given configuration.
    pub fn new(config: LlmConfig) -> Result<Self, InferenceError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| InferenceError::Connection(e.to_string()))?;

        Ok(Self { config, client })
    }

    /// Get the config.
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    /// Truncate content to the configured maximum (UTF-8 safe), marking
    /// the cut so the model knows the document continues.
    fn truncate_content(&self, text: &str) -> (String, bool) {
        if text.len() <= self.config.max_content_chars {
            return (text.to_string(), false);
        }
        let mut end = self.config.max_content_chars;
        while end > 0 && !text.is_char_boundary(end) {
            end -= 1;
        }
        let mut truncated = text[..end].to_string();
        truncated.push_str(TRUNCATION_MARKER);
        (truncated, true)
    }

    /// Call Ollama API with a prompt.
    async fn call_ollama(&self, prompt: &str) -> Result<OllamaResponse, InferenceError> {
        let request = OllamaRequest {
            model: self.config.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
            format: "json".to_string(),
            options: OllamaOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    InferenceError::Timeout(REQUEST_TIMEOUT_SECS)
                } else {
                    InferenceError::Connection(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::TOO_MANY_REQUESTS => InferenceError::QuotaExceeded(body),
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    InferenceError::InvalidCredentials(body)
                }
                _ => InferenceError::Api(format!("HTTP {}: {}", status, body)),
            });
        }

        resp.json()
            .await
            .map_err(|e| InferenceError::MalformedOutput(e.to_string()))
    }

    /// Parse the model's JSON response into a structured analysis.
    fn parse_analysis(&self, response: &str) -> Result<StructuredAnalysis, InferenceError> {
        let json = extract_json_object(response).ok_or_else(|| {
            InferenceError::MalformedOutput("no JSON object in model response".to_string())
        })?;

        let payload: AnalysisPayload = serde_json::from_str(json)
            .map_err(|e| InferenceError::MalformedOutput(e.to_string()))?;

        let clauses = payload
            .clauses
            .into_iter()
            .map(|c| {
                let risk_level = RiskLevel::from_str(&c.risk_level).ok_or_else(|| {
                    InferenceError::MalformedOutput(format!(
                        "unknown clause risk level: {}",
                        c.risk_level
                    ))
                })?;
                Ok(Clause {
                    category: c.category,
                    excerpt: c.excerpt,
                    risk_level,
                    explanation: c.explanation,
                    notes: Vec::new(),
                })
            })
            .collect::<Result<Vec<_>, InferenceError>>()?;

        let risks = payload
            .risks
            .into_iter()
            .map(|r| {
                let severity = RiskLevel::from_str(&r.severity).ok_or_else(|| {
                    InferenceError::MalformedOutput(format!(
                        "unknown risk severity: {}",
                        r.severity
                    ))
                })?;
                Ok(Risk {
                    severity,
                    category: r.category,
                    description: r.description,
                    recommendation: r.recommendation,
                })
            })
            .collect::<Result<Vec<_>, InferenceError>>()?;

        if payload.summary.trim().is_empty() {
            return Err(InferenceError::MalformedOutput(
                "empty summary in model response".to_string(),
            ));
        }

        Ok(StructuredAnalysis {
            summary: payload.summary.trim().to_string(),
            clauses,
            risks,
            key_findings: payload.key_findings,
            overall_risk_score: payload.overall_risk_score.round().clamp(0.0, 100.0) as u8,
            model: self.config.model.clone(),
            token_cost: None,
        })
    }
}

/// Pull the outermost JSON object out of a response, tolerating markdown
/// fences and stray prose around it.
fn extract_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&response[start..=end])
}

#[async_trait]
impl AnalysisProvider for LlmClient {
    async fn infer(
        &self,
        text: &str,
        display_name: &str,
    ) -> Result<StructuredAnalysis, InferenceError> {
        let (content, truncated) = self.truncate_content(text);
        if truncated {
            debug!(
                "Truncated {} to {} chars for inference",
                display_name, self.config.max_content_chars
            );
        }

        let prompt = self
            .config
            .get_analysis_prompt()
            .replace("{title}", display_name)
            .replace("{content}", &content);

        info!("Analyzing document: {}", display_name);
        let response = self.call_ollama(&prompt).await?;

        let mut analysis = self.parse_analysis(&response.response)?;
        analysis.token_cost = match (response.prompt_eval_count, response.eval_count) {
            (Some(p), Some(e)) => Some(p + e),
            (Some(p), None) => Some(p),
            (None, Some(e)) => Some(e),
            (None, None) => None,
        };
        Ok(analysis)
    }

    /// Check if the LLM service is available.
    async fn is_available(&self) -> bool {
        if !self.config.enabled {
            return false;
        }
        let url = format!("{}/api/tags", self.config.endpoint);
        match self.client.get(&url).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LlmClient {
        LlmClient::new(LlmConfig::default()).unwrap()
    }

    #[test]
    fn test_parse_analysis() {
        let response = r#"{
            "summary": "A one-year consulting agreement.",
            "clauses": [
                {"category": "termination", "excerpt": "Either party may terminate", "risk_level": "Medium", "explanation": "no cure period"}
            ],
            "risks": [
                {"severity": "high", "category": "liability", "description": "uncapped", "recommendation": "cap it"}
            ],
            "key_findings": ["auto-renews annually"],
            "overall_risk_score": 62
        }"#;

        let analysis = client().parse_analysis(response).unwrap();
        assert_eq!(analysis.summary, "A one-year consulting agreement.");
        assert_eq!(analysis.clauses.len(), 1);
        assert_eq!(analysis.clauses[0].risk_level, RiskLevel::Medium);
        assert!(analysis.clauses[0].notes.is_empty());
        assert_eq!(analysis.risks[0].severity, RiskLevel::High);
        assert_eq!(analysis.overall_risk_score, 62);
    }

    #[test]
    fn test_parse_analysis_tolerates_fences() {
        let response = "```json\n{\"summary\": \"Short NDA.\", \"overall_risk_score\": 12}\n```";
        let analysis = client().parse_analysis(response).unwrap();
        assert_eq!(analysis.summary, "Short NDA.");
        assert!(analysis.clauses.is_empty());
        assert_eq!(analysis.overall_risk_score, 12);
    }

    #[test]
    fn test_parse_analysis_rejects_unknown_level() {
        let response = r#"{
            "summary": "x",
            "clauses": [{"category": "c", "excerpt": "e", "risk_level": "severe", "explanation": ""}]
        }"#;
        let err = client().parse_analysis(response).unwrap_err();
        assert!(matches!(err, InferenceError::MalformedOutput(_)));
    }

    #[test]
    fn test_parse_analysis_rejects_prose() {
        let err = client().parse_analysis("I could not analyze this.").unwrap_err();
        assert!(matches!(err, InferenceError::MalformedOutput(_)));
    }

    #[test]
    fn test_score_is_clamped() {
        let analysis = client()
            .parse_analysis(r#"{"summary": "x", "overall_risk_score": 180}"#)
            .unwrap();
        assert_eq!(analysis.overall_risk_score, 100);
    }

    #[test]
    fn test_truncate_marks_the_cut() {
        let mut config = LlmConfig::default();
        config.max_content_chars = 10;
        let client = LlmClient::new(config).unwrap();

        let (content, truncated) = client.truncate_content("0123456789abcdef");
        assert!(truncated);
        assert!(content.starts_with("0123456789"));
        assert!(content.ends_with(TRUNCATION_MARKER));

        let (content, truncated) = client.truncate_content("short");
        assert!(!truncated);
        assert_eq!(content, "short");
    }

    #[test]
    fn test_default_prompt_has_placeholders() {
        let config = LlmConfig::default();
        assert!(config.get_analysis_prompt().contains("{title}"));
        assert!(config.get_analysis_prompt().contains("{content}"));
    }
}
