//! CLI command implementations.

use std::path::Path;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use crate::config::Settings;
use crate::models::DocumentStatus;
use crate::services::{AnalyzeOutcome, ServiceSet};

/// Build services for a one-shot command. The durable queue is bypassed
/// so the pipeline runs inside this process instead of waiting for a
/// server's workers.
fn inline_services(settings: &Settings) -> anyhow::Result<ServiceSet> {
    let mut settings = settings.clone();
    settings.queue.enabled = false;
    ServiceSet::from_settings(&settings)
}

pub fn ingest(
    settings: &Settings,
    owner: &str,
    path: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let services = ServiceSet::from_settings(settings)?;
    let content = std::fs::read(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {}", path.display(), e))?;
    if content.is_empty() {
        anyhow::bail!("{} is empty", path.display());
    }

    let display_name = name.unwrap_or_else(|| {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "untitled".to_string())
    });

    let doc = services.documents.ingest(owner, &display_name, &content)?;
    println!("Ingested {} as document {}", display_name, doc.id);
    println!("  type: {}  size: {} bytes", doc.mime_type, doc.file_size);
    println!("  fingerprint: {}", doc.content_hash);
    Ok(())
}

pub async fn analyze(
    settings: &Settings,
    owner: &str,
    document_id: &str,
    force: bool,
) -> anyhow::Result<()> {
    let services = inline_services(settings)?;

    if !services.analysis.inference_available().await {
        eprintln!(
            "warning: inference backend at {} is not responding",
            settings.llm.endpoint
        );
    }

    let outcome = services
        .analysis
        .request_analysis(owner, document_id, force)
        .await?;

    match outcome {
        AnalyzeOutcome::AlreadyAnalyzed { analysis } => {
            println!("Document already analyzed (risk score {}).", analysis.overall_risk_score);
            println!("Use --force to re-run the pipeline.");
            return Ok(());
        }
        AnalyzeOutcome::DuplicateOfExisting {
            source_document_id,
            analysis,
        } => {
            println!(
                "Identical content already analyzed as document {} (risk score {}); reused its result.",
                source_document_id, analysis.overall_risk_score
            );
            return Ok(());
        }
        AnalyzeOutcome::Accepted => {}
    }

    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
            .unwrap()
            .progress_chars("█▓░"),
    );
    progress.set_message("Analyzing...");

    // The pipeline runs as a background task in this process; poll the
    // same status surface a web client would.
    loop {
        tokio::time::sleep(Duration::from_millis(300)).await;
        let report = services.analysis.status(owner, document_id)?;
        progress.set_position(report.progress as u64);

        match report.status {
            DocumentStatus::Analyzed => {
                progress.finish_with_message("done");
                break;
            }
            DocumentStatus::Error => {
                progress.abandon_with_message("failed");
                anyhow::bail!(
                    "analysis failed: {}",
                    report
                        .error_message
                        .unwrap_or_else(|| "unknown error".to_string())
                );
            }
            _ => {}
        }
    }

    let fetched = services.analysis.get_analysis(owner, document_id)?;
    let analysis = fetched.analysis;
    println!();
    println!("{}", analysis.summary);
    println!();
    println!(
        "risk score {} | {} clauses | {} risks | model {}",
        analysis.overall_risk_score,
        analysis.clauses.len(),
        analysis.risks.len(),
        analysis.model
    );
    for finding in &analysis.key_findings {
        println!("  - {}", finding);
    }
    Ok(())
}

pub fn status(settings: &Settings, owner: &str, document_id: &str) -> anyhow::Result<()> {
    let services = ServiceSet::from_settings(settings)?;
    let report = services.analysis.status(owner, document_id)?;

    println!("status: {}", report.status.as_str());
    println!("progress: {}%", report.progress);
    if let Some(message) = report.error_message {
        println!("error: {}", message);
    }

    let counts = services.analysis.job_counts()?;
    if !counts.is_empty() {
        let summary: Vec<String> = counts
            .iter()
            .map(|(status, count)| format!("{} {}", count, status))
            .collect();
        println!("queue: {}", summary.join(", "));
    }
    Ok(())
}

pub fn list(settings: &Settings, owner: &str) -> anyhow::Result<()> {
    let services = ServiceSet::from_settings(settings)?;
    let docs = services.documents.list(owner)?;

    if docs.is_empty() {
        println!("No documents.");
        return Ok(());
    }
    for doc in docs {
        println!(
            "{}  {:<10} {:>3}%  {}",
            doc.id,
            doc.status.as_str(),
            doc.progress,
            doc.display_name
        );
    }
    Ok(())
}

pub fn delete(settings: &Settings, owner: &str, document_id: &str) -> anyhow::Result<()> {
    let services = ServiceSet::from_settings(settings)?;
    services.documents.delete(owner, document_id)?;
    println!("Deleted document {}", document_id);
    Ok(())
}
