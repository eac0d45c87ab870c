//! Background worker pool for the durable job queue.
//!
//! A small fixed number of workers loop over atomic job claims, mirroring
//! the document download workers this design descends from: claim, run,
//! record the outcome, repeat. A sweeper task rescues jobs whose worker
//! died mid-run so no document stays stuck at `processing` forever.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::analysis::AnalysisService;
use crate::error::CoreError;
use crate::models::DocumentStatus;

impl AnalysisService {
    /// Claim and process at most one queued job.
    ///
    /// Returns true when a job was claimed (successfully handled or not),
    /// false when the queue had nothing runnable.
    pub async fn process_next_job(&self) -> Result<bool, CoreError> {
        let job = match self.jobs.claim_next()? {
            Some(job) => job,
            None => return Ok(false),
        };

        let doc = match self.docs.get(&job.owner_id, &job.document_id)? {
            Some(doc) => doc,
            None => {
                self.jobs.mark_dead(job.id, "document deleted")?;
                return Ok(true);
            }
        };

        if doc.status != DocumentStatus::Processing {
            // Finished or reset by another path; the job is moot.
            self.jobs.mark_completed(job.id)?;
            return Ok(true);
        }

        let max_attempts = self.queue_cfg.max_attempts.max(1);
        if job.attempts > max_attempts {
            let message = job
                .last_error
                .unwrap_or_else(|| "attempt ceiling exceeded".to_string());
            self.docs.mark_failed(&doc.id, &message)?;
            self.jobs.mark_dead(job.id, &message)?;
            return Ok(true);
        }

        match self.run_pipeline(&doc).await {
            Ok(_) => {
                self.jobs.mark_completed(job.id)?;
            }
            Err(err) => {
                let message = err.to_string();
                if err.is_retryable() && job.attempts < max_attempts {
                    let delay = self.backoff_delay_secs(job.attempts);
                    warn!(
                        "Job {} attempt {}/{} failed for document {}: {}; retrying in {}s",
                        job.id, job.attempts, max_attempts, doc.id, message, delay
                    );
                    self.jobs.schedule_retry(
                        job.id,
                        &message,
                        Utc::now() + chrono::Duration::seconds(delay as i64),
                    )?;
                } else {
                    error!(
                        "Job {} failed terminally for document {}: {}",
                        job.id, doc.id, message
                    );
                    self.docs.mark_failed(&doc.id, &message)?;
                    self.jobs.mark_dead(job.id, &message)?;
                }
            }
        }
        Ok(true)
    }

    /// Requeue active jobs whose worker has been silent past the stall
    /// timeout. Returns how many were rescued.
    pub fn requeue_stalled_jobs(&self) -> Result<usize, CoreError> {
        let cutoff =
            Utc::now() - chrono::Duration::seconds(self.queue_cfg.stall_timeout_secs as i64);
        let rescued = self.jobs.requeue_stalled(cutoff)?;
        if rescued > 0 {
            warn!("Requeued {} stalled analysis jobs", rescued);
        }
        Ok(rescued)
    }
}

/// Handle to the spawned worker tasks.
pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn the worker pool and stall sweeper for a service.
    pub fn start(service: Arc<AnalysisService>) -> Self {
        let worker_count = service.queue_cfg.workers.max(1);
        let poll_interval = Duration::from_millis(service.queue_cfg.poll_interval_ms.max(50));
        let mut handles = Vec::with_capacity(worker_count + 1);

        info!("Starting {} analysis workers", worker_count);
        for worker_id in 0..worker_count {
            let service = Arc::clone(&service);
            handles.push(tokio::spawn(async move {
                loop {
                    match service.process_next_job().await {
                        Ok(true) => {
                            debug!("Worker {} finished a job", worker_id);
                        }
                        Ok(false) => {
                            tokio::time::sleep(poll_interval).await;
                        }
                        Err(e) => {
                            error!("Worker {} queue error: {}", worker_id, e);
                            tokio::time::sleep(poll_interval.saturating_mul(4)).await;
                        }
                    }
                }
            }));
        }

        // Stall sweeper: check a few times per stall window.
        let sweep_interval =
            Duration::from_secs((service.queue_cfg.stall_timeout_secs / 2).max(1));
        let sweeper = Arc::clone(&service);
        handles.push(tokio::spawn(async move {
            loop {
                tokio::time::sleep(sweep_interval).await;
                if let Err(e) = sweeper.requeue_stalled_jobs() {
                    error!("Stall sweep failed: {}", e);
                }
            }
        }));

        Self { handles }
    }

    /// Stop all workers. In-flight jobs are recovered later by the stall
    /// sweeper of the next process.
    pub fn shutdown(self) {
        for handle in self.handles {
            handle.abort();
        }
    }
}
