/*!
 * Job orchestration.
 *
 * The orchestrator owns every `TranslationJob` and `JobTask` record and
 * is their only writer. Each submitted job runs as one spawned engine
 * task that fans chunk translations out over a bounded worker pool,
 * applies retry and backoff policy, enforces the budget cap and failure
 * tolerance, and drives the job to exactly one terminal status.
 *
 * Callers interact through snapshots and a cancellation signal; they
 * never touch live job state.
 */

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::RwLock;
use tokio::sync::watch;
use uuid::Uuid;

use crate::errors::PipelineError;
use crate::ledger::CostLedger;
use crate::models::{
    Chunk, JobStatus, JobStatusSnapshot, SubmitReceipt, TranslationJob,
};
use crate::pipeline_config::{JobConfig, PipelineConfig};
use crate::providers::router::ProviderRouter;
use crate::quality::{QualityReport, QualityScorer};
use crate::store::Store;

mod engine;

/// Per-job control block kept in the orchestrator's registry
struct JobHandle {
    /// Live job record; the engine writes, everyone else reads
    job: Arc<RwLock<TranslationJob>>,
    /// Cooperative cancellation signal observed by every attempt
    cancel_tx: watch::Sender<bool>,
    /// Status updates, used to await terminal states
    status_rx: watch::Receiver<JobStatus>,
}

/// Drives translation jobs from submission to a terminal status
pub struct JobOrchestrator {
    config: PipelineConfig,
    router: Arc<ProviderRouter>,
    ledger: Arc<CostLedger>,
    scorer: QualityScorer,
    store: Arc<dyn Store>,
    jobs: RwLock<HashMap<String, JobHandle>>,
}

impl JobOrchestrator {
    pub fn new(
        config: PipelineConfig,
        router: Arc<ProviderRouter>,
        ledger: Arc<CostLedger>,
        store: Arc<dyn Store>,
    ) -> Self {
        let scorer = QualityScorer::new(
            Default::default(),
            config.job_defaults.review_threshold,
        );
        Self {
            config,
            router,
            ledger,
            scorer,
            store,
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Create a job for the given chunks and start its engine.
    ///
    /// Submission is idempotent: a non-terminal job with the same dedup
    /// key is returned instead of a new one. The lookup and the registry
    /// insert happen under one write lock, so concurrent duplicate
    /// submissions settle on a single job. The job record is persisted
    /// in `pending` before the engine task is spawned, so a submitted
    /// job is always observable.
    pub async fn spawn_job(
        self: &Arc<Self>,
        document_id: &str,
        chunks: Vec<Chunk>,
        estimated_cost_usd: f64,
        dedup_key: String,
        job_config: JobConfig,
    ) -> Result<SubmitReceipt, PipelineError> {
        job_config.validate()?;

        let job = TranslationJob {
            id: Uuid::new_v4().to_string(),
            document_id: document_id.to_string(),
            target_language: job_config.target_language.clone(),
            status: JobStatus::Pending,
            chunks_total: chunks.len(),
            chunks_completed: 0,
            estimated_cost_usd,
            actual_cost_usd: 0.0,
            budget_cap_usd: job_config.budget_cap_usd,
            dedup_key: dedup_key.clone(),
            started_at: None,
            completed_at: None,
            error_summary: Default::default(),
        };
        let job_id = job.id.clone();
        let job = Arc::new(RwLock::new(job));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(JobStatus::Pending);

        {
            let mut jobs = self.jobs.write();
            let active = jobs.values().find_map(|handle| {
                let job = handle.job.read();
                if job.dedup_key == dedup_key && !job.status.is_terminal() {
                    Some(SubmitReceipt {
                        job_id: job.id.clone(),
                        status: job.status,
                        deduplicated: true,
                    })
                } else {
                    None
                }
            });
            if let Some(existing) = active {
                debug!(
                    "Duplicate submission for document {}; returning active job {}",
                    document_id, existing.job_id
                );
                return Ok(existing);
            }
            jobs.insert(
                job_id.clone(),
                JobHandle {
                    job: Arc::clone(&job),
                    cancel_tx,
                    status_rx,
                },
            );
        }

        // Persist the pending record; a failed write evicts the handle
        // so the registry never advertises a job that will not run.
        let pending = job.read().clone();
        if let Err(error) = self.store.save_job(&pending).await {
            self.jobs.write().remove(&job_id);
            return Err(error);
        }

        info!(
            "Submitted job {} for document {} ({} chunks)",
            job_id,
            document_id,
            pending.chunks_total
        );

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            engine::run_job(orchestrator, job, chunks, job_config, cancel_rx, status_tx).await;
        });

        Ok(SubmitReceipt {
            job_id,
            status: JobStatus::Pending,
            deduplicated: false,
        })
    }

    /// Coherent point-in-time view of a job known to this process
    pub fn snapshot(&self, job_id: &str) -> Option<JobStatusSnapshot> {
        let jobs = self.jobs.read();
        jobs.get(job_id).map(|handle| handle.job.read().snapshot())
    }

    /// Request cancellation of a running job.
    ///
    /// Terminal jobs are left untouched; cancelling them is a no-op.
    pub fn cancel(&self, job_id: &str) -> Result<(), PipelineError> {
        let jobs = self.jobs.read();
        let handle = jobs
            .get(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?;

        if handle.job.read().status.is_terminal() {
            debug!("Ignoring cancel for terminal job {}", job_id);
            return Ok(());
        }

        // Send is infallible while the engine holds its receiver; a
        // closed channel means the engine already finished.
        let _ = handle.cancel_tx.send(true);
        info!("Cancellation requested for job {}", job_id);
        Ok(())
    }

    /// Wait until the job reaches a terminal status and return the
    /// final snapshot.
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
    ) -> Result<JobStatusSnapshot, PipelineError> {
        let mut status_rx = {
            let jobs = self.jobs.read();
            jobs.get(job_id)
                .map(|handle| handle.status_rx.clone())
                .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))?
        };

        // wait_for also checks the current value, so a job that finished
        // before we subscribed is returned immediately.
        status_rx
            .wait_for(|status| status.is_terminal())
            .await
            .map_err(|_| PipelineError::JobNotFound(job_id.to_string()))?;

        self.snapshot(job_id)
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    /// Aggregated quality report for a finished job
    pub async fn quality_report(
        &self,
        job_id: &str,
    ) -> Result<Option<QualityReport>, PipelineError> {
        self.store.get_quality_report(job_id).await
    }
}
