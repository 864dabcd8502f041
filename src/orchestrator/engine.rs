/*!
 * The per-job execution engine.
 *
 * One engine task runs per job. It owns the task records and a work
 * queue, dispatches attempts onto a semaphore-bounded pool, and reacts
 * to attempt results through a single event channel. All state
 * transitions happen in this loop; worker tasks only translate and
 * report back.
 */

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use parking_lot::RwLock;
use rand::Rng;
use tokio::sync::{mpsc, watch, OwnedSemaphorePermit, Semaphore};

use crate::errors::ProviderError;
use crate::models::{
    AbandonReason, Chunk, CostLedgerEntry, JobStatus, JobTask, TaskStatus, TranslationJob,
};
use crate::pipeline_config::{JobConfig, ProviderKind};
use crate::providers::{TranslateRequest, TranslationOutcome};
use crate::quality::QualityReport;

use super::JobOrchestrator;

/// Result of one attempt, reported back to the engine loop
enum AttemptOutcome {
    Success(TranslationOutcome),
    Failed(ProviderError),
    /// The attempt observed the cancellation signal and stopped
    Cancelled,
}

/// Events processed by the engine loop
enum TaskEvent {
    Attempted {
        ordinal: usize,
        provider: String,
        /// Configured kind of the provider that served the attempt;
        /// successes are priced by it, not by the job's routing kind
        kind: ProviderKind,
        outcome: AttemptOutcome,
    },
    /// Backoff elapsed; the task is ready to be queued again
    Requeue { ordinal: usize },
}

/// Why dispatch of further work stopped early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Halt {
    Budget,
    FailureRatio,
    Cancelled,
}

pub(super) async fn run_job(
    orch: Arc<JobOrchestrator>,
    job: Arc<RwLock<TranslationJob>>,
    chunks: Vec<Chunk>,
    config: JobConfig,
    mut cancel_rx: watch::Receiver<bool>,
    status_tx: watch::Sender<JobStatus>,
) {
    let job_id = job.read().id.clone();

    {
        let mut job = job.write();
        job.status = JobStatus::Running;
        job.started_at = Some(Utc::now());
    }
    let _ = status_tx.send(JobStatus::Running);
    persist_job(&orch, &job).await;

    let mut tasks: Vec<JobTask> = chunks
        .iter()
        .map(|chunk| JobTask::new(&job_id, chunk))
        .collect();
    let mut queue: VecDeque<usize> = (0..tasks.len()).collect();
    let mut quality_reports: Vec<QualityReport> = Vec::new();

    let pool_kind = config.provider_override.unwrap_or(orch.config.provider);
    let semaphore = Arc::new(Semaphore::new(orch.config.concurrency_for(pool_kind).max(1)));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<TaskEvent>();

    let mut in_flight: usize = 0;
    let mut backing_off: usize = 0;
    let mut abandoned: usize = 0;
    // Estimated cost of the in-flight attempts, counted against the cap
    let mut reserved: f64 = 0.0;
    let mut halt: Option<Halt> = None;

    loop {
        // Fill the pool from the queue while permits are available and
        // the projected spend stays under the cap
        while halt.is_none() && !queue.is_empty() {
            let spent = orch.ledger.job_total(&job_id);
            if spent >= config.budget_cap_usd {
                warn!("Job {} hit its budget cap; halting dispatch", job_id);
                halt = Some(Halt::Budget);
                drain_queue(&mut queue, &mut tasks, AbandonReason::JobAborted, &mut abandoned);
                break;
            }
            // Reservations bound the overshoot to a single attempt; a
            // failed attempt releases its reservation and dispatch resumes.
            if spent + reserved >= config.budget_cap_usd {
                break;
            }
            let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                break;
            };
            let Some(ordinal) = queue.pop_front() else {
                break;
            };

            reserved += chunk_cost_estimate(&orch, &config, &chunks[ordinal]);
            dispatch_attempt(
                &orch,
                &job_id,
                &config,
                &chunks[ordinal],
                &mut tasks[ordinal],
                permit,
                events_tx.clone(),
                cancel_rx.clone(),
            );
            persist_task(&orch, &tasks[ordinal]).await;
            in_flight += 1;
        }

        if in_flight == 0 && backing_off == 0 && (queue.is_empty() || halt.is_some()) {
            break;
        }

        let event = tokio::select! {
            Some(event) = events_rx.recv() => event,
            result = cancel_rx.wait_for(|c| *c), if halt.is_none() => {
                if result.is_ok() {
                    halt = Some(Halt::Cancelled);
                    drain_queue(&mut queue, &mut tasks, AbandonReason::Cancelled, &mut abandoned);
                    info!("Job {} cancelled; draining queue", job_id);
                }
                continue;
            }
        };

        match event {
            TaskEvent::Requeue { ordinal } => {
                backing_off -= 1;
                match halt {
                    None => {
                        tasks[ordinal].status = TaskStatus::Queued;
                        queue.push_back(ordinal);
                    }
                    Some(Halt::Cancelled) => {
                        abandon(&mut tasks[ordinal], AbandonReason::Cancelled, &mut abandoned);
                    }
                    Some(_) => {
                        abandon(&mut tasks[ordinal], AbandonReason::JobAborted, &mut abandoned);
                    }
                }
                persist_task(&orch, &tasks[ordinal]).await;
            }
            TaskEvent::Attempted {
                ordinal,
                provider,
                kind,
                outcome,
            } => {
                in_flight -= 1;
                reserved =
                    (reserved - chunk_cost_estimate(&orch, &config, &chunks[ordinal])).max(0.0);
                let task = &mut tasks[ordinal];

                match outcome {
                    AttemptOutcome::Success(result) => {
                        if halt == Some(Halt::Cancelled) {
                            // The result arrived after cancellation was
                            // observed; it is discarded and never charged.
                            abandon(task, AbandonReason::Cancelled, &mut abandoned);
                        } else {
                            let entry = complete_task(
                                &orch,
                                &job,
                                task,
                                &chunks[ordinal],
                                &provider,
                                kind,
                                result,
                                &mut quality_reports,
                            );
                            persist_ledger_entry(&orch, &entry).await;
                            persist_job(&orch, &job).await;
                            // The dispatch loop re-checks the cap against
                            // the newly recorded spend before more work
                            // goes out.
                        }
                    }
                    AttemptOutcome::Failed(error) => {
                        debug!(
                            "Job {} task {} attempt {} failed via {}: {}",
                            job_id, ordinal, task.attempt_count, provider, error
                        );
                        job.write().error_summary.record(&error);
                        orch.router.record_failure(&job_id, &provider);
                        task.last_error = Some(error.to_string());

                        let retryable = error.is_transient()
                            && task.attempt_count < config.max_retries + 1
                            && halt.is_none();

                        if retryable {
                            task.status = TaskStatus::Failed;
                            backing_off += 1;
                            schedule_requeue(
                                ordinal,
                                task.attempt_count,
                                &config,
                                events_tx.clone(),
                            );
                        } else {
                            let reason = if !error.is_transient() {
                                AbandonReason::PermanentError
                            } else if halt == Some(Halt::Cancelled) {
                                AbandonReason::Cancelled
                            } else if halt.is_some() {
                                AbandonReason::JobAborted
                            } else {
                                AbandonReason::RetriesExhausted
                            };
                            abandon(task, reason, &mut abandoned);

                            if halt.is_none() && ratio_exceeded(abandoned, tasks.len(), &config) {
                                warn!(
                                    "Job {} failure ratio exceeded tolerance; aborting",
                                    job_id
                                );
                                halt = Some(Halt::FailureRatio);
                                drain_queue(
                                    &mut queue,
                                    &mut tasks,
                                    AbandonReason::JobAborted,
                                    &mut abandoned,
                                );
                            }
                        }
                    }
                    AttemptOutcome::Cancelled => {
                        abandon(task, AbandonReason::Cancelled, &mut abandoned);
                    }
                }
                persist_task(&orch, &tasks[ordinal]).await;
            }
        }
    }

    finalize(&orch, &job, &tasks, halt, quality_reports, &status_tx).await;
}

/// Spawn one translation attempt on the worker pool
#[allow(clippy::too_many_arguments)]
fn dispatch_attempt(
    orch: &Arc<JobOrchestrator>,
    job_id: &str,
    config: &JobConfig,
    chunk: &Chunk,
    task: &mut JobTask,
    permit: OwnedSemaphorePermit,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
    mut cancel_rx: watch::Receiver<bool>,
) {
    task.status = TaskStatus::Running;
    task.attempt_count += 1;

    let ordinal = chunk.ordinal;
    let provider = match orch
        .router
        .select(job_id, config.provider_override, chunk.token_count)
    {
        Ok(provider) => provider,
        Err(error) => {
            // No usable provider; report as a permanent failure so the
            // task is abandoned through the normal path.
            let _ = events_tx.send(TaskEvent::Attempted {
                ordinal,
                provider: "none".to_string(),
                kind: config.provider_override.unwrap_or(orch.config.provider),
                outcome: AttemptOutcome::Failed(ProviderError::InvalidRequest(
                    error.to_string(),
                )),
            });
            drop(permit);
            return;
        }
    };
    task.provider_used = Some(provider.name().to_string());

    let request = TranslateRequest::new(
        chunk.text.clone(),
        orch.config.source_language.clone(),
        config.target_language.clone(),
    );
    let timeout = Duration::from_secs(config.attempt_timeout_secs.max(1));
    let provider_name = provider.name().to_string();
    let provider_kind = provider.kind();

    tokio::spawn(async move {
        let outcome = tokio::select! {
            // Dropping this future aborts the underlying HTTP call
            result = tokio::time::timeout(timeout, provider.translate(&request)) => {
                match result {
                    Ok(Ok(outcome)) => AttemptOutcome::Success(outcome),
                    Ok(Err(error)) => AttemptOutcome::Failed(error),
                    Err(_) => AttemptOutcome::Failed(ProviderError::Timeout(timeout.as_secs())),
                }
            }
            _ = cancel_rx.wait_for(|c| *c) => AttemptOutcome::Cancelled,
        };

        let _ = events_tx.send(TaskEvent::Attempted {
            ordinal,
            provider: provider_name,
            kind: provider_kind,
            outcome,
        });
        drop(permit);
    });
}

/// Apply a successful attempt: record cost, store the translation,
/// advance progress and score quality. Returns the ledger entry so the
/// caller can persist it.
#[allow(clippy::too_many_arguments)]
fn complete_task(
    orch: &Arc<JobOrchestrator>,
    job: &Arc<RwLock<TranslationJob>>,
    task: &mut JobTask,
    chunk: &Chunk,
    provider: &str,
    kind: ProviderKind,
    result: TranslationOutcome,
    quality_reports: &mut Vec<QualityReport>,
) -> CostLedgerEntry {
    // Priced by the provider that served the attempt, so a failover to
    // a differently-priced provider is billed at that provider's rate
    let price = orch.config.unit_price_for(kind);
    let entry = orch.ledger.record(
        &task.job_id,
        &chunk.id,
        result.tokens_in,
        result.tokens_out,
        &price,
    );

    task.status = TaskStatus::Succeeded;
    task.provider_used = Some(provider.to_string());
    task.tokens_in = result.tokens_in;
    task.tokens_out = result.tokens_out;
    task.cost_usd = entry.cost_usd;
    task.translated_text = Some(result.text.clone());

    quality_reports.push(orch.scorer.score(&chunk.text, &result.text));

    let mut job = job.write();
    // Progress only ever moves forward
    job.chunks_completed += 1;
    job.actual_cost_usd = orch.ledger.job_total(&job.id);
    entry
}

/// Estimated cost of one attempt at a chunk.
///
/// Reserved against the budget while the attempt is in flight, using
/// the job's routing kind and the configured expansion factor; the real
/// charge comes from the provider's reported usage on success.
fn chunk_cost_estimate(orch: &Arc<JobOrchestrator>, config: &JobConfig, chunk: &Chunk) -> f64 {
    let kind = config.provider_override.unwrap_or(orch.config.provider);
    let tokens_out =
        (chunk.token_count as f64 * orch.config.analyzer.expansion_factor).ceil() as u64;
    orch.config
        .unit_price_for(kind)
        .cost_usd(chunk.token_count as u64, tokens_out)
}

/// Mark a task terminally abandoned
fn abandon(task: &mut JobTask, reason: AbandonReason, abandoned: &mut usize) {
    // Terminal task states never change again
    if task.status.is_terminal() {
        return;
    }
    task.status = TaskStatus::Abandoned;
    task.abandon_reason = Some(reason);
    *abandoned += 1;
}

/// Abandon every still-queued task with the given reason
fn drain_queue(
    queue: &mut VecDeque<usize>,
    tasks: &mut [JobTask],
    reason: AbandonReason,
    abandoned: &mut usize,
) {
    while let Some(ordinal) = queue.pop_front() {
        abandon(&mut tasks[ordinal], reason, abandoned);
    }
}

fn ratio_exceeded(abandoned: usize, total: usize, config: &JobConfig) -> bool {
    total > 0 && abandoned as f64 / total as f64 > config.failure_tolerance
}

/// Exponential backoff with jitter, doubled per attempt and capped
fn backoff_delay(attempt: u32, config: &JobConfig) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let base = config
        .backoff_base_ms
        .saturating_mul(1u64 << exponent)
        .min(config.backoff_cap_ms);
    let jitter = rand::rng().random_range(0..=base / 4 + 1);
    Duration::from_millis((base + jitter).min(config.backoff_cap_ms))
}

fn schedule_requeue(
    ordinal: usize,
    attempt: u32,
    config: &JobConfig,
    events_tx: mpsc::UnboundedSender<TaskEvent>,
) {
    let delay = backoff_delay(attempt, config);
    debug!("Task {} backing off {:?} after attempt {}", ordinal, delay, attempt);
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = events_tx.send(TaskEvent::Requeue { ordinal });
    });
}

/// Settle the job into exactly one terminal status and persist everything
async fn finalize(
    orch: &Arc<JobOrchestrator>,
    job: &Arc<RwLock<TranslationJob>>,
    tasks: &[JobTask],
    halt: Option<Halt>,
    quality_reports: Vec<QualityReport>,
    status_tx: &watch::Sender<JobStatus>,
) {
    let all_succeeded = tasks.iter().all(|t| t.status == TaskStatus::Succeeded);

    let status = match halt {
        Some(Halt::Cancelled) => JobStatus::Cancelled,
        Some(Halt::FailureRatio) => JobStatus::Failed,
        Some(Halt::Budget) => JobStatus::PartiallyCompleted,
        None if all_succeeded => JobStatus::Completed,
        // Some tasks were abandoned but the job stayed under tolerance
        None => JobStatus::PartiallyCompleted,
    };

    let job_id = {
        let mut job = job.write();
        job.status = status;
        job.completed_at = Some(Utc::now());
        job.actual_cost_usd = orch.ledger.job_total(&job.id);
        job.id.clone()
    };

    if !quality_reports.is_empty() {
        let aggregate = orch.scorer.aggregate(&quality_reports);
        if let Err(error) = orch.store.save_quality_report(&job_id, &aggregate).await {
            warn!("Failed to persist quality report for {}: {}", job_id, error);
        }
    }

    persist_job(orch, job).await;
    orch.router.forget_job(&job_id);
    let _ = status_tx.send(status);

    let job = job.read();
    info!(
        "Job {} finished as {} ({}/{} chunks, ${:.4} spent)",
        job_id, status, job.chunks_completed, job.chunks_total, job.actual_cost_usd
    );
}

/// Best-effort persistence; the in-memory record stays authoritative
async fn persist_job(orch: &Arc<JobOrchestrator>, job: &Arc<RwLock<TranslationJob>>) {
    let snapshot = job.read().clone();
    if let Err(error) = orch.store.save_job(&snapshot).await {
        warn!("Failed to persist job {}: {}", snapshot.id, error);
    }
}

async fn persist_task(orch: &Arc<JobOrchestrator>, task: &JobTask) {
    if let Err(error) = orch.store.save_task(task).await {
        warn!("Failed to persist task {}: {}", task.id, error);
    }
}

async fn persist_ledger_entry(orch: &Arc<JobOrchestrator>, entry: &CostLedgerEntry) {
    if let Err(error) = orch.store.save_ledger_entry(entry).await {
        warn!(
            "Failed to persist ledger entry for chunk {}: {}",
            entry.chunk_id, error
        );
    }
}
