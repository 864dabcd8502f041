/*!
 * Retry, abandonment and cancellation behavior.
 */

use std::sync::Arc;

use tarjoman::models::{AbandonReason, JobStatus, TaskStatus};
use tarjoman::providers::mock::MockProvider;
use tarjoman::store::Store;

use crate::common::{
    fast_job_config, pipeline_with, poisoned_pages, sample_pages, test_config, test_config_with,
};

#[tokio::test]
async fn test_permanent_errors_past_tolerance_should_fail_job() {
    // Single worker so abandonments happen in document order
    let config = test_config_with(1, 1.0, 2.0);
    let provider = Arc::new(MockProvider::permanent_for_marked("POISON"));
    let (pipeline, store) = pipeline_with(config, provider);

    pipeline
        .ingest_pages("doc-1", poisoned_pages("POISON"))
        .await
        .unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    // Two of six chunks were rejected; 1/3 abandoned exceeds the 20%
    // tolerance and the job fails as a whole.
    assert_eq!(snapshot.chunks_total, 6);
    assert_eq!(snapshot.status, JobStatus::Failed);
    assert!(snapshot.error_summary.count("invalid_request") >= 2);
    assert!(snapshot.chunks_completed < snapshot.chunks_total);

    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    // Permanent failures are abandoned without a single retry
    for task in tasks.iter().filter(|t| {
        t.abandon_reason == Some(AbandonReason::PermanentError)
    }) {
        assert_eq!(task.attempt_count, 1);
        assert!(task.last_error.is_some());
    }
    // Work still queued at abort time was abandoned as job_aborted
    assert!(tasks
        .iter()
        .any(|t| t.abandon_reason == Some(AbandonReason::JobAborted)));
    // No task is left in a non-terminal state
    for task in &tasks {
        assert!(task.status.is_terminal());
    }
}

#[tokio::test]
async fn test_abandonment_under_tolerance_should_partially_complete() {
    // One poisoned chunk out of seven stays under the 20% tolerance
    let mut pages = sample_pages();
    pages.push(tarjoman::models::PageText::new(
        4,
        "A final clean paragraph of prose.\n\nThe POISON paragraph sits here alone.",
    ));

    let provider = Arc::new(MockProvider::permanent_for_marked("POISON"));
    let (pipeline, store) = pipeline_with(test_config(), provider);

    pipeline.ingest_pages("doc-1", pages).await.unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    assert_eq!(snapshot.status, JobStatus::PartiallyCompleted);
    assert_eq!(snapshot.chunks_completed, snapshot.chunks_total - 1);

    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    let abandoned: Vec<_> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Abandoned)
        .collect();
    assert_eq!(abandoned.len(), 1);
    assert_eq!(
        abandoned[0].abandon_reason,
        Some(AbandonReason::PermanentError)
    );
}

#[tokio::test]
async fn test_retries_exhausted_should_abandon_task() {
    // Always-transient provider: every task burns all its retries
    let provider = Arc::new(MockProvider::always_transient());
    let (pipeline, store) = pipeline_with(test_config(), provider);

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let mut job_config = fast_job_config();
    job_config.max_retries = 1;
    let receipt = pipeline
        .submit_translation("doc-1", job_config)
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    assert_eq!(snapshot.status, JobStatus::Failed);
    assert_eq!(snapshot.chunks_completed, 0);
    assert!(snapshot.error_summary.count("server_error") > 0);

    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    for task in tasks.iter().filter(|t| {
        t.abandon_reason == Some(AbandonReason::RetriesExhausted)
    }) {
        // max_retries = 1 allows exactly two attempts
        assert_eq!(task.attempt_count, 2);
    }
}

#[tokio::test]
async fn test_cancellation_should_abandon_and_not_charge() {
    let (pipeline, store) = pipeline_with(test_config(), Arc::new(MockProvider::slow(500)));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();

    pipeline.cancel_job(&receipt.job_id).unwrap();
    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    assert_eq!(snapshot.status, JobStatus::Cancelled);
    assert_eq!(snapshot.chunks_completed, 0);
    // Nothing was charged for cancelled work
    assert_eq!(pipeline.job_spend(&receipt.job_id), 0.0);
    assert!(store
        .get_ledger_entries(&receipt.job_id)
        .await
        .unwrap()
        .is_empty());

    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    for task in &tasks {
        assert_eq!(task.status, TaskStatus::Abandoned);
        assert_eq!(task.abandon_reason, Some(AbandonReason::Cancelled));
    }
}

#[tokio::test]
async fn test_cancel_after_terminal_should_be_noop() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();
    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);

    // Terminal statuses never change again
    pipeline.cancel_job(&receipt.job_id).unwrap();
    let after = pipeline.get_job_status(&receipt.job_id).await.unwrap();
    assert_eq!(after.status, JobStatus::Completed);
    assert_eq!(after.chunks_completed, snapshot.chunks_completed);
}
