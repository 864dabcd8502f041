/*!
 * Budget cap enforcement.
 */

use std::sync::Arc;

use tarjoman::models::{AbandonReason, JobStatus, TaskStatus};
use tarjoman::pipeline_config::{ProviderConfig, ProviderKind};
use tarjoman::providers::mock::MockProvider;
use tarjoman::store::Store;

use crate::common::{fast_job_config, pipeline_with, sample_pages, test_config_with};

#[tokio::test]
async fn test_budget_cap_should_partially_complete_job() {
    // Single worker and a price that makes the very first success
    // exceed the cap.
    let config = test_config_with(1, 1_000_000.0, 1_000_000.0);
    let (pipeline, store) = pipeline_with(config, Arc::new(MockProvider::working()));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();

    let mut job_config = fast_job_config();
    job_config.budget_cap_usd = 1.0;
    let budget = job_config.budget_cap_usd;
    let receipt = pipeline
        .submit_translation("doc-1", job_config)
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    assert_eq!(snapshot.status, JobStatus::PartiallyCompleted);
    // Exactly one chunk completed before the cap tripped
    assert_eq!(snapshot.chunks_completed, 1);
    assert!(snapshot.chunks_completed < snapshot.chunks_total);
    // The completed work is charged even though it overran the cap
    assert!(snapshot.actual_cost_usd > budget);

    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    let succeeded = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Succeeded)
        .count();
    assert_eq!(succeeded, 1);
    // Everything still queued when the cap tripped was abandoned
    for task in tasks.iter().filter(|t| t.status == TaskStatus::Abandoned) {
        assert_eq!(task.abandon_reason, Some(AbandonReason::JobAborted));
    }
    assert_eq!(
        succeeded + tasks.iter().filter(|t| t.status == TaskStatus::Abandoned).count(),
        tasks.len()
    );
}

#[tokio::test]
async fn test_generous_budget_should_not_interfere() {
    let config = test_config_with(2, 1.0, 2.0);
    let (pipeline, _store) = pipeline_with(config, Arc::new(MockProvider::working()));

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
    assert!(snapshot.actual_cost_usd < fast_job_config().budget_cap_usd);
}

#[tokio::test]
async fn test_concurrent_workers_should_not_overshoot_budget() {
    // Four workers and chunks that each cost far more than the cap:
    // dispatch-time reservations keep all but the first attempt from
    // going out, so only one chunk is ever charged.
    let config = test_config_with(4, 1_000_000.0, 1_000_000.0);
    let (pipeline, store) = pipeline_with(config, Arc::new(MockProvider::slow(100)));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();

    let mut job_config = fast_job_config();
    job_config.budget_cap_usd = 1.0;
    let budget = job_config.budget_cap_usd;
    let receipt = pipeline
        .submit_translation("doc-1", job_config)
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    assert_eq!(snapshot.status, JobStatus::PartiallyCompleted);
    let entries = store.get_ledger_entries(&receipt.job_id).await.unwrap();
    assert_eq!(entries.len(), 1);
    // Overshoot is bounded by one in-flight attempt
    let largest = entries.iter().map(|e| e.cost_usd).fold(0.0_f64, f64::max);
    assert!(snapshot.actual_cost_usd <= budget + largest);
}

#[tokio::test]
async fn test_zero_budget_should_dispatch_nothing() {
    // A zero cap authorizes no spend; the job aborts before any work
    // goes out.
    let config = test_config_with(1, 1_000_000.0, 1_000_000.0);
    let (pipeline, _store) = pipeline_with(config, Arc::new(MockProvider::working()));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();

    let mut job_config = fast_job_config();
    job_config.budget_cap_usd = 0.0;
    let receipt = pipeline
        .submit_translation("doc-1", job_config)
        .await
        .unwrap();

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::PartiallyCompleted);
    assert_eq!(snapshot.chunks_completed, 0);
    assert_eq!(snapshot.actual_cost_usd, 0.0);
}

#[tokio::test]
async fn test_success_should_be_priced_by_serving_provider() {
    // The configured default is a priced endpoint, but the only
    // registered provider is a free local model; the ledger prices
    // what actually served each attempt.
    let mut config = test_config_with(2, 1.0, 2.0);
    config
        .available_providers
        .push(ProviderConfig::new(ProviderKind::LocalModel));
    let provider = Arc::new(MockProvider::working().with_kind(ProviderKind::LocalModel));
    let (pipeline, store) = pipeline_with(config, provider);

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
    assert_eq!(snapshot.actual_cost_usd, 0.0);
    for entry in store.get_ledger_entries(&receipt.job_id).await.unwrap() {
        assert_eq!(entry.cost_usd, 0.0);
    }
    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    for task in &tasks {
        assert_eq!(task.provider_used.as_deref(), Some("mock"));
        assert_eq!(task.cost_usd, 0.0);
    }
}
