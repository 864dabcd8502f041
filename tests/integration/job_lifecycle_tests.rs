/*!
 * End-to-end job lifecycle tests over mock providers and the
 * in-memory store.
 */

use std::sync::Arc;

use tarjoman::errors::PipelineError;
use tarjoman::models::{JobStatus, TaskStatus};
use tarjoman::providers::mock::MockProvider;
use tarjoman::store::Store;

use crate::common::{fast_job_config, init_logging, pipeline_with, sample_pages, test_config};

#[tokio::test]
async fn test_happy_path_job_should_complete_all_chunks() {
    init_logging();
    let (pipeline, store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    let document = pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .expect("ingest failed");
    assert_eq!(document.total_pages, 3);
    assert!(document.estimated_cost_usd > 0.0);

    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .expect("submit failed");
    assert!(!receipt.deduplicated);

    let snapshot = pipeline
        .wait_for_terminal(&receipt.job_id)
        .await
        .expect("wait failed");

    assert_eq!(snapshot.status, JobStatus::Completed);
    assert_eq!(snapshot.chunks_completed, snapshot.chunks_total);
    assert!(snapshot.chunks_total > 1);
    assert!(snapshot.actual_cost_usd > 0.0);
    assert!(snapshot.error_summary.is_empty());

    // One ledger entry per translated chunk, and the job total matches
    let chunks = store.get_chunks("doc-1").await.unwrap();
    let entries = store.get_ledger_entries(&receipt.job_id).await.unwrap();
    assert_eq!(entries.len(), chunks.len());
    let entry_total: f64 = entries.iter().map(|e| e.cost_usd).sum();
    assert!((entry_total - snapshot.actual_cost_usd).abs() < 1e-9);

    // Every task succeeded on its first attempt
    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    assert_eq!(tasks.len(), chunks.len());
    for task in &tasks {
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.attempt_count, 1);
        assert!(task.translated_text.as_deref().unwrap().starts_with("[FA]"));
    }
}

#[tokio::test]
async fn test_transient_failures_should_retry_until_success() {
    let provider = Arc::new(MockProvider::transient_then_succeed(2));
    let (pipeline, store) = pipeline_with(test_config(), provider);

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
    assert_eq!(snapshot.chunks_completed, snapshot.chunks_total);
    // Transient failures were counted but did not fail the job
    assert!(snapshot.error_summary.count("timeout") > 0);

    // Each chunk took exactly two failed attempts plus one success
    let tasks = store.get_tasks(&receipt.job_id).await.unwrap();
    for task in &tasks {
        assert_eq!(task.status, TaskStatus::Succeeded);
        assert_eq!(task.attempt_count, 3);
    }
}

#[tokio::test]
async fn test_duplicate_submission_should_return_active_job() {
    // Slow provider keeps the first job active while we resubmit
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::slow(300)));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();

    let first = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();
    let second = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();

    assert!(second.deduplicated);
    assert_eq!(first.job_id, second.job_id);

    // A different target language is a different submission identity
    let mut other_lang = fast_job_config();
    other_lang.target_language = "de".to_string();
    let third = pipeline
        .submit_translation("doc-1", other_lang)
        .await
        .unwrap();
    assert!(!third.deduplicated);
    assert_ne!(first.job_id, third.job_id);

    // Once terminal, the same submission starts a fresh job
    pipeline.wait_for_terminal(&first.job_id).await.unwrap();
    let fourth = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();
    assert!(!fourth.deduplicated);
    assert_ne!(first.job_id, fourth.job_id);
}

#[tokio::test]
async fn test_racing_duplicate_submissions_should_share_one_job() {
    // Submissions racing in from several tasks must settle on a single
    // job; the dedup lookup and registration are atomic.
    let (pipeline, store) = pipeline_with(test_config(), Arc::new(MockProvider::slow(200)));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();

    let pipeline = Arc::new(pipeline);
    let mut submissions = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        submissions.push(tokio::spawn(async move {
            pipeline
                .submit_translation("doc-1", fast_job_config())
                .await
                .unwrap()
        }));
    }

    let mut receipts = Vec::new();
    for submission in submissions {
        receipts.push(submission.await.unwrap());
    }

    let fresh: Vec<_> = receipts.iter().filter(|r| !r.deduplicated).collect();
    assert_eq!(fresh.len(), 1);
    for receipt in &receipts {
        assert_eq!(receipt.job_id, fresh[0].job_id);
    }
    assert_eq!(store.job_count(), 1);
}

#[tokio::test]
async fn test_submit_with_tighter_ceiling_should_rechunk_document() {
    let (pipeline, store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let ingested = store.get_chunks("doc-1").await.unwrap().len();

    // Same strategy as the recommendation, but a tighter token ceiling
    // than ingest packed with
    let mut job_config = fast_job_config();
    job_config.max_unit_tokens = 10;
    let receipt = pipeline
        .submit_translation("doc-1", job_config)
        .await
        .unwrap();
    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    let rechunked = store.get_chunks("doc-1").await.unwrap();
    assert!(rechunked.len() > ingested);
    assert_eq!(snapshot.chunks_total, rechunked.len());
    for chunk in &rechunked {
        assert!(chunk.token_count <= 10);
    }
}

#[tokio::test]
async fn test_quality_report_available_only_after_terminal() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::slow(300)));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();

    // Still running: quality is not reportable yet
    let early = pipeline.get_quality_report(&receipt.job_id).await;
    assert!(matches!(early, Err(PipelineError::Validation(_))));

    let snapshot = pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();
    assert_eq!(snapshot.status, JobStatus::Completed);

    let report = pipeline.get_quality_report(&receipt.job_id).await.unwrap();
    assert_eq!(report.chunks_evaluated, snapshot.chunks_total);
    assert!(report.overall_score > 0.0 && report.overall_score <= 1.0);
}

#[tokio::test]
async fn test_assemble_translation_should_join_in_document_order() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    pipeline
        .ingest_pages("doc-1", sample_pages())
        .await
        .unwrap();
    let receipt = pipeline
        .submit_translation("doc-1", fast_job_config())
        .await
        .unwrap();
    pipeline.wait_for_terminal(&receipt.job_id).await.unwrap();

    let text = pipeline.assemble_translation(&receipt.job_id).await.unwrap();
    assert!(text.starts_with("[FA]"));
    // First page content precedes last page content
    let first = text.find("study of language").unwrap();
    let last = text.find("Trust is earned").unwrap();
    assert!(first < last);
}

#[tokio::test]
async fn test_submit_for_unknown_document_should_fail() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    let result = pipeline
        .submit_translation("no-such-doc", fast_job_config())
        .await;
    assert!(matches!(result, Err(PipelineError::DocumentNotFound(_))));
}

#[tokio::test]
async fn test_status_of_unknown_job_should_fail() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    let result = pipeline.get_job_status("no-such-job").await;
    assert!(matches!(result, Err(PipelineError::JobNotFound(_))));
}

#[tokio::test]
async fn test_ingest_empty_document_should_fail() {
    let (pipeline, _store) = pipeline_with(test_config(), Arc::new(MockProvider::working()));

    let pages = vec![tarjoman::models::PageText::new(1, "   \n  ")];
    let result = pipeline.ingest_pages("doc-empty", pages).await;
    assert!(matches!(result, Err(PipelineError::EmptyDocument)));
}
