/*!
 * Persistence layer for documents, chunks, jobs and tasks.
 *
 * The `Store` trait is the single persistence seam of the pipeline.
 * Two implementations are provided: an in-memory store used by tests
 * and short-lived embedders, and a SQLite store for durable state.
 *
 * Store writes made by the orchestrator are best-effort: a failed write
 * is logged and the in-memory state remains authoritative for the
 * lifetime of the process.
 */

use async_trait::async_trait;

use crate::errors::PipelineError;
use crate::models::{Chunk, CostLedgerEntry, Document, JobTask, PageText, TranslationJob};
use crate::quality::QualityReport;

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Persistence operations used by the pipeline.
///
/// All methods are idempotent upserts keyed by the record's id, so
/// the orchestrator can re-save on every transition without caring
/// whether the record exists yet.
#[async_trait]
pub trait Store: Send + Sync {
    /// Persist a document and its extracted pages
    async fn put_document(
        &self,
        document: &Document,
        pages: &[PageText],
    ) -> Result<(), PipelineError>;

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, PipelineError>;

    async fn get_pages(&self, document_id: &str) -> Result<Vec<PageText>, PipelineError>;

    /// Persist the chunk sequence of a document, replacing any previous one
    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<(), PipelineError>;

    /// Chunks in ordinal order
    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, PipelineError>;

    async fn save_job(&self, job: &TranslationJob) -> Result<(), PipelineError>;

    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJob>, PipelineError>;

    async fn save_task(&self, task: &JobTask) -> Result<(), PipelineError>;

    /// Tasks of a job in ordinal order
    async fn get_tasks(&self, job_id: &str) -> Result<Vec<JobTask>, PipelineError>;

    async fn save_ledger_entry(&self, entry: &CostLedgerEntry) -> Result<(), PipelineError>;

    async fn get_ledger_entries(
        &self,
        job_id: &str,
    ) -> Result<Vec<CostLedgerEntry>, PipelineError>;

    /// Persist the aggregated quality report of a finished job
    async fn save_quality_report(
        &self,
        job_id: &str,
        report: &QualityReport,
    ) -> Result<(), PipelineError>;

    async fn get_quality_report(
        &self,
        job_id: &str,
    ) -> Result<Option<QualityReport>, PipelineError>;
}
