/*!
 * In-memory store implementation.
 *
 * Backs tests and embedders that do not need durability. All state
 * lives in `parking_lot::RwLock`-guarded maps; locks are never held
 * across await points.
 */

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::PipelineError;
use crate::models::{Chunk, CostLedgerEntry, Document, JobTask, PageText, TranslationJob};
use crate::quality::QualityReport;

use super::Store;

/// Non-durable store keyed entirely in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Document>>,
    pages: RwLock<HashMap<String, Vec<PageText>>>,
    chunks: RwLock<HashMap<String, Vec<Chunk>>>,
    jobs: RwLock<HashMap<String, TranslationJob>>,
    tasks: RwLock<HashMap<String, HashMap<String, JobTask>>>,
    ledger: RwLock<HashMap<String, Vec<CostLedgerEntry>>>,
    quality: RwLock<HashMap<String, QualityReport>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of jobs ever saved (test helper)
    pub fn job_count(&self) -> usize {
        self.jobs.read().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_document(
        &self,
        document: &Document,
        pages: &[PageText],
    ) -> Result<(), PipelineError> {
        self.documents
            .write()
            .insert(document.id.clone(), document.clone());
        self.pages.write().insert(document.id.clone(), pages.to_vec());
        Ok(())
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, PipelineError> {
        Ok(self.documents.read().get(document_id).cloned())
    }

    async fn get_pages(&self, document_id: &str) -> Result<Vec<PageText>, PipelineError> {
        Ok(self.pages.read().get(document_id).cloned().unwrap_or_default())
    }

    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<(), PipelineError> {
        self.chunks
            .write()
            .insert(document_id.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, PipelineError> {
        Ok(self
            .chunks
            .read()
            .get(document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_job(&self, job: &TranslationJob) -> Result<(), PipelineError> {
        self.jobs.write().insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJob>, PipelineError> {
        Ok(self.jobs.read().get(job_id).cloned())
    }

    async fn save_task(&self, task: &JobTask) -> Result<(), PipelineError> {
        self.tasks
            .write()
            .entry(task.job_id.clone())
            .or_default()
            .insert(task.id.clone(), task.clone());
        Ok(())
    }

    async fn get_tasks(&self, job_id: &str) -> Result<Vec<JobTask>, PipelineError> {
        let mut tasks: Vec<JobTask> = self
            .tasks
            .read()
            .get(job_id)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default();
        tasks.sort_by_key(|t| t.ordinal);
        Ok(tasks)
    }

    async fn save_ledger_entry(&self, entry: &CostLedgerEntry) -> Result<(), PipelineError> {
        self.ledger
            .write()
            .entry(entry.job_id.clone())
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn get_ledger_entries(
        &self,
        job_id: &str,
    ) -> Result<Vec<CostLedgerEntry>, PipelineError> {
        Ok(self.ledger.read().get(job_id).cloned().unwrap_or_default())
    }

    async fn save_quality_report(
        &self,
        job_id: &str,
        report: &QualityReport,
    ) -> Result<(), PipelineError> {
        self.quality
            .write()
            .insert(job_id.to_string(), report.clone());
        Ok(())
    }

    async fn get_quality_report(
        &self,
        job_id: &str,
    ) -> Result<Option<QualityReport>, PipelineError> {
        Ok(self.quality.read().get(job_id).cloned())
    }
}
