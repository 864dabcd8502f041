/*!
 * The externally-facing pipeline service.
 *
 * `TranslationPipeline` ties the collaborators together: extraction,
 * analysis, chunking, job orchestration, cost accounting and quality
 * reporting. Embedding applications construct one pipeline per
 * configuration and drive everything through it.
 */

use std::sync::Arc;

use chrono::Utc;
use log::info;
use sha2::{Digest, Sha256};

use crate::analyzer::DocumentAnalyzer;
use crate::chunker::Chunker;
use crate::errors::PipelineError;
use crate::extractor::TextExtractor;
use crate::ledger::CostLedger;
use crate::models::{
    Chunk, Document, DocumentStatus, JobStatusSnapshot, PageText, SubmitReceipt,
};
use crate::orchestrator::JobOrchestrator;
use crate::pipeline_config::{JobConfig, PipelineConfig, ProviderKind};
use crate::providers::compatible::CompatibleEndpoint;
use crate::providers::local::LocalModel;
use crate::providers::online_llm::OnlineLlm;
use crate::providers::router::{ProviderRouter, RoutePolicy};
use crate::providers::Provider;
use crate::quality::QualityReport;
use crate::store::Store;

/// Document translation pipeline facade
pub struct TranslationPipeline {
    config: PipelineConfig,
    analyzer: DocumentAnalyzer,
    router: Arc<ProviderRouter>,
    orchestrator: Arc<JobOrchestrator>,
    ledger: Arc<CostLedger>,
    store: Arc<dyn Store>,
}

impl TranslationPipeline {
    /// Build a pipeline with real provider clients from the configuration
    pub fn new(config: PipelineConfig, store: Arc<dyn Store>) -> Result<Self, PipelineError> {
        config.validate()?;

        let mut providers: Vec<Arc<dyn Provider>> = Vec::new();
        for provider_config in &config.available_providers {
            let provider: Arc<dyn Provider> = match provider_config.kind {
                ProviderKind::OnlineLlm => Arc::new(OnlineLlm::from_config(provider_config)),
                ProviderKind::LocalModel => Arc::new(LocalModel::from_config(provider_config)),
                ProviderKind::CompatibleEndpoint => {
                    Arc::new(CompatibleEndpoint::from_config(provider_config))
                }
            };
            providers.push(provider);
        }

        Self::with_providers(config, store, providers)
    }

    /// Build a pipeline with explicitly supplied providers.
    ///
    /// Used by tests and by embedders with custom provider clients;
    /// skips the credential validation that real clients require.
    pub fn with_providers(
        config: PipelineConfig,
        store: Arc<dyn Store>,
        providers: Vec<Arc<dyn Provider>>,
    ) -> Result<Self, PipelineError> {
        let policy = RoutePolicy {
            default: config.provider,
            priority: config.priority.clone(),
            ..RoutePolicy::default()
        };
        let mut router = ProviderRouter::new(policy);
        for provider in providers {
            router.register(provider);
        }
        let router = Arc::new(router);

        let analyzer = DocumentAnalyzer::new(
            config.analyzer,
            config.unit_price_for(config.provider),
        );
        let ledger = Arc::new(CostLedger::new());
        let orchestrator = Arc::new(JobOrchestrator::new(
            config.clone(),
            Arc::clone(&router),
            Arc::clone(&ledger),
            Arc::clone(&store),
        ));

        Ok(Self {
            config,
            analyzer,
            router,
            orchestrator,
            ledger,
            store,
        })
    }

    /// Extract, analyze and chunk a raw document, persisting the results
    pub async fn ingest(
        &self,
        document_id: &str,
        bytes: &[u8],
        extractor: &dyn TextExtractor,
    ) -> Result<Document, PipelineError> {
        let pages = extractor.extract(bytes)?;
        self.ingest_pages(document_id, pages).await
    }

    /// Analyze and chunk already-extracted pages, persisting the results
    pub async fn ingest_pages(
        &self,
        document_id: &str,
        pages: Vec<PageText>,
    ) -> Result<Document, PipelineError> {
        let analysis = self.analyzer.analyze(&pages)?;

        let document = Document {
            id: document_id.to_string(),
            total_pages: pages.len(),
            total_chars: pages.iter().map(|p| p.text.chars().count()).sum(),
            total_tokens: analysis.total_tokens,
            difficulty_score: analysis.difficulty_score,
            recommended_strategy: analysis.recommended_strategy,
            estimated_cost_usd: analysis.estimated_cost_usd,
            status: DocumentStatus::Analyzed,
            created_at: Utc::now(),
        };

        let chunker = Chunker::new(self.config.job_defaults.max_unit_tokens);
        let chunks = chunker.chunk(document_id, &pages, analysis.recommended_strategy);

        self.store.put_document(&document, &pages).await?;
        self.store.put_chunks(document_id, &chunks).await?;

        info!(
            "Ingested document {} ({} pages, {} chunks, difficulty {:.2}, strategy {})",
            document_id,
            document.total_pages,
            chunks.len(),
            document.difficulty_score,
            document.recommended_strategy
        );
        Ok(document)
    }

    /// Submit a translation job for an ingested document.
    ///
    /// A duplicate submission (same document, target language and
    /// content) while a matching job is still active returns the
    /// existing job instead of starting a new one.
    pub async fn submit_translation(
        &self,
        document_id: &str,
        job_config: JobConfig,
    ) -> Result<SubmitReceipt, PipelineError> {
        job_config
            .validate()
            .map_err(|e| PipelineError::Validation(e.to_string()))?;

        let document = self
            .store
            .get_document(document_id)
            .await?
            .ok_or_else(|| PipelineError::DocumentNotFound(document_id.to_string()))?;

        // Stored chunks were packed at ingest with the recommended
        // strategy and the default ceiling; a job that changes either
        // re-chunks the stored pages.
        let strategy = job_config
            .strategy_override
            .unwrap_or(document.recommended_strategy);
        let chunks = if strategy != document.recommended_strategy
            || job_config.max_unit_tokens != self.config.job_defaults.max_unit_tokens
        {
            let pages = self.store.get_pages(document_id).await?;
            let chunker = Chunker::new(job_config.max_unit_tokens);
            let chunks = chunker.chunk(document_id, &pages, strategy);
            self.store.put_chunks(document_id, &chunks).await?;
            chunks
        } else {
            self.store.get_chunks(document_id).await?
        };

        if chunks.is_empty() {
            return Err(PipelineError::EmptyDocument);
        }

        let dedup_key = dedup_key(document_id, &job_config.target_language, &chunks);
        self.orchestrator
            .spawn_job(
                document_id,
                chunks,
                document.estimated_cost_usd,
                dedup_key,
                job_config,
            )
            .await
    }

    /// Current snapshot of a job, falling back to persisted state for
    /// jobs from earlier process lifetimes.
    pub async fn get_job_status(
        &self,
        job_id: &str,
    ) -> Result<JobStatusSnapshot, PipelineError> {
        if let Some(snapshot) = self.orchestrator.snapshot(job_id) {
            return Ok(snapshot);
        }
        self.store
            .get_job(job_id)
            .await?
            .map(|job| job.snapshot())
            .ok_or_else(|| PipelineError::JobNotFound(job_id.to_string()))
    }

    /// Request cancellation of a running job; terminal jobs are untouched
    pub fn cancel_job(&self, job_id: &str) -> Result<(), PipelineError> {
        self.orchestrator.cancel(job_id)
    }

    /// Block until the job settles into a terminal status
    pub async fn wait_for_terminal(
        &self,
        job_id: &str,
    ) -> Result<JobStatusSnapshot, PipelineError> {
        self.orchestrator.wait_for_terminal(job_id).await
    }

    /// Aggregated quality report of a finished job
    pub async fn get_quality_report(
        &self,
        job_id: &str,
    ) -> Result<QualityReport, PipelineError> {
        let snapshot = self.get_job_status(job_id).await?;
        if !snapshot.status.is_terminal() {
            return Err(PipelineError::Validation(format!(
                "job {} is still {}; quality is reported on finished jobs",
                job_id, snapshot.status
            )));
        }

        self.store
            .get_quality_report(job_id)
            .await?
            .ok_or_else(|| {
                PipelineError::Validation(format!(
                    "job {} produced no scored translations",
                    job_id
                ))
            })
    }

    /// Concatenate the successful chunk translations of a job in
    /// document order.
    pub async fn assemble_translation(&self, job_id: &str) -> Result<String, PipelineError> {
        let tasks = self.store.get_tasks(job_id).await?;
        if tasks.is_empty() {
            return Err(PipelineError::JobNotFound(job_id.to_string()));
        }

        let parts: Vec<&str> = tasks
            .iter()
            .filter_map(|t| t.translated_text.as_deref())
            .collect();
        Ok(parts.join("\n\n"))
    }

    /// Probe every registered provider
    pub async fn health_check(&self) -> std::collections::HashMap<String, bool> {
        self.router.health_check().await
    }

    /// Total recorded spend for a job
    pub fn job_spend(&self, job_id: &str) -> f64 {
        self.ledger.job_total(job_id)
    }
}

/// Submission identity: document, target language and content.
///
/// The content hash covers the chunk texts in order, so a re-ingested
/// document with different content gets a fresh identity.
fn dedup_key(document_id: &str, target_language: &str, chunks: &[Chunk]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(b"|");
    hasher.update(target_language.as_bytes());
    for chunk in chunks {
        hasher.update(b"|");
        hasher.update(chunk.text.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ChunkKind;

    fn chunk(text: &str, ordinal: usize) -> Chunk {
        Chunk {
            id: format!("doc:{:04}", ordinal),
            document_id: "doc".to_string(),
            page_number: 1,
            ordinal,
            text: text.to_string(),
            token_count: 2,
            kind: ChunkKind::Semantic,
        }
    }

    #[test]
    fn test_dedup_key_should_depend_on_content() {
        let a = dedup_key("doc", "fa", &[chunk("hello", 0)]);
        let b = dedup_key("doc", "fa", &[chunk("hello", 0)]);
        let c = dedup_key("doc", "fa", &[chunk("changed", 0)]);
        let d = dedup_key("doc", "de", &[chunk("hello", 0)]);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
