/*!
 * Data model for the translation pipeline.
 *
 * Documents and chunks are created once and read-only afterwards.
 * TranslationJob and JobTask records are owned exclusively by the
 * orchestrator, which is their only writer; everyone else sees snapshots.
 */

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::ProviderError;

/// A single page of extracted text plus layout hints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    /// 1-based page number
    pub page_number: usize,
    /// Extracted plain text of the page
    pub text: String,
    /// Structural hints from the extractor
    #[serde(default)]
    pub layout: LayoutHints,
}

impl PageText {
    pub fn new(page_number: usize, text: impl Into<String>) -> Self {
        Self {
            page_number,
            text: text.into(),
            layout: LayoutHints::default(),
        }
    }
}

/// Coarse layout metadata reported by the text extractor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LayoutHints {
    /// Number of detected headings on the page
    pub heading_count: usize,
    /// Number of detected tables on the page
    pub table_count: usize,
    /// Number of text columns (1 for plain pages)
    pub column_count: usize,
}

/// Chunking strategy recommended by the analyzer or forced per job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Greedy sentence packing under the token ceiling
    TokenBound,
    /// Whole paragraphs under the token ceiling
    #[default]
    Semantic,
    /// Semantic first, oversized units re-chunked token-bound
    Hybrid,
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkStrategy::TokenBound => write!(f, "token_bound"),
            ChunkStrategy::Semantic => write!(f, "semantic"),
            ChunkStrategy::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl std::str::FromStr for ChunkStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token_bound" => Ok(ChunkStrategy::TokenBound),
            "semantic" => Ok(ChunkStrategy::Semantic),
            "hybrid" => Ok(ChunkStrategy::Hybrid),
            _ => Err(anyhow::anyhow!("Invalid chunk strategy: {}", s)),
        }
    }
}

/// Unit type of a produced chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    /// Paragraph-aligned unit
    Semantic,
    /// Sentence-packed unit
    TokenBound,
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkKind::Semantic => write!(f, "semantic"),
            ChunkKind::TokenBound => write!(f, "token_bound"),
        }
    }
}

/// A bounded unit of source text scheduled for one translation call.
///
/// Created by the chunker, immutable afterwards. The id is deterministic
/// (`{document_id}:{ordinal}`) so that re-chunking identical input yields
/// byte-identical chunk sequences.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// 1-based page the chunk came from
    pub page_number: usize,
    /// Position within the document chunk sequence
    pub ordinal: usize,
    pub text: String,
    pub token_count: usize,
    pub kind: ChunkKind,
}

/// Result of document analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    /// Scalar difficulty in [0, 1]
    pub difficulty_score: f64,
    /// Academic/technical term density sub-score in [0, 1]
    pub term_density: f64,
    /// Structural complexity sub-score in [0, 1]
    pub structural_complexity: f64,
    /// Average sentence length sub-score in [0, 1]
    pub sentence_length_factor: f64,
    pub recommended_strategy: ChunkStrategy,
    /// Estimated source tokens for the whole document
    pub total_tokens: usize,
    pub estimated_cost_usd: f64,
}

/// Document lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Pages extracted, not yet analyzed
    Ingested,
    /// Analysis complete, ready for translation
    Analyzed,
}

impl fmt::Display for DocumentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentStatus::Ingested => write!(f, "ingested"),
            DocumentStatus::Analyzed => write!(f, "analyzed"),
        }
    }
}

/// A translatable document. Mutated once by the analyzer, immutable
/// afterwards except for status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub total_pages: usize,
    pub total_chars: usize,
    pub total_tokens: usize,
    pub difficulty_score: f64,
    pub recommended_strategy: ChunkStrategy,
    pub estimated_cost_usd: f64,
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
}

/// Job status state machine:
/// `pending -> running -> {completed | failed | partially_completed | cancelled}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    /// Every task succeeded
    Completed,
    /// Abandonment ratio exceeded the failure tolerance
    Failed,
    /// Budget cap hit or some tasks abandoned while others succeeded
    PartiallyCompleted,
    /// Cancelled by the caller
    Cancelled,
}

impl JobStatus {
    /// Terminal statuses never mutate again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed
                | JobStatus::Failed
                | JobStatus::PartiallyCompleted
                | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::PartiallyCompleted => write!(f, "partially_completed"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "partially_completed" => Ok(JobStatus::PartiallyCompleted),
            "cancelled" => Ok(JobStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid job status: {}", s)),
        }
    }
}

/// Task status state machine:
/// `queued -> running -> {succeeded | failed}`; `failed` loops back to
/// `queued` until retries are exhausted, then terminal `abandoned`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
    Abandoned,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Abandoned)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Queued => write!(f, "queued"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Succeeded => write!(f, "succeeded"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Abandoned => write!(f, "abandoned"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "queued" => Ok(TaskStatus::Queued),
            "running" => Ok(TaskStatus::Running),
            "succeeded" => Ok(TaskStatus::Succeeded),
            "failed" => Ok(TaskStatus::Failed),
            "abandoned" => Ok(TaskStatus::Abandoned),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// Why a task was terminally abandoned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    /// Transient failures exceeded the retry limit
    RetriesExhausted,
    /// A permanent provider error
    PermanentError,
    /// The parent job aborted (failure ratio or budget cap)
    JobAborted,
    /// The parent job was cancelled by the caller
    Cancelled,
}

impl fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbandonReason::RetriesExhausted => write!(f, "retries_exhausted"),
            AbandonReason::PermanentError => write!(f, "permanent_error"),
            AbandonReason::JobAborted => write!(f, "job_aborted"),
            AbandonReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Per-error-class failure counts exposed in status snapshots
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorSummary {
    counts: BTreeMap<String, u64>,
}

impl ErrorSummary {
    pub fn record(&mut self, error: &ProviderError) {
        *self.counts.entry(error.class().to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, class: &str) -> u64 {
        self.counts.get(class).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for ErrorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .counts
            .iter()
            .map(|(class, count)| format!("{}={}", class, count))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// The per-document-request aggregate of job tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationJob {
    pub id: String,
    pub document_id: String,
    pub target_language: String,
    pub status: JobStatus,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub estimated_cost_usd: f64,
    pub actual_cost_usd: f64,
    pub budget_cap_usd: f64,
    /// Identity used to collapse duplicate submissions
    pub dedup_key: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_summary: ErrorSummary,
}

impl TranslationJob {
    /// Snapshot for the status query surface
    pub fn snapshot(&self) -> JobStatusSnapshot {
        JobStatusSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            chunks_total: self.chunks_total,
            chunks_completed: self.chunks_completed,
            actual_cost_usd: self.actual_cost_usd,
            estimated_cost_usd: self.estimated_cost_usd,
            error_summary: self.error_summary.clone(),
        }
    }
}

/// The per-chunk unit of work tracked by the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTask {
    pub id: String,
    pub job_id: String,
    pub chunk_id: String,
    pub ordinal: usize,
    pub status: TaskStatus,
    /// Invariant: `attempt_count <= max_retries + 1`
    pub attempt_count: u32,
    pub last_error: Option<String>,
    pub provider_used: Option<String>,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub translated_text: Option<String>,
    pub abandon_reason: Option<AbandonReason>,
}

impl JobTask {
    pub fn new(job_id: &str, chunk: &Chunk) -> Self {
        Self {
            id: format!("{}:{}", job_id, chunk.ordinal),
            job_id: job_id.to_string(),
            chunk_id: chunk.id.clone(),
            ordinal: chunk.ordinal,
            status: TaskStatus::Queued,
            attempt_count: 0,
            last_error: None,
            provider_used: None,
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: 0.0,
            translated_text: None,
            abandon_reason: None,
        }
    }
}

/// Append-only cost accounting record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostLedgerEntry {
    pub job_id: String,
    pub chunk_id: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub cost_usd: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Coherent point-in-time view of a job, safe to read mid-failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub chunks_total: usize,
    pub chunks_completed: usize,
    pub actual_cost_usd: f64,
    pub estimated_cost_usd: f64,
    pub error_summary: ErrorSummary,
}

/// Receipt returned by job submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: JobStatus,
    /// True when an existing active job was returned instead of a new one
    pub deduplicated: bool,
}
