/*!
 * SQLite store implementation.
 *
 * Durable persistence behind the `Store` trait. The connection is
 * wrapped in `Arc<Mutex<_>>` and every operation runs on the blocking
 * pool so the async runtime is never stalled by disk I/O.
 *
 * Timestamps are stored as RFC 3339 text; structured fields with no
 * natural column shape (error summaries, layout hints) are stored as
 * JSON text.
 */

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};

use crate::errors::PipelineError;
use crate::models::{
    Chunk, CostLedgerEntry, Document, JobTask, PageText, TranslationJob,
};
use crate::quality::QualityReport;

use super::Store;

/// Current schema version
const SCHEMA_VERSION: i32 = 1;

/// Durable store backed by a single SQLite database file
#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    connection: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create database directory: {:?}", parent))?;
        }

        info!("Opening database at: {:?}", db_path);

        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open database: {:?}", db_path))?;
        initialize_schema(&conn)?;

        Ok(Self {
            db_path,
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        debug!("Creating in-memory database");

        let conn = Connection::open_in_memory().context("Failed to create in-memory database")?;
        initialize_schema(&conn)?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            connection: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Run a database operation on the blocking pool
    async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| anyhow::anyhow!("Failed to acquire database lock: {}", e))?;

            f(&conn)
        })
        .await
        .context("Database task panicked")?
    }
}

/// Initialize the database schema
fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            version INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            total_pages INTEGER NOT NULL,
            total_chars INTEGER NOT NULL,
            total_tokens INTEGER NOT NULL,
            difficulty_score REAL NOT NULL,
            recommended_strategy TEXT NOT NULL,
            estimated_cost_usd REAL NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS pages (
            document_id TEXT NOT NULL REFERENCES documents(id),
            page_number INTEGER NOT NULL,
            text TEXT NOT NULL,
            layout_json TEXT NOT NULL,
            PRIMARY KEY (document_id, page_number)
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL REFERENCES documents(id),
            page_number INTEGER NOT NULL,
            ordinal INTEGER NOT NULL,
            text TEXT NOT NULL,
            token_count INTEGER NOT NULL,
            kind TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_chunks_document
            ON chunks(document_id, ordinal);

        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            document_id TEXT NOT NULL,
            target_language TEXT NOT NULL,
            status TEXT NOT NULL,
            chunks_total INTEGER NOT NULL,
            chunks_completed INTEGER NOT NULL,
            estimated_cost_usd REAL NOT NULL,
            actual_cost_usd REAL NOT NULL,
            budget_cap_usd REAL NOT NULL,
            dedup_key TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            error_summary_json TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_jobs_dedup ON jobs(dedup_key);

        CREATE TABLE IF NOT EXISTS tasks (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id),
            chunk_id TEXT NOT NULL,
            ordinal INTEGER NOT NULL,
            status TEXT NOT NULL,
            attempt_count INTEGER NOT NULL,
            last_error TEXT,
            provider_used TEXT,
            tokens_in INTEGER NOT NULL,
            tokens_out INTEGER NOT NULL,
            cost_usd REAL NOT NULL,
            translated_text TEXT,
            abandon_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_job ON tasks(job_id, ordinal);

        CREATE TABLE IF NOT EXISTS ledger (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            tokens_in INTEGER NOT NULL,
            tokens_out INTEGER NOT NULL,
            cost_usd REAL NOT NULL,
            recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_ledger_job ON ledger(job_id);

        CREATE TABLE IF NOT EXISTS quality_reports (
            job_id TEXT PRIMARY KEY,
            report_json TEXT NOT NULL
        );
        "#,
    )?;

    conn.execute(
        "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
        [SCHEMA_VERSION],
    )?;

    Ok(())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn map_err(e: anyhow::Error) -> PipelineError {
    PipelineError::Store(e.to_string())
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Document> {
    let strategy: String = row.get(5)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;
    Ok(Document {
        id: row.get(0)?,
        total_pages: row.get::<_, i64>(1)? as usize,
        total_chars: row.get::<_, i64>(2)? as usize,
        total_tokens: row.get::<_, i64>(3)? as usize,
        difficulty_score: row.get(4)?,
        recommended_strategy: strategy.parse().unwrap_or_default(),
        estimated_cost_usd: row.get(6)?,
        status: serde_json::from_value(serde_json::Value::String(status))
            .unwrap_or(crate::models::DocumentStatus::Ingested),
        created_at: parse_timestamp(Some(created_at)).unwrap_or_else(Utc::now),
    })
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TranslationJob> {
    let status: String = row.get(3)?;
    let summary_json: String = row.get(12)?;
    Ok(TranslationJob {
        id: row.get(0)?,
        document_id: row.get(1)?,
        target_language: row.get(2)?,
        status: status.parse().unwrap_or(crate::models::JobStatus::Pending),
        chunks_total: row.get::<_, i64>(4)? as usize,
        chunks_completed: row.get::<_, i64>(5)? as usize,
        estimated_cost_usd: row.get(6)?,
        actual_cost_usd: row.get(7)?,
        budget_cap_usd: row.get(8)?,
        dedup_key: row.get(9)?,
        started_at: parse_timestamp(row.get(10)?),
        completed_at: parse_timestamp(row.get(11)?),
        error_summary: serde_json::from_str(&summary_json).unwrap_or_default(),
    })
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobTask> {
    let status: String = row.get(4)?;
    let abandon: Option<String> = row.get(12)?;
    Ok(JobTask {
        id: row.get(0)?,
        job_id: row.get(1)?,
        chunk_id: row.get(2)?,
        ordinal: row.get::<_, i64>(3)? as usize,
        status: status.parse().unwrap_or(crate::models::TaskStatus::Queued),
        attempt_count: row.get::<_, i64>(5)? as u32,
        last_error: row.get(6)?,
        provider_used: row.get(7)?,
        tokens_in: row.get::<_, i64>(8)? as u64,
        tokens_out: row.get::<_, i64>(9)? as u64,
        cost_usd: row.get(10)?,
        translated_text: row.get(11)?,
        abandon_reason: abandon
            .and_then(|s| serde_json::from_value(serde_json::Value::String(s)).ok()),
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn put_document(
        &self,
        document: &Document,
        pages: &[PageText],
    ) -> Result<(), PipelineError> {
        let document = document.clone();
        let pages = pages.to_vec();

        self.execute_async(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO documents (
                    id, total_pages, total_chars, total_tokens, difficulty_score,
                    recommended_strategy, estimated_cost_usd, status, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                "#,
                params![
                    document.id,
                    document.total_pages as i64,
                    document.total_chars as i64,
                    document.total_tokens as i64,
                    document.difficulty_score,
                    document.recommended_strategy.to_string(),
                    document.estimated_cost_usd,
                    document.status.to_string(),
                    document.created_at.to_rfc3339(),
                ],
            )?;

            for page in &pages {
                conn.execute(
                    r#"
                    INSERT OR REPLACE INTO pages (document_id, page_number, text, layout_json)
                    VALUES (?1, ?2, ?3, ?4)
                    "#,
                    params![
                        document.id,
                        page.page_number as i64,
                        page.text,
                        serde_json::to_string(&page.layout)?,
                    ],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_document(&self, document_id: &str) -> Result<Option<Document>, PipelineError> {
        let document_id = document_id.to_string();

        self.execute_async(move |conn| {
            let result = conn
                .query_row(
                    r#"
                    SELECT id, total_pages, total_chars, total_tokens, difficulty_score,
                           recommended_strategy, estimated_cost_usd, status, created_at
                    FROM documents WHERE id = ?1
                    "#,
                    [document_id],
                    document_from_row,
                )
                .optional()?;
            Ok(result)
        })
        .await
        .map_err(map_err)
    }

    async fn get_pages(&self, document_id: &str) -> Result<Vec<PageText>, PipelineError> {
        let document_id = document_id.to_string();

        self.execute_async(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT page_number, text, layout_json FROM pages
                 WHERE document_id = ?1 ORDER BY page_number",
            )?;
            let pages = stmt
                .query_map([document_id], |row| {
                    let layout_json: String = row.get(2)?;
                    Ok(PageText {
                        page_number: row.get::<_, i64>(0)? as usize,
                        text: row.get(1)?,
                        layout: serde_json::from_str(&layout_json).unwrap_or_default(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(pages)
        })
        .await
        .map_err(map_err)
    }

    async fn put_chunks(&self, document_id: &str, chunks: &[Chunk]) -> Result<(), PipelineError> {
        let document_id = document_id.to_string();
        let chunks = chunks.to_vec();

        self.execute_async(move |conn| {
            conn.execute("DELETE FROM chunks WHERE document_id = ?1", [&document_id])?;
            for chunk in &chunks {
                conn.execute(
                    r#"
                    INSERT INTO chunks (id, document_id, page_number, ordinal, text, token_count, kind)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                    "#,
                    params![
                        chunk.id,
                        chunk.document_id,
                        chunk.page_number as i64,
                        chunk.ordinal as i64,
                        chunk.text,
                        chunk.token_count as i64,
                        chunk.kind.to_string(),
                    ],
                )?;
            }
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>, PipelineError> {
        let document_id = document_id.to_string();

        self.execute_async(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, document_id, page_number, ordinal, text, token_count, kind
                 FROM chunks WHERE document_id = ?1 ORDER BY ordinal",
            )?;
            let chunks = stmt
                .query_map([document_id], |row| {
                    let kind: String = row.get(6)?;
                    Ok(Chunk {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        page_number: row.get::<_, i64>(2)? as usize,
                        ordinal: row.get::<_, i64>(3)? as usize,
                        text: row.get(4)?,
                        token_count: row.get::<_, i64>(5)? as usize,
                        kind: serde_json::from_value(serde_json::Value::String(kind))
                            .unwrap_or(crate::models::ChunkKind::Semantic),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(chunks)
        })
        .await
        .map_err(map_err)
    }

    async fn save_job(&self, job: &TranslationJob) -> Result<(), PipelineError> {
        let job = job.clone();

        self.execute_async(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO jobs (
                    id, document_id, target_language, status, chunks_total,
                    chunks_completed, estimated_cost_usd, actual_cost_usd,
                    budget_cap_usd, dedup_key, started_at, completed_at,
                    error_summary_json
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    job.id,
                    job.document_id,
                    job.target_language,
                    job.status.to_string(),
                    job.chunks_total as i64,
                    job.chunks_completed as i64,
                    job.estimated_cost_usd,
                    job.actual_cost_usd,
                    job.budget_cap_usd,
                    job.dedup_key,
                    job.started_at.map(|t| t.to_rfc3339()),
                    job.completed_at.map(|t| t.to_rfc3339()),
                    serde_json::to_string(&job.error_summary)?,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<TranslationJob>, PipelineError> {
        let job_id = job_id.to_string();

        self.execute_async(move |conn| {
            let result = conn
                .query_row(
                    r#"
                    SELECT id, document_id, target_language, status, chunks_total,
                           chunks_completed, estimated_cost_usd, actual_cost_usd,
                           budget_cap_usd, dedup_key, started_at, completed_at,
                           error_summary_json
                    FROM jobs WHERE id = ?1
                    "#,
                    [job_id],
                    job_from_row,
                )
                .optional()?;
            Ok(result)
        })
        .await
        .map_err(map_err)
    }

    async fn save_task(&self, task: &JobTask) -> Result<(), PipelineError> {
        let task = task.clone();

        self.execute_async(move |conn| {
            conn.execute(
                r#"
                INSERT OR REPLACE INTO tasks (
                    id, job_id, chunk_id, ordinal, status, attempt_count,
                    last_error, provider_used, tokens_in, tokens_out,
                    cost_usd, translated_text, abandon_reason
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
                params![
                    task.id,
                    task.job_id,
                    task.chunk_id,
                    task.ordinal as i64,
                    task.status.to_string(),
                    task.attempt_count as i64,
                    task.last_error,
                    task.provider_used,
                    task.tokens_in as i64,
                    task.tokens_out as i64,
                    task.cost_usd,
                    task.translated_text,
                    task.abandon_reason.map(|r| r.to_string()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_tasks(&self, job_id: &str) -> Result<Vec<JobTask>, PipelineError> {
        let job_id = job_id.to_string();

        self.execute_async(move |conn| {
            let mut stmt = conn.prepare(
                r#"
                SELECT id, job_id, chunk_id, ordinal, status, attempt_count,
                       last_error, provider_used, tokens_in, tokens_out,
                       cost_usd, translated_text, abandon_reason
                FROM tasks WHERE job_id = ?1 ORDER BY ordinal
                "#,
            )?;
            let tasks = stmt
                .query_map([job_id], task_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(tasks)
        })
        .await
        .map_err(map_err)
    }

    async fn save_ledger_entry(&self, entry: &CostLedgerEntry) -> Result<(), PipelineError> {
        let entry = entry.clone();

        self.execute_async(move |conn| {
            conn.execute(
                r#"
                INSERT INTO ledger (job_id, chunk_id, tokens_in, tokens_out, cost_usd, recorded_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    entry.job_id,
                    entry.chunk_id,
                    entry.tokens_in as i64,
                    entry.tokens_out as i64,
                    entry.cost_usd,
                    entry.recorded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_ledger_entries(
        &self,
        job_id: &str,
    ) -> Result<Vec<CostLedgerEntry>, PipelineError> {
        let job_id = job_id.to_string();

        self.execute_async(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT job_id, chunk_id, tokens_in, tokens_out, cost_usd, recorded_at
                 FROM ledger WHERE job_id = ?1 ORDER BY id",
            )?;
            let entries = stmt
                .query_map([job_id], |row| {
                    let recorded_at: String = row.get(5)?;
                    Ok(CostLedgerEntry {
                        job_id: row.get(0)?,
                        chunk_id: row.get(1)?,
                        tokens_in: row.get::<_, i64>(2)? as u64,
                        tokens_out: row.get::<_, i64>(3)? as u64,
                        cost_usd: row.get(4)?,
                        recorded_at: parse_timestamp(Some(recorded_at))
                            .unwrap_or_else(Utc::now),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
        .await
        .map_err(map_err)
    }

    async fn save_quality_report(
        &self,
        job_id: &str,
        report: &QualityReport,
    ) -> Result<(), PipelineError> {
        let job_id = job_id.to_string();
        let report = report.clone();

        self.execute_async(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO quality_reports (job_id, report_json) VALUES (?1, ?2)",
                params![job_id, serde_json::to_string(&report)?],
            )?;
            Ok(())
        })
        .await
        .map_err(map_err)
    }

    async fn get_quality_report(
        &self,
        job_id: &str,
    ) -> Result<Option<QualityReport>, PipelineError> {
        let job_id = job_id.to_string();

        self.execute_async(move |conn| {
            let json: Option<String> = conn
                .query_row(
                    "SELECT report_json FROM quality_reports WHERE job_id = ?1",
                    [job_id],
                    |row| row.get(0),
                )
                .optional()?;

            match json {
                Some(json) => Ok(Some(serde_json::from_str(&json)?)),
                None => Ok(None),
            }
        })
        .await
        .map_err(map_err)
    }
}
