/*!
 * # tarjoman - document translation job pipeline
 *
 * A Rust library implementing the core pipeline of a PDF document
 * translation application (English to Persian by default).
 *
 * ## Features
 *
 * - Document difficulty analysis and chunking-strategy recommendation
 * - Token-aware chunking (token-bound, semantic and hybrid strategies)
 * - Interchangeable translation providers:
 *   - Online LLM API (metered, rate limited)
 *   - Local model server (offline, unmetered)
 *   - OpenAI-compatible endpoint (independently configured)
 * - Async job orchestration over a bounded worker pool with retries,
 *   budget enforcement and cooperative cancellation
 * - Append-only cost ledger with per-job budget queries
 * - Multi-dimensional translation quality scoring
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `pipeline_config`: Configuration management
 * - `extractor`: Text extraction collaborator interface
 * - `analyzer`: Document difficulty analysis
 * - `chunker`: Splitting page text into bounded translation units
 * - `providers`: Client implementations for translation backends:
 *   - `providers::online_llm`: Online LLM chat API client
 *   - `providers::local`: Local model server client
 *   - `providers::compatible`: OpenAI-compatible endpoint client
 *   - `providers::router`: Pure provider selection
 *   - `providers::mock`: Scripted providers for testing
 * - `orchestrator`: The job state machine and worker pool
 * - `ledger`: Append-only cost accounting
 * - `quality`: Translation quality scoring
 * - `store`: Persistence repository interface and implementations
 * - `pipeline`: The externally-facing service facade
 * - `errors`: Custom error types for the pipeline
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod analyzer;
pub mod chunker;
pub mod errors;
pub mod extractor;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod pipeline;
pub mod pipeline_config;
pub mod providers;
pub mod quality;
pub mod store;

// Re-export main types for easier usage
pub use errors::{PipelineError, ProviderError};
pub use models::{Chunk, ChunkStrategy, Document, JobStatus, JobTask, TaskStatus, TranslationJob};
pub use pipeline::TranslationPipeline;
pub use pipeline_config::{JobConfig, PipelineConfig, ProviderKind};
pub use quality::QualityReport;
