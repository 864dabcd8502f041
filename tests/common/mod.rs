/*!
 * Common test utilities for the tarjoman test suite
 */

use std::sync::Arc;

use tarjoman::models::{ChunkStrategy, PageText};
use tarjoman::pipeline_config::{JobConfig, PipelineConfig, ProviderConfig, ProviderKind};
use tarjoman::providers::Provider;
use tarjoman::store::MemoryStore;
use tarjoman::TranslationPipeline;

/// Initialize logging once for tests run with RUST_LOG set
#[allow(dead_code)]
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Pipeline configuration used across tests: one compatible-endpoint
/// provider with known pricing and a small chunk ceiling so sample
/// documents split into several chunks.
pub fn test_config() -> PipelineConfig {
    test_config_with(2, 1.0, 2.0)
}

/// Variant with explicit worker-pool size and token pricing
pub fn test_config_with(
    concurrency: usize,
    input_price_per_m: f64,
    output_price_per_m: f64,
) -> PipelineConfig {
    let provider = ProviderConfig {
        concurrent_requests: concurrency,
        input_price_per_m,
        output_price_per_m,
        ..ProviderConfig::new(ProviderKind::CompatibleEndpoint)
    };

    PipelineConfig {
        source_language: "en".to_string(),
        target_language: "fa".to_string(),
        provider: ProviderKind::CompatibleEndpoint,
        priority: vec![],
        available_providers: vec![provider],
        analyzer: Default::default(),
        job_defaults: fast_job_config(),
    }
}

/// Job options with near-zero backoff so retry tests run quickly.
/// The semantic strategy is forced so the sample documents chunk
/// deterministically (one paragraph per chunk at this ceiling).
pub fn fast_job_config() -> JobConfig {
    JobConfig {
        target_language: "fa".to_string(),
        budget_cap_usd: 100.0,
        max_unit_tokens: 20,
        backoff_base_ms: 5,
        backoff_cap_ms: 25,
        attempt_timeout_secs: 5,
        strategy_override: Some(ChunkStrategy::Semantic),
        ..JobConfig::default()
    }
}

/// Pipeline over an in-memory store with the given provider
pub fn pipeline_with(
    config: PipelineConfig,
    provider: Arc<dyn Provider>,
) -> (TranslationPipeline, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let pipeline = TranslationPipeline::with_providers(
        config,
        Arc::clone(&store) as Arc<dyn tarjoman::store::Store>,
        vec![provider],
    )
    .expect("failed to build pipeline");
    (pipeline, store)
}

/// Three pages of two paragraphs each. With the test chunk ceiling of
/// 20 tokens every paragraph becomes its own chunk, six in total.
pub fn sample_pages() -> Vec<PageText> {
    let texts = [
        "The study of language is ancient. Scholars debated it for centuries.\n\n\
         Translation carries meaning across borders. It demands care and judgment.",
        "Every document has its own texture. Some read easily and some resist.\n\n\
         A translator weighs every word choice. Context decides what survives.",
        "Machines now share in this work. They are fast but not infallible.\n\n\
         Quality must therefore be measured. Trust is earned through checking.",
    ];
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| PageText::new(i + 1, *t))
        .collect()
}

/// Pages where paragraphs containing the marker will be rejected by a
/// `permanent_for_marked` provider. Paragraph pairs exceed the test
/// chunk ceiling, so every paragraph is its own chunk: six in total,
/// two of them marked.
pub fn poisoned_pages(marker: &str) -> Vec<PageText> {
    let texts = [
        format!(
            "The first page opens with a clean paragraph of simple prose.\n\n\
             This second paragraph carries the {} marker in plain sight.",
            marker
        ),
        format!(
            "Another page begins with harmless text and nothing more to say.\n\n\
             A second {} paragraph follows and will be rejected outright.",
            marker
        ),
        "The closing page stays clean from the first word onward.\n\n\
         One more ordinary paragraph rounds out the document nicely."
            .to_string(),
    ];
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| PageText::new(i + 1, t.clone()))
        .collect()
}
