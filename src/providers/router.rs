/*!
 * Provider routing and failover.
 *
 * The router owns the set of registered providers and picks one for
 * each task attempt. Selection honors a per-job override when present,
 * otherwise the configured default followed by the priority order, and
 * skips providers that have already failed repeatedly for the job.
 */

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use parking_lot::RwLock;

use crate::errors::PipelineError;
use crate::pipeline_config::ProviderKind;

use super::Provider;

/// Routing policy derived from the pipeline configuration
#[derive(Debug, Clone)]
pub struct RoutePolicy {
    /// Default provider when the job does not override
    pub default: ProviderKind,
    /// Fallback order tried after the default
    pub priority: Vec<ProviderKind>,
    /// Failures per provider per job before the router routes around it
    pub failover_threshold: u32,
}

impl Default for RoutePolicy {
    fn default() -> Self {
        Self {
            default: ProviderKind::default(),
            priority: vec![ProviderKind::LocalModel, ProviderKind::CompatibleEndpoint],
            failover_threshold: 2,
        }
    }
}

/// Per-job record of observed provider failures
#[derive(Debug, Default)]
pub struct FailureHistory {
    counts: HashMap<String, u32>,
}

impl FailureHistory {
    pub fn record(&mut self, provider: &str) {
        *self.counts.entry(provider.to_string()).or_insert(0) += 1;
    }

    pub fn failures(&self, provider: &str) -> u32 {
        self.counts.get(provider).copied().unwrap_or(0)
    }
}

/// Routes translation requests to a registered provider
pub struct ProviderRouter {
    policy: RoutePolicy,
    providers: Vec<Arc<dyn Provider>>,
    history: RwLock<HashMap<String, FailureHistory>>,
}

impl std::fmt::Debug for ProviderRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRouter")
            .field("policy", &self.policy)
            .field("providers", &self.providers.len())
            .finish()
    }
}

impl ProviderRouter {
    pub fn new(policy: RoutePolicy) -> Self {
        Self {
            policy,
            providers: Vec::new(),
            history: RwLock::new(HashMap::new()),
        }
    }

    /// Register a provider. Registration order breaks ties between
    /// providers of the same kind.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        debug!("Registered provider '{}'", provider.name());
        self.providers.push(provider);
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Record a failed attempt against a provider for failover routing
    pub fn record_failure(&self, job_id: &str, provider: &str) {
        let mut history = self.history.write();
        history.entry(job_id.to_string()).or_default().record(provider);
    }

    /// Drop accumulated failure history for a finished job
    pub fn forget_job(&self, job_id: &str) {
        self.history.write().remove(job_id);
    }

    /// Pick a provider for a task attempt.
    ///
    /// Candidates are ordered by the job override (when set), then the
    /// default, then the priority list, then anything else registered.
    /// Providers at or past the failover threshold for this job are
    /// skipped; when every candidate is past it, the least-failed one
    /// is used anyway so a job cannot starve.
    pub fn select(
        &self,
        job_id: &str,
        override_kind: Option<ProviderKind>,
        chunk_tokens: usize,
    ) -> Result<Arc<dyn Provider>, PipelineError> {
        if self.providers.is_empty() {
            return Err(PipelineError::NoProvider(
                "no providers registered".to_string(),
            ));
        }

        let order = self.candidate_order(override_kind);
        let history = self.history.read();
        let failures = |p: &Arc<dyn Provider>| {
            history
                .get(job_id)
                .map(|h| h.failures(p.name()))
                .unwrap_or(0)
        };

        let candidates: Vec<&Arc<dyn Provider>> = order
            .iter()
            .flat_map(|kind| self.providers.iter().filter(move |p| p.kind() == *kind))
            .collect();

        // First pass: healthy-by-history providers that fit the chunk
        let pick = candidates
            .iter()
            .find(|p| {
                failures(p) < self.policy.failover_threshold
                    && chunk_tokens <= p.max_input_tokens()
            })
            // Second pass: tolerate an oversized chunk rather than stall
            .or_else(|| {
                candidates
                    .iter()
                    .find(|p| failures(p) < self.policy.failover_threshold)
            })
            // Last resort: least-failed candidate
            .or_else(|| candidates.iter().min_by_key(|p| failures(p)));

        match pick {
            Some(provider) => Ok(Arc::clone(provider)),
            None => Err(PipelineError::NoProvider(format!(
                "no registered provider matches kinds {:?}",
                order
            ))),
        }
    }

    /// Probe every registered provider
    pub async fn health_check(&self) -> HashMap<String, bool> {
        let mut results = HashMap::new();
        for provider in &self.providers {
            let ok = provider.healthy().await;
            if !ok {
                warn!("Provider '{}' failed health check", provider.name());
            }
            results.insert(provider.name().to_string(), ok);
        }
        results
    }

    fn candidate_order(&self, override_kind: Option<ProviderKind>) -> Vec<ProviderKind> {
        let mut order = Vec::new();
        let mut push = |kind: ProviderKind, order: &mut Vec<ProviderKind>| {
            if !order.contains(&kind) {
                order.push(kind);
            }
        };

        if let Some(kind) = override_kind {
            push(kind, &mut order);
        }
        push(self.policy.default, &mut order);
        for kind in &self.policy.priority {
            push(*kind, &mut order);
        }
        for provider in &self.providers {
            push(provider.kind(), &mut order);
        }
        order
    }
}
