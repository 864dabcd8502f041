/*!
 * Append-only cost ledger.
 *
 * Workers append entries concurrently as tasks complete; aggregates are
 * recomputed by summation over the entries, never kept in a mutable
 * running counter. Entries are independent per (job, chunk) and are
 * never mutated or deleted.
 */

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;

use crate::models::CostLedgerEntry;
use crate::pipeline_config::UnitPrice;

/// Thread-safe append-only cost accounting, partitioned per job so that
/// unrelated jobs never contend.
#[derive(Debug, Default)]
pub struct CostLedger {
    entries: RwLock<HashMap<String, Vec<CostLedgerEntry>>>,
}

impl CostLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one completed translation call and return the entry.
    pub fn record(
        &self,
        job_id: &str,
        chunk_id: &str,
        tokens_in: u64,
        tokens_out: u64,
        unit_price: &UnitPrice,
    ) -> CostLedgerEntry {
        let cost_usd = unit_price.cost_usd(tokens_in, tokens_out);
        let entry = CostLedgerEntry {
            job_id: job_id.to_string(),
            chunk_id: chunk_id.to_string(),
            tokens_in,
            tokens_out,
            cost_usd,
            recorded_at: Utc::now(),
        };

        let mut entries = self.entries.write();
        entries
            .entry(job_id.to_string())
            .or_default()
            .push(entry.clone());
        entry
    }

    /// Total spend for a job, recomputed by summation
    pub fn job_total(&self, job_id: &str) -> f64 {
        let entries = self.entries.read();
        entries
            .get(job_id)
            .map(|v| v.iter().map(|e| e.cost_usd).sum())
            .unwrap_or(0.0)
    }

    /// Remaining budget for a job given its cap; may be negative when
    /// in-flight tasks completed after the cap was reached.
    pub fn budget_remaining(&self, job_id: &str, budget_cap_usd: f64) -> f64 {
        budget_cap_usd - self.job_total(job_id)
    }

    /// Number of entries recorded for a job
    pub fn entry_count(&self, job_id: &str) -> usize {
        let entries = self.entries.read();
        entries.get(job_id).map(|v| v.len()).unwrap_or(0)
    }

    /// Snapshot of a job's entries
    pub fn entries_for_job(&self, job_id: &str) -> Vec<CostLedgerEntry> {
        let entries = self.entries.read();
        entries.get(job_id).cloned().unwrap_or_default()
    }
}
