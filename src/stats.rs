//! Run statistics.
//!
//! One collector instance is created per run, threaded by reference through
//! the pipeline, and finalized exactly once at the end. Nothing here is
//! global or shared across runs.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::ErrorType;
use crate::degrade::DegradationTier;

pub struct StatisticsCollector {
    planned: usize,
    succeeded: usize,
    partial_succeeded: usize,
    failed: usize,
    skipped: usize,
    retries: usize,
    error_type_counts: BTreeMap<String, usize>,
    recovery_tier_counts: BTreeMap<String, usize>,
    substitution_counts: BTreeMap<String, usize>,
    total_latency: Duration,
    timed_items: usize,
    started_at: DateTime<Utc>,
    started_instant: Instant,
}

impl StatisticsCollector {
    pub fn new(planned: usize) -> Self {
        Self {
            planned,
            succeeded: 0,
            partial_succeeded: 0,
            failed: 0,
            skipped: 0,
            retries: 0,
            error_type_counts: BTreeMap::new(),
            recovery_tier_counts: BTreeMap::new(),
            substitution_counts: BTreeMap::new(),
            total_latency: Duration::ZERO,
            timed_items: 0,
            started_at: Utc::now(),
            started_instant: Instant::now(),
        }
    }

    pub fn record_success(&mut self, elapsed: Duration) {
        self.succeeded += 1;
        self.add_timing(elapsed);
    }

    pub fn record_partial_success(&mut self, elapsed: Duration) {
        self.partial_succeeded += 1;
        self.add_timing(elapsed);
    }

    pub fn record_failure(&mut self, error_type: ErrorType, elapsed: Duration) {
        self.failed += 1;
        self.count_error(error_type);
        self.add_timing(elapsed);
    }

    pub fn record_skip(&mut self, error_type: ErrorType) {
        self.skipped += 1;
        self.count_error(error_type);
    }

    pub fn record_retries(&mut self, count: usize) {
        self.retries += count;
    }

    pub fn record_recovery_tier(&mut self, tier: DegradationTier) {
        *self
            .recovery_tier_counts
            .entry(tier.as_str().to_string())
            .or_insert(0) += 1;
    }

    pub fn record_substitutions(&mut self, fields: &[String]) {
        for field in fields {
            *self.substitution_counts.entry(field.clone()).or_insert(0) += 1;
        }
    }

    pub fn processed(&self) -> usize {
        self.succeeded + self.partial_succeeded + self.failed + self.skipped
    }

    pub fn finalize(self) -> ProcessingStatistics {
        let processed = self.processed();
        let run_duration = self.started_instant.elapsed();

        let rate = |part: usize| {
            if processed == 0 {
                0.0
            } else {
                part as f64 / processed as f64
            }
        };
        let success_rate = rate(self.succeeded + self.partial_succeeded);
        let failure_rate = rate(self.failed + self.skipped);

        let throughput_per_sec = if run_duration.as_secs_f64() > 0.0 {
            processed as f64 / run_duration.as_secs_f64()
        } else {
            0.0
        };
        let avg_latency_ms = if self.timed_items == 0 {
            0
        } else {
            (self.total_latency.as_millis() / self.timed_items as u128) as u64
        };

        ProcessingStatistics {
            planned: self.planned,
            total: processed,
            succeeded: self.succeeded,
            partial_succeeded: self.partial_succeeded,
            failed: self.failed,
            skipped: self.skipped,
            retries: self.retries,
            error_type_counts: self.error_type_counts,
            recovery_tier_counts: self.recovery_tier_counts,
            substitution_counts: self.substitution_counts,
            success_rate,
            failure_rate,
            throughput_per_sec,
            avg_latency_ms,
            duration_ms: run_duration.as_millis() as u64,
            started_at: self.started_at,
            finished_at: Utc::now(),
        }
    }

    fn count_error(&mut self, error_type: ErrorType) {
        *self
            .error_type_counts
            .entry(error_type.as_str().to_string())
            .or_insert(0) += 1;
    }

    fn add_timing(&mut self, elapsed: Duration) {
        self.total_latency += elapsed;
        self.timed_items += 1;
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessingStatistics {
    pub planned: usize,
    pub total: usize,
    pub succeeded: usize,
    pub partial_succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub retries: usize,
    pub error_type_counts: BTreeMap<String, usize>,
    pub recovery_tier_counts: BTreeMap<String, usize>,
    pub substitution_counts: BTreeMap<String, usize>,
    pub success_rate: f64,
    pub failure_rate: f64,
    pub throughput_per_sec: f64,
    pub avg_latency_ms: u64,
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProcessingStatistics {
    pub fn report(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Processed:      {} of {}\n", self.total, self.planned));
        out.push_str(&format!("  Succeeded:    {}\n", self.succeeded));
        out.push_str(&format!("  Partial:      {}\n", self.partial_succeeded));
        out.push_str(&format!("  Failed:       {}\n", self.failed));
        out.push_str(&format!("  Skipped:      {}\n", self.skipped));
        out.push_str(&format!("Retries:        {}\n", self.retries));
        out.push_str(&format!("Success rate:   {:.1}%\n", self.success_rate * 100.0));
        out.push_str(&format!("Failure rate:   {:.1}%\n", self.failure_rate * 100.0));
        out.push_str(&format!("Avg latency:    {} ms\n", self.avg_latency_ms));
        out.push_str(&format!(
            "Throughput:     {:.2} entities/s\n",
            self.throughput_per_sec
        ));

        if !self.error_type_counts.is_empty() {
            out.push_str("Errors by type:\n");
            for (error_type, count) in &self.error_type_counts {
                out.push_str(&format!("  {}: {}\n", error_type, count));
            }
        }
        if !self.recovery_tier_counts.is_empty() {
            out.push_str("Recovery tiers:\n");
            for (tier, count) in &self.recovery_tier_counts {
                out.push_str(&format!("  {}: {}\n", tier, count));
            }
        }
        if !self.substitution_counts.is_empty() {
            out.push_str("Substituted fields:\n");
            for (field, count) in &self.substitution_counts {
                out.push_str(&format!("  {}: {}\n", field, count));
            }
        }
        out
    }

    /// Rule-based hints derived from the final numbers.
    pub fn recommendations(&self) -> Vec<String> {
        let mut hints = Vec::new();
        if self.total == 0 {
            return hints;
        }

        let share = |error_type: ErrorType| {
            let count = self
                .error_type_counts
                .get(error_type.as_str())
                .copied()
                .unwrap_or(0);
            count as f64 / self.total as f64
        };

        let network_share = share(ErrorType::Network);
        if network_share > 0.3 {
            hints.push(format!(
                "Network errors hit {:.0}% of entities. Check connectivity or increase retry delays.",
                network_share * 100.0
            ));
        }

        let structure_share = share(ErrorType::DataStructure);
        if structure_share > 0.3 {
            hints.push(format!(
                "Payload structure errors hit {:.0}% of entities. The upstream schema may have changed.",
                structure_share * 100.0
            ));
        }

        if self.retries >= self.total {
            hints.push(format!(
                "{} retries across {} entities. Consider a longer base delay between attempts.",
                self.retries, self.total
            ));
        }

        if self.failure_rate > 0.25 {
            hints.push(
                "More than a quarter of entities produced no record. Re-run with -v for per-entity detail."
                    .to_string(),
            );
        }

        if let Some((field, count)) = self
            .substitution_counts
            .iter()
            .max_by_key(|(_, count)| **count)
        {
            if *count >= 3 {
                hints.push(format!(
                    "Field '{}' was defaulted {} times. The source may have stopped publishing it.",
                    field, count
                ));
            }
        }

        hints
    }
}
