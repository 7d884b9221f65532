//! Sequential batch ingestion.
//!
//! One logical task walks the roster strictly in order. Batches exist for
//! grouping and progress only; there is no fan-out, because the content API
//! rate-limits aggressively. Per entity: retried fetch, strict transform,
//! validation, and on failure the degradation chain. A single entity can
//! never sink the run; a systemic failure rate can.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::time::sleep;
use tracing::debug;

use crate::classifier::{ErrorClassifier, RecoveryStrategy};
use crate::config::AppConfig;
use crate::degrade::{DegradationCoordinator, DegradationTier, RecoverableField};
use crate::fetch::{ContentFetcher, IngestError};
use crate::logger::IngestLogger;
use crate::partial::PartialRecordBuilder;
use crate::profile::profile_for;
use crate::record::{EntityId, FailedEntity, Record};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::roster::RosterEntry;
use crate::stats::{ProcessingStatistics, StatisticsCollector};
use crate::validate::validate_record;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub batch_size: usize,
    pub inter_item_delay: Duration,
    pub retry_policy: RetryPolicy,
    /// Cumulative failure rate above which the run aborts. Strictly
    /// exceeded, so 1.0 never aborts.
    pub abort_failure_rate: f64,
    /// Forward invalid records (flagged) instead of failing them.
    pub include_degraded: bool,
    pub languages: Vec<String>,
}

impl PipelineOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        PipelineOptions {
            batch_size: config.pipeline.batch_size.max(1),
            inter_item_delay: Duration::from_millis(config.pipeline.inter_item_delay_ms),
            retry_policy: RetryPolicy::from_retries(
                config.pipeline.max_retries,
                Duration::from_millis(config.pipeline.retry_base_delay_ms),
                Duration::from_millis(config.pipeline.retry_max_delay_ms),
            ),
            abort_failure_rate: config.pipeline.abort_failure_rate,
            include_degraded: config.pipeline.include_degraded,
            languages: config.languages.priority.clone(),
        }
    }
}

/// Where one entity ended up, labelled for progress and statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemStage {
    Succeeded,
    Partial,
    Skipped,
    Failed,
}

impl ItemStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStage::Succeeded => "succeeded",
            ItemStage::Partial => "partial",
            ItemStage::Skipped => "skipped",
            ItemStage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ItemStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Emitted after every processed entity.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub current: usize,
    pub total: usize,
    pub percent: f64,
    pub current_entity_id: EntityId,
    pub stage: ItemStage,
    pub elapsed: Duration,
    pub estimated_remaining: Duration,
}

pub type ProgressObserver = Box<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Fatal run failure: the cumulative failure rate broke the threshold.
#[derive(Debug, Error)]
pub struct BatchAbortError {
    pub observed_rate: f64,
    pub threshold: f64,
    pub processed: usize,
    pub failing_ids: Vec<EntityId>,
    pub statistics: ProcessingStatistics,
}

impl std::fmt::Display for BatchAbortError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids = self
            .failing_ids
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(
            f,
            "failure rate {:.1}% exceeded the {:.1}% abort threshold after {} entities; failing: [{}]",
            self.observed_rate * 100.0,
            self.threshold * 100.0,
            self.processed,
            ids
        )
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub successful: Vec<Record>,
    pub failed: Vec<FailedEntity>,
    pub statistics: ProcessingStatistics,
    pub interrupted: bool,
}

enum ItemDisposition {
    Succeeded(Record),
    Partial(Record),
    Skipped(FailedEntity),
    Failed(FailedEntity),
}

impl ItemDisposition {
    fn stage(&self) -> ItemStage {
        match self {
            ItemDisposition::Succeeded(_) => ItemStage::Succeeded,
            ItemDisposition::Partial(_) => ItemStage::Partial,
            ItemDisposition::Skipped(_) => ItemStage::Skipped,
            ItemDisposition::Failed(_) => ItemStage::Failed,
        }
    }
}

pub struct BatchPipeline<F: ContentFetcher> {
    fetcher: F,
    options: PipelineOptions,
    logger: IngestLogger,
    retry: RetryExecutor,
    classifier: ErrorClassifier,
    coordinator: DegradationCoordinator,
    interrupt: Arc<AtomicBool>,
    observer: Option<ProgressObserver>,
}

impl<F: ContentFetcher> BatchPipeline<F> {
    pub fn new(fetcher: F, options: PipelineOptions, logger: IngestLogger) -> Self {
        let retry = RetryExecutor::new(options.retry_policy.clone());
        let coordinator = DegradationCoordinator::new(&options.languages);
        BatchPipeline {
            fetcher,
            options,
            logger,
            retry,
            classifier: ErrorClassifier::new(),
            coordinator,
            interrupt: Arc::new(AtomicBool::new(false)),
            observer: None,
        }
    }

    /// Shares an interrupt flag with the caller (usually a Ctrl-C handler).
    /// The pipeline checks it between entities, never mid-fetch.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    pub fn with_observer(mut self, observer: ProgressObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub async fn run(&self, entities: &[RosterEntry]) -> Result<PipelineOutcome, BatchAbortError> {
        let total = entities.len();
        let mut stats = StatisticsCollector::new(total);
        let mut successful: Vec<Record> = Vec::new();
        let mut failed: Vec<FailedEntity> = Vec::new();
        let mut interrupted = false;
        let run_started = Instant::now();
        let locale = self
            .options
            .languages
            .first()
            .cloned()
            .unwrap_or_else(|| "en".to_string());

        self.logger.start_progress(total as u64).await;
        self.logger.info(&format!(
            "Starting ingestion of {} entities (batch size {}, locale {})",
            total, self.options.batch_size, locale
        ));

        for (index, entry) in entities.iter().enumerate() {
            if self.interrupt.load(Ordering::Relaxed) {
                self.logger.warn("Interrupt received, stopping before the next entity.");
                interrupted = true;
                break;
            }

            if index % self.options.batch_size == 0 {
                debug!(
                    batch = index / self.options.batch_size + 1,
                    "starting next batch"
                );
            }

            let item_started = Instant::now();
            let disposition = self.process_one(entry, &locale, &mut stats).await;
            let elapsed = item_started.elapsed();

            let stage = disposition.stage();
            match disposition {
                ItemDisposition::Succeeded(record) => {
                    stats.record_success(elapsed);
                    successful.push(record);
                }
                ItemDisposition::Partial(record) => {
                    stats.record_partial_success(elapsed);
                    successful.push(record);
                }
                ItemDisposition::Skipped(entity) => {
                    stats.record_skip(entity.error_type);
                    failed.push(entity);
                }
                ItemDisposition::Failed(entity) => {
                    stats.record_failure(entity.error_type, elapsed);
                    failed.push(entity);
                }
            }

            let processed = index + 1;
            self.emit_progress(processed, total, entry, stage, run_started.elapsed())
                .await;

            // The brake waits for a full batch of evidence so a bad first
            // entity cannot sink an otherwise healthy run.
            if processed >= self.options.batch_size {
                let failure_rate = failed.len() as f64 / processed as f64;
                if failure_rate > self.options.abort_failure_rate {
                    let failing_ids: Vec<EntityId> =
                        failed.iter().map(|f| f.id.clone()).collect();
                    self.logger.finish_progress("Ingestion aborted").await;
                    let abort = BatchAbortError {
                        observed_rate: failure_rate,
                        threshold: self.options.abort_failure_rate,
                        processed,
                        failing_ids,
                        statistics: stats.finalize(),
                    };
                    self.logger.error(&abort.to_string());
                    return Err(abort);
                }
            }

            if processed < total && !self.options.inter_item_delay.is_zero() {
                sleep(self.options.inter_item_delay).await;
            }
        }

        let message = if interrupted {
            "Ingestion interrupted"
        } else {
            "Ingestion complete"
        };
        self.logger.finish_progress(message).await;

        Ok(PipelineOutcome {
            successful,
            failed,
            statistics: stats.finalize(),
            interrupted,
        })
    }

    async fn process_one(
        &self,
        entry: &RosterEntry,
        locale: &str,
        stats: &mut StatisticsCollector,
    ) -> ItemDisposition {
        let outcome = self
            .retry
            .execute(|| self.fetcher.fetch(&entry.id, entry.kind, locale))
            .await;
        stats.record_retries(outcome.retries() as usize);

        match outcome.value {
            Some(payload) => self.transform(entry, payload, stats),
            None => {
                let error = outcome.last_error.unwrap_or_else(|| {
                    IngestError::Unknown("retry executor returned neither value nor error".to_string())
                });
                self.recover_or_fail(entry, error, stats)
            }
        }
    }

    /// Strict path: the payload is in hand. Builds through the profile,
    /// upgrades any defaulted enum field through the fallback chain, then
    /// validates.
    fn transform(
        &self,
        entry: &RosterEntry,
        payload: crate::payload::RawPayload,
        stats: &mut StatisticsCollector,
    ) -> ItemDisposition {
        let builder = PartialRecordBuilder::for_kind(entry.kind);
        let report = builder.detect_missing(Some(&payload));

        if !report.is_buildable() {
            // Critical fields gone: the coordinator gets a chance at an
            // alternate identity before the entity is declared lost.
            self.logger.warn(&format!(
                "{}: payload missing critical fields ({})",
                entry.id,
                report.missing_fields.join(", ")
            ));
            return self.degraded_record_chain(
                entry,
                IngestError::DataStructure(format!(
                    "critical fields missing: {}",
                    report.missing_fields.join(", ")
                )),
                Some(&payload),
                stats,
            );
        }

        let mut record =
            match builder.build(&entry.id, Some(&payload), &report, &self.options.languages) {
                Some(record) => record,
                None => {
                    return self.degraded_record_chain(
                        entry,
                        IngestError::DataStructure("payload refused by builder".to_string()),
                        Some(&payload),
                        stats,
                    )
                }
            };

        self.upgrade_substituted_enums(entry, &payload, &mut record, stats);
        stats.record_substitutions(&record.substituted_fields);

        let valid = validate_record(&mut record);
        if valid {
            if record.degraded {
                ItemDisposition::Partial(record)
            } else {
                ItemDisposition::Succeeded(record)
            }
        } else if self.options.include_degraded {
            self.logger.warn(&format!(
                "{}: forwarding invalid record under degraded mode ({})",
                entry.id,
                record.validation.issues.join("; ")
            ));
            record.degraded = true;
            ItemDisposition::Partial(record)
        } else {
            let error = IngestError::Validation(record.validation.issues.join("; "));
            ItemDisposition::Failed(FailedEntity {
                id: entry.id.clone(),
                kind: entry.kind,
                error: error.to_string(),
                error_type: self.classifier.classify_error(&error).error_type,
                partial_data: payload.section(&[]),
            })
        }
    }

    /// A field the builder defaulted may still be resolvable from a deeper
    /// source. Sentinel-tier results are skipped: the default already is
    /// the sentinel. An upgraded field no longer holds its default and
    /// leaves the substitution list; the recovery tier carries the audit
    /// trail instead.
    fn upgrade_substituted_enums(
        &self,
        entry: &RosterEntry,
        payload: &crate::payload::RawPayload,
        record: &mut Record,
        stats: &mut StatisticsCollector,
    ) {
        const TARGETS: &[(&str, RecoverableField)] = &[
            ("basic.element", RecoverableField::Element),
            ("basic.specialty", RecoverableField::Specialty),
            ("basic.rarity", RecoverableField::Rarity),
        ];

        let profile = profile_for(entry.kind);
        for (key, field) in TARGETS {
            if !record.substituted_fields.iter().any(|f| f == key) {
                continue;
            }
            let spec = match profile.field(key) {
                Some(spec) => spec,
                None => continue,
            };
            let recovered = self.coordinator.recover_value(&entry.id, *field, Some(payload));
            if recovered.tier != DegradationTier::DefaultSentinel {
                (spec.assign)(record, recovered.value);
                record.substituted_fields.retain(|f| f != key);
                record.note_recovery_tier(recovered.tier);
                stats.record_recovery_tier(recovered.tier);
                record.degraded = true;
            }
        }
    }

    /// Failure path: the fetch gave up or the payload was beyond strict
    /// building. The classified strategy decides whether the degradation
    /// chain is even worth running.
    fn recover_or_fail(
        &self,
        entry: &RosterEntry,
        error: IngestError,
        stats: &mut StatisticsCollector,
    ) -> ItemDisposition {
        let classification = self.classifier.classify_error(&error);

        match classification.strategy {
            RecoveryStrategy::Skip => {
                self.logger
                    .warn(&format!("{}: {} (skipped)", entry.id, error));
                ItemDisposition::Skipped(FailedEntity {
                    id: entry.id.clone(),
                    kind: entry.kind,
                    error: error.to_string(),
                    error_type: classification.error_type,
                    partial_data: None,
                })
            }
            RecoveryStrategy::Abort => {
                // Critical failures are never recovered; the failure-rate
                // brake decides whether the run survives.
                self.logger.error(&format!("{}: {}", entry.id, error));
                ItemDisposition::Failed(FailedEntity {
                    id: entry.id.clone(),
                    kind: entry.kind,
                    error: error.to_string(),
                    error_type: classification.error_type,
                    partial_data: None,
                })
            }
            _ => self.degraded_record_chain(entry, error, None, stats),
        }
    }

    /// Degradation chain in fixed order: coordinator first, partial builder
    /// second, failure tuple last.
    fn degraded_record_chain(
        &self,
        entry: &RosterEntry,
        error: IngestError,
        payload: Option<&crate::payload::RawPayload>,
        stats: &mut StatisticsCollector,
    ) -> ItemDisposition {
        if let Some(mut record) = self
            .coordinator
            .recover_record(&entry.id, entry.kind, payload)
        {
            if let Some(tier) = record.recovery_tier {
                stats.record_recovery_tier(tier);
            }
            stats.record_substitutions(&record.substituted_fields);
            let valid = validate_record(&mut record);
            if valid || self.options.include_degraded {
                self.logger.info(&format!(
                    "{}: recovered a degraded record after: {}",
                    entry.id, error
                ));
                return ItemDisposition::Partial(record);
            }
        }

        let builder = PartialRecordBuilder::for_kind(entry.kind);
        let report = builder.detect_missing(payload);
        if let Some(mut record) = builder.build(&entry.id, payload, &report, &self.options.languages)
        {
            stats.record_substitutions(&record.substituted_fields);
            let valid = validate_record(&mut record);
            if valid || self.options.include_degraded {
                self.logger.info(&format!(
                    "{}: built a partial record after: {}",
                    entry.id, error
                ));
                return ItemDisposition::Partial(record);
            }
        }

        let classification = self.classifier.classify_error(&error);
        ItemDisposition::Failed(FailedEntity {
            id: entry.id.clone(),
            kind: entry.kind,
            error: error.to_string(),
            error_type: classification.error_type,
            partial_data: payload.and_then(|p| p.section(&[])),
        })
    }

    async fn emit_progress(
        &self,
        current: usize,
        total: usize,
        entry: &RosterEntry,
        stage: ItemStage,
        elapsed: Duration,
    ) {
        let event = ProgressEvent {
            current,
            total,
            percent: if total == 0 {
                100.0
            } else {
                current as f64 / total as f64 * 100.0
            },
            current_entity_id: entry.id.clone(),
            stage,
            elapsed,
            estimated_remaining: estimate_remaining(elapsed, current, total),
        };

        self.logger.progress_event(&event).await;
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}

fn estimate_remaining(elapsed: Duration, current: usize, total: usize) -> Duration {
    if current == 0 || total <= current {
        return Duration::ZERO;
    }
    let per_item = elapsed.as_secs_f64() / current as f64;
    Duration::from_secs_f64(per_item * (total - current) as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{IngestLogger, VerbosityLevel};
    use crate::payload::RawPayload;
    use crate::record::EntityKind;
    use serde_json::json;

    struct AlwaysOk;

    impl ContentFetcher for AlwaysOk {
        async fn fetch(
            &self,
            _id: &EntityId,
            _kind: EntityKind,
            _locale: &str,
        ) -> Result<RawPayload, IngestError> {
            Ok(RawPayload::from_value(json!({
                "basic": {
                    "id": "ember-wolf",
                    "name": "Ember Wolf",
                    "rarity": "S",
                    "element": "Fire",
                    "specialty": "Attack"
                },
                "modules": {
                    "ascension": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
                    "potential": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]
                }
            })))
        }
    }

    struct AlwaysNetworkError;

    impl ContentFetcher for AlwaysNetworkError {
        async fn fetch(
            &self,
            _id: &EntityId,
            _kind: EntityKind,
            _locale: &str,
        ) -> Result<RawPayload, IngestError> {
            Err(IngestError::Network("connection refused".to_string()))
        }
    }

    fn options() -> PipelineOptions {
        PipelineOptions {
            batch_size: 2,
            inter_item_delay: Duration::ZERO,
            retry_policy: RetryPolicy::new(
                1,
                Duration::from_millis(1),
                Duration::from_millis(1),
            ),
            abort_failure_rate: 1.0,
            include_degraded: true,
            languages: vec!["en".to_string()],
        }
    }

    fn roster(n: usize) -> Vec<RosterEntry> {
        (0..n)
            .map(|i| RosterEntry::new(format!("entity-{}", i), EntityKind::Character))
            .collect()
    }

    fn quiet_logger() -> IngestLogger {
        IngestLogger::new(VerbosityLevel::Silent)
    }

    #[tokio::test]
    async fn test_clean_roster_all_succeed() {
        let pipeline = BatchPipeline::new(AlwaysOk, options(), quiet_logger());
        let outcome = pipeline.run(&roster(3)).await.unwrap();

        assert_eq!(outcome.successful.len(), 3);
        assert!(outcome.failed.is_empty());
        assert_eq!(outcome.statistics.succeeded, 3);
        assert!(!outcome.interrupted);
    }

    #[tokio::test]
    async fn test_tolerated_failures_stay_below_threshold() {
        // unknown-* ids miss the heuristic table, so every entity lands in
        // the failed collection; threshold 1.0 is never strictly exceeded
        let pipeline = BatchPipeline::new(AlwaysNetworkError, options(), quiet_logger());
        let outcome = pipeline.run(&roster(4)).await.unwrap();

        assert!(outcome.successful.is_empty());
        assert_eq!(outcome.failed.len(), 4);
        assert_eq!(outcome.statistics.failed, 4);
    }

    #[tokio::test]
    async fn test_threshold_breach_aborts_with_ids() {
        let mut opts = options();
        opts.abort_failure_rate = 0.0;
        opts.batch_size = 1;
        let pipeline = BatchPipeline::new(AlwaysNetworkError, opts, quiet_logger());

        let err = pipeline.run(&roster(3)).await.unwrap_err();
        assert_eq!(err.failing_ids.len(), 1);
        assert!(err.observed_rate > err.threshold);
        assert!(err.to_string().contains("entity-0"));
    }

    #[tokio::test]
    async fn test_interrupt_flag_stops_the_run() {
        let flag = Arc::new(AtomicBool::new(true));
        let pipeline =
            BatchPipeline::new(AlwaysOk, options(), quiet_logger()).with_interrupt(flag);

        let outcome = pipeline.run(&roster(5)).await.unwrap();
        assert!(outcome.interrupted);
        assert!(outcome.successful.is_empty());
    }

    #[test]
    fn test_estimate_remaining_scales_linearly() {
        let remaining = estimate_remaining(Duration::from_secs(10), 5, 10);
        assert_eq!(remaining, Duration::from_secs(10));
        assert_eq!(estimate_remaining(Duration::from_secs(10), 10, 10), Duration::ZERO);
    }
}
