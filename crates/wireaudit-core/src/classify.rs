use serde_json::Value;

use crate::config::ClassifierConfig;
use crate::error::{ClassifierError, Result};
use crate::legacy::{LegacySignatureSet, LegacyTracker};
use crate::models::{ClassificationResult, EventRecord, RuleCounters};
use crate::rules;
use crate::scanner::ScanTracker;

/// A validated policy plus its compiled signature table. Holds no per-batch
/// state, so one instance can serve concurrent batches.
#[derive(Debug, Clone)]
pub struct Classifier {
    config: ClassifierConfig,
    signatures: LegacySignatureSet,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        let signatures = LegacySignatureSet::compile(&config.legacy_signatures)?;
        Ok(Self { config, signatures })
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn classify(&self, records: &[EventRecord]) -> ClassificationResult {
        let mut batch = self.accumulator();
        for record in records {
            batch.observe(record);
        }
        batch.finalize()
    }

    /// Entry point for undecoded input: the batch must be a JSON array.
    /// Entries that are not objects are treated as empty records.
    pub fn classify_json(&self, batch: &Value) -> Result<ClassificationResult> {
        let items = match batch {
            Value::Array(items) => items,
            Value::Null => return Err(ClassifierError::InvalidInput("record sequence is null".to_string())),
            other => {
                return Err(ClassifierError::InvalidInput(format!(
                    "expected an array of records, got {}",
                    json_kind(other)
                )))
            }
        };
        let records: Vec<EventRecord> = items
            .iter()
            .map(|item| match item {
                Value::Object(fields) => EventRecord::from_fields(fields),
                _ => EventRecord::default(),
            })
            .collect();
        Ok(self.classify(&records))
    }

    /// Shards the batch across the rayon pool; partial accumulators are
    /// merged before thresholds and ranking are applied.
    #[cfg(feature = "parallel")]
    pub fn classify_parallel(&self, records: &[EventRecord], shard_size: usize) -> ClassificationResult {
        use rayon::prelude::*;

        records
            .par_chunks(shard_size.max(1))
            .map(|shard| {
                let mut batch = self.accumulator();
                for record in shard {
                    batch.observe(record);
                }
                batch
            })
            .reduce(|| self.accumulator(), |mut left, right| {
                left.merge(right);
                left
            })
            .finalize()
    }

    pub fn accumulator(&self) -> BatchAccumulator<'_> {
        BatchAccumulator {
            classifier: self,
            records: 0,
            metrics: RuleCounters::default(),
            scanners: ScanTracker::new(),
            legacy: LegacyTracker::new(&self.signatures),
        }
    }
}

/// Classify with the default policy.
pub fn classify(records: &[EventRecord]) -> Result<ClassificationResult> {
    Ok(Classifier::new(ClassifierConfig::default())?.classify(records))
}

/// Working state for one batch (or one shard of it). Rule counters are
/// final as soon as a record is observed; scanners and legacy clients are
/// only ranked in `finalize`.
#[derive(Debug)]
pub struct BatchAccumulator<'c> {
    classifier: &'c Classifier,
    records: u64,
    metrics: RuleCounters,
    scanners: ScanTracker,
    legacy: LegacyTracker,
}

impl BatchAccumulator<'_> {
    pub fn observe(&mut self, record: &EventRecord) {
        let ev = record.resolved();
        for rule in rules::evaluate(&ev) {
            self.metrics.increment(rule);
        }
        self.scanners.observe(&ev);
        self.legacy.observe(&self.classifier.signatures, ev.user_agent);
        self.records += 1;
    }

    pub fn merge(&mut self, other: BatchAccumulator<'_>) {
        self.records += other.records;
        self.metrics.merge(&other.metrics);
        self.scanners.merge(other.scanners);
        self.legacy.merge(&other.legacy);
    }

    pub fn records(&self) -> u64 {
        self.records
    }

    pub fn finalize(self) -> ClassificationResult {
        let sources = self.scanners.source_count();
        let scanners = self.scanners.finalize(&self.classifier.config.scanner);
        let legacy_clients = self.legacy.finalize(&self.classifier.signatures);

        tracing::info!(
            records = self.records,
            findings = self.metrics.total(),
            sources,
            scanners = scanners.len(),
            legacy_clients = legacy_clients.len(),
            "classification complete"
        );

        ClassificationResult {
            metrics: self.metrics,
            scanners,
            legacy_clients,
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
