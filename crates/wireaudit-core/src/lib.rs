pub mod models;
pub mod error;
pub mod config;
pub mod record;
pub mod address;
pub mod rules;
pub mod scanner;
pub mod legacy;
pub mod classify;
pub mod ingest;

pub use classify::{classify, BatchAccumulator, Classifier};
pub use config::ClassifierConfig;
pub use error::ClassifierError;
pub use models::{ClassificationResult, EventRecord, LegacyClientFinding, Rule, RuleCounters, ScannerCandidate};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
