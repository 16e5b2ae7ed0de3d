use serde::{Deserialize, Serialize};

pub use crate::record::EventRecord;
pub use crate::rules::{Rule, RuleCounters};

// ---------------------------------------------------------------------------
// Derived findings
// ---------------------------------------------------------------------------

/// A source address that touched too many ports or produced too many flows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerCandidate {
    pub address: String,
    pub distinct_ports: u64,
    pub flow_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyClientFinding {
    pub pattern: String,
    pub count: u64,
}

// ---------------------------------------------------------------------------
// ClassificationResult: the one object handed to the presentation layer
// ---------------------------------------------------------------------------

/// Built once per batch, then only read. `scanners` and `legacy_clients`
/// arrive ranked; `metrics` always carries all nine rules, zeros included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    pub metrics: RuleCounters,
    pub scanners: Vec<ScannerCandidate>,
    pub legacy_clients: Vec<LegacyClientFinding>,
}

impl ClassificationResult {
    pub fn is_clean(&self) -> bool {
        self.metrics.is_clear() && self.scanners.is_empty() && self.legacy_clients.is_empty()
    }
}
