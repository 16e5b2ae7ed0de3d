use std::collections::{HashMap, HashSet};

use crate::config::ScannerThresholds;
use crate::models::ScannerCandidate;
use crate::record::ResolvedEvent;

/// Per-source accumulation. Scanner status needs the complete batch, so
/// nothing is decided until `finalize`.
#[derive(Debug, Default, Clone)]
pub struct ScanTracker {
    sources: HashMap<String, SourceState>,
}

#[derive(Debug, Default, Clone)]
struct SourceState {
    ports: HashSet<u16>,
    flows: u64,
}

impl ScanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, ev: &ResolvedEvent<'_>) {
        let Some(src) = ev.source_address else { return };
        let state = self.sources.entry(src.to_string()).or_default();
        state.flows += 1;
        if let Some(port) = ev.destination_port {
            state.ports.insert(port);
        }
    }

    /// Fold another shard in: port sets union, flow counts add.
    pub fn merge(&mut self, other: ScanTracker) {
        for (addr, theirs) in other.sources {
            let ours = self.sources.entry(addr).or_default();
            ours.flows += theirs.flows;
            ours.ports.extend(theirs.ports);
        }
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Sources above either threshold, most distinct ports first, then most
    /// flows, then address so equal entries always come out the same way.
    pub fn finalize(self, thresholds: &ScannerThresholds) -> Vec<ScannerCandidate> {
        let mut candidates: Vec<ScannerCandidate> = self
            .sources
            .into_iter()
            .map(|(address, state)| ScannerCandidate {
                address,
                distinct_ports: state.ports.len() as u64,
                flow_count: state.flows,
            })
            .filter(|c| thresholds.exceeded_by(c.distinct_ports, c.flow_count))
            .collect();

        candidates.sort_by(|a, b| {
            b.distinct_ports
                .cmp(&a.distinct_ports)
                .then(b.flow_count.cmp(&a.flow_count))
                .then_with(|| a.address.cmp(&b.address))
        });
        candidates
    }
}
