use regex::Regex;

use crate::config::LegacySignature;
use crate::error::{ClassifierError, Result};
use crate::models::LegacyClientFinding;

/// Compiled user-agent signature table. Order is the table order.
#[derive(Debug, Clone)]
pub struct LegacySignatureSet {
    signatures: Vec<(String, Regex)>,
}

impl LegacySignatureSet {
    pub fn compile(table: &[LegacySignature]) -> Result<Self> {
        let signatures = table
            .iter()
            .map(|sig| {
                Regex::new(&sig.pattern)
                    .map(|re| (sig.id.clone(), re))
                    .map_err(|e| {
                        ClassifierError::InvalidConfiguration(format!("legacy signature '{}': {}", sig.id, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { signatures })
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.signatures.iter().map(|(id, _)| id.as_str())
    }

    /// Indices of every signature the user agent matches.
    pub fn matching<'a>(&'a self, user_agent: &'a str) -> impl Iterator<Item = usize> + 'a {
        self.signatures
            .iter()
            .enumerate()
            .filter(move |(_, (_, re))| !user_agent.is_empty() && re.is_match(user_agent))
            .map(|(idx, _)| idx)
    }
}

/// Per-signature hit counts, indexed like the signature set.
#[derive(Debug, Clone)]
pub struct LegacyTracker {
    counts: Vec<u64>,
}

impl LegacyTracker {
    pub fn new(set: &LegacySignatureSet) -> Self {
        Self { counts: vec![0; set.len()] }
    }

    pub fn observe(&mut self, set: &LegacySignatureSet, user_agent: &str) {
        // indices past the table this tracker was sized for are ignored
        for idx in set.matching(user_agent) {
            if let Some(count) = self.counts.get_mut(idx) {
                *count += 1;
            }
        }
    }

    pub fn merge(&mut self, other: &LegacyTracker) {
        for (ours, theirs) in self.counts.iter_mut().zip(&other.counts) {
            *ours += theirs;
        }
    }

    /// Non-zero signatures, highest count first; equal counts keep table order.
    pub fn finalize(self, set: &LegacySignatureSet) -> Vec<LegacyClientFinding> {
        let mut findings: Vec<LegacyClientFinding> = set
            .ids()
            .zip(self.counts)
            .filter(|(_, count)| *count > 0)
            .map(|(id, count)| LegacyClientFinding { pattern: id.to_string(), count })
            .collect();
        findings.sort_by(|a, b| b.count.cmp(&a.count));
        findings
    }
}
