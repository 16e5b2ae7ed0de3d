use std::collections::HashSet;
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ClassifierError, Result};

/// Classifier policy: scanner thresholds and the legacy client table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default)]
    pub scanner: ScannerThresholds,

    #[serde(default = "default_legacy_signatures")]
    pub legacy_signatures: Vec<LegacySignature>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            scanner: ScannerThresholds::default(),
            legacy_signatures: default_legacy_signatures(),
        }
    }
}

/// A source is a scanner once it strictly exceeds either limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerThresholds {
    #[serde(default = "default_max_distinct_ports")]
    pub max_distinct_ports: u64,

    #[serde(default = "default_max_flows")]
    pub max_flows: u64,
}

impl Default for ScannerThresholds {
    fn default() -> Self {
        Self {
            max_distinct_ports: default_max_distinct_ports(),
            max_flows: default_max_flows(),
        }
    }
}

impl ScannerThresholds {
    pub fn exceeded_by(&self, distinct_ports: u64, flows: u64) -> bool {
        distinct_ports > self.max_distinct_ports || flows > self.max_flows
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySignature {
    pub id: String,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl LegacySignature {
    pub fn new(id: impl Into<String>, pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            pattern: pattern.into(),
            description: Some(description.into()),
        }
    }
}

fn default_max_distinct_ports() -> u64 { 30 }
fn default_max_flows() -> u64 { 400 }

pub fn default_legacy_signatures() -> Vec<LegacySignature> {
    vec![
        LegacySignature::new("msie_6_7", r"MSIE [67]\.", "Internet Explorer 6/7"),
        LegacySignature::new("windows_nt_5", r"Windows NT 5\.", "Windows 2000/XP/Server 2003"),
        LegacySignature::new("windows_9x", r"Windows 9[58]|Win9[58]", "Windows 95/98"),
        LegacySignature::new("java_1_6_or_older", r"Java/1\.[0-6]\.", "Java runtime 1.6 and older"),
        LegacySignature::new("openssl_0_9", r"OpenSSL/0\.9\.", "OpenSSL 0.9.x"),
        LegacySignature::new("python_urllib_2", r"Python-urllib/2\.", "Python 2 urllib"),
        LegacySignature::new("firefox_3_or_older", r"Firefox/[1-3]\.", "Firefox 3 and older"),
        LegacySignature::new("android_2", r"Android 2\.", "Android 2.x"),
        LegacySignature::new("flash_plugin", r"Shockwave ?Flash", "Adobe Flash plugin"),
    ]
}

impl ClassifierConfig {
    /// Parse and validate a TOML policy document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ClassifierConfig = toml::from_str(content)
            .map_err(|e| ClassifierError::InvalidConfiguration(e.message().to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("invalid config {}", path.display()))?;
        tracing::debug!(
            path = %path.display(),
            signatures = config.legacy_signatures.len(),
            "loaded classifier config"
        );
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for sig in &self.legacy_signatures {
            if sig.id.trim().is_empty() {
                return Err(ClassifierError::InvalidConfiguration(
                    "legacy signature with empty id".to_string(),
                ));
            }
            if !seen.insert(sig.id.as_str()) {
                return Err(ClassifierError::InvalidConfiguration(format!(
                    "duplicate legacy signature id '{}'",
                    sig.id
                )));
            }
            if sig.pattern.is_empty() {
                return Err(ClassifierError::InvalidConfiguration(format!(
                    "legacy signature '{}' has an empty pattern",
                    sig.id
                )));
            }
            Regex::new(&sig.pattern).map_err(|e| {
                ClassifierError::InvalidConfiguration(format!("legacy signature '{}': {}", sig.id, e))
            })?;
        }
        Ok(())
    }
}
