use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// PipelineConfig – everything the core needs from the caller
// ---------------------------------------------------------------------------

/// Full pipeline configuration.
///
/// Every section defaults, so a JSON file only needs to name the fields it
/// overrides:
///
/// ```json
/// {
///   "labels": { "merge": [{ "sources": ["Oak", "Beech"], "target": "Broadleaf" }] },
///   "split": { "test_fraction": 0.25 }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub data: DataConfig,
    pub labels: LabelConfig,
    pub split: SplitConfig,
}

impl PipelineConfig {
    /// Load a configuration from a JSON file and validate it.
    pub fn load_json(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: PipelineConfig =
            serde_json::from_str(&text).context("parsing config JSON")?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        self.labels.validate()?;
        self.split.validate()
    }
}

// ---------------------------------------------------------------------------
// Data section
// ---------------------------------------------------------------------------

/// What to do when a present spectral value equals the sentinel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Fail with a cleaning-invariant error.
    #[default]
    Reject,
    /// Treat the value as missing and drop the row.
    Drop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Column holding the file identifier (`<group>_<rest>`).
    pub file_column: String,
    /// Column holding the raw label text.
    pub label_column: String,
    /// Prefix shared by all spectral feature columns.
    pub frequency_prefix: String,
    /// Out-of-domain value standing in for "missing" during cleaning.
    pub sentinel: f64,
    pub collision_policy: CollisionPolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            file_column: "File".to_string(),
            label_column: "Label".to_string(),
            frequency_prefix: "frq".to_string(),
            sentinel: -9999.0,
            collision_policy: CollisionPolicy::Reject,
        }
    }
}

impl DataConfig {
    fn validate(&self) -> Result<()> {
        if self.frequency_prefix.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "frequency_prefix must not be empty".into(),
            ));
        }
        if self.file_column == self.label_column {
            return Err(PipelineError::InvalidConfig(format!(
                "file_column and label_column are both '{}'",
                self.file_column
            )));
        }
        if !self.sentinel.is_finite() {
            return Err(PipelineError::InvalidConfig(
                "sentinel must be a finite number".into(),
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Labels section
// ---------------------------------------------------------------------------

/// Rewrite every label in `sources` to `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRule {
    pub sources: BTreeSet<String>,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelConfig {
    /// Normalised labels whose rows are dropped before encoding.
    pub exclude: BTreeSet<String>,
    /// Class merges, applied in order after exclusion.
    pub merge: Vec<MergeRule>,
}

impl Default for LabelConfig {
    fn default() -> Self {
        Self {
            exclude: BTreeSet::from(["Mixed or Not Classified".to_string()]),
            merge: Vec::new(),
        }
    }
}

impl LabelConfig {
    fn validate(&self) -> Result<()> {
        for rule in &self.merge {
            if rule.target.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(
                    "merge target must not be empty".into(),
                ));
            }
            if rule.sources.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "merge into '{}' has no source labels",
                    rule.target
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Split section
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of image groups held out for testing, in (0, 1).
    pub test_fraction: f64,
    pub random_seed: u64,
    /// Put classes with a single image group wholly into train instead of
    /// failing.
    pub allow_singleton_classes: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            random_seed: 42,
            allow_singleton_classes: false,
        }
    }
}

impl SplitConfig {
    fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}
