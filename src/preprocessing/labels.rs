use std::collections::BTreeSet;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::config::{LabelConfig, MergeRule};
use crate::data::model::{LabeledTable, SampleRecord, SampleTable};
use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// LabelVocabulary – class name ↔ code
// ---------------------------------------------------------------------------

/// Bijection between class names and codes `0..num_classes`.
///
/// Codes follow the sorted order of the class names, so fitting on the same
/// set of labels always yields the same codes. Serialises as the ordered
/// class list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelVocabulary {
    classes: Vec<String>,
}

impl LabelVocabulary {
    /// Build a vocabulary from any collection of labels; duplicates collapse.
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let classes: BTreeSet<String> = labels.into_iter().map(Into::into).collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// Class names in code order.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Label → code.
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| PipelineError::UnknownLabel(label.to_string()))
    }

    /// Code → label.
    pub fn decode(&self, code: usize) -> Result<&str> {
        self.classes
            .get(code)
            .map(String::as_str)
            .ok_or(PipelineError::UnknownLabelCode {
                code,
                num_classes: self.classes.len(),
            })
    }
}

impl TryFrom<Vec<String>> for LabelVocabulary {
    type Error = PipelineError;

    fn try_from(classes: Vec<String>) -> Result<Self> {
        if let Some(pair) = classes.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidConfig(format!(
                "vocabulary classes must be sorted and unique ('{}' before '{}')",
                pair[0], pair[1]
            )));
        }
        Ok(Self { classes })
    }
}

impl From<LabelVocabulary> for Vec<String> {
    fn from(vocabulary: LabelVocabulary) -> Self {
        vocabulary.classes
    }
}

// ---------------------------------------------------------------------------
// LabelNormalizer – label text cleanup, class exclusion and merging
// ---------------------------------------------------------------------------

/// Applies the configured class exclusions and merges to a labelled table.
#[derive(Debug, Clone, Default)]
pub struct LabelNormalizer {
    exclude: BTreeSet<String>,
    merge: Vec<MergeRule>,
}

impl LabelNormalizer {
    /// Configured labels are normalised the same way as table labels.
    pub fn from_config(config: &LabelConfig) -> Self {
        Self {
            exclude: config.exclude.iter().map(|l| Self::normalize(l)).collect(),
            merge: config
                .merge
                .iter()
                .map(|rule| MergeRule {
                    sources: rule.sources.iter().map(|l| Self::normalize(l)).collect(),
                    target: Self::normalize(&rule.target),
                })
                .collect(),
        }
    }

    /// Keep the text before the first `(`, trimmed.
    ///
    /// `"Oak (mature stand)"` → `"Oak"`.
    pub fn normalize(label_raw: &str) -> String {
        label_raw
            .split('(')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// Drop rows whose label equals `label`.
    pub fn exclude(table: LabeledTable, label: &str) -> LabeledTable {
        let before = table.len();
        let records: Vec<_> = table
            .records
            .into_iter()
            .filter(|r| r.label != label)
            .collect();
        debug!("excluded {} rows labelled '{label}'", before - records.len());
        LabeledTable {
            frequency_columns: table.frequency_columns,
            records,
        }
    }

    /// Relabel every row whose label is in `sources` as `target`.
    pub fn combine_classes(
        mut table: LabeledTable,
        sources: &BTreeSet<String>,
        target: &str,
    ) -> LabeledTable {
        let mut merged = 0usize;
        for record in table.records.iter_mut().filter(|r| sources.contains(&r.label)) {
            record.label = target.to_string();
            merged += 1;
        }
        debug!("merged {merged} rows into '{target}'");
        table
    }

    /// Apply every configured exclusion, then every merge rule in order.
    pub fn apply(&self, table: LabeledTable) -> LabeledTable {
        let before = table.len();
        let table = self
            .exclude
            .iter()
            .fold(table, |t, label| Self::exclude(t, label));
        let table = self
            .merge
            .iter()
            .fold(table, |t, rule| Self::combine_classes(t, &rule.sources, &rule.target));
        info!(
            "label filtering kept {} of {before} rows, {} classes",
            table.len(),
            table.distinct_labels().len()
        );
        table
    }

    /// Fit a vocabulary on the labels present and encode every row.
    pub fn fit_encode(table: LabeledTable) -> Result<(SampleTable, LabelVocabulary)> {
        let vocabulary = LabelVocabulary::fit(table.distinct_labels());
        let records = table
            .records
            .into_iter()
            .map(|r| {
                Ok(SampleRecord {
                    label_encoded: vocabulary.encode(&r.label)?,
                    file: r.file,
                    group_id: r.group_id,
                    label: r.label,
                    frequencies: r.frequencies,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let table = SampleTable::new(table.frequency_columns, records)?;
        Ok((table, vocabulary))
    }
}
