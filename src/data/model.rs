use std::collections::{BTreeMap, BTreeSet};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// RawRecord – one row of the ingested table
// ---------------------------------------------------------------------------

/// One pixel sample as ingested. Missing spectral values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// File identifier, `<group>_<anything>`.
    pub file: String,
    /// Label text, possibly carrying a parenthetical qualifier.
    pub label: String,
    /// Spectral measurements, one per frequency column.
    pub frequencies: Vec<f64>,
}

/// The ingested table: frequency column names plus rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub frequency_columns: Vec<String>,
    pub records: Vec<RawRecord>,
}

impl RawTable {
    /// Build a table, checking every row has one value per frequency column.
    pub fn new(frequency_columns: Vec<String>, records: Vec<RawRecord>) -> Result<Self> {
        check_widths(
            frequency_columns.len(),
            records.iter().map(|r| r.frequencies.len()),
        )?;
        Ok(Self {
            frequency_columns,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

// ---------------------------------------------------------------------------
// LabeledRecord – grouped and label-normalised, not yet cleaned/encoded
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledRecord {
    pub file: String,
    pub group_id: i64,
    /// Normalised label text.
    pub label: String,
    pub frequencies: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    pub frequency_columns: Vec<String>,
    pub records: Vec<LabeledRecord>,
}

impl LabeledTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Distinct normalised labels, sorted.
    pub fn distinct_labels(&self) -> BTreeSet<String> {
        self.records.iter().map(|r| r.label.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// SampleRecord – the cleaned, encoded row
// ---------------------------------------------------------------------------

/// A cleaned pixel sample. No spectral value is missing or equal to the
/// sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub file: String,
    /// Image group the pixel belongs to.
    pub group_id: i64,
    pub label: String,
    /// Code of `label` in the run's vocabulary.
    pub label_encoded: usize,
    pub frequencies: Vec<f64>,
}

/// The cleaned table handed to the splitter.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleTable {
    pub frequency_columns: Vec<String>,
    pub records: Vec<SampleRecord>,
}

impl SampleTable {
    pub fn new(frequency_columns: Vec<String>, records: Vec<SampleRecord>) -> Result<Self> {
        check_widths(
            frequency_columns.len(),
            records.iter().map(|r| r.frequencies.len()),
        )?;
        Ok(Self {
            frequency_columns,
            records,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of spectral features per row.
    pub fn num_features(&self) -> usize {
        self.frequency_columns.len()
    }

    /// Distinct group ids present in the table.
    pub fn group_ids(&self) -> BTreeSet<i64> {
        self.records.iter().map(|r| r.group_id).collect()
    }

    /// One `(group_id, label_encoded)` entry per distinct pair.
    ///
    /// A well-formed table yields exactly one entry per group.
    pub fn group_labels(&self) -> BTreeMap<i64, BTreeSet<usize>> {
        let mut groups: BTreeMap<i64, BTreeSet<usize>> = BTreeMap::new();
        for r in &self.records {
            groups.entry(r.group_id).or_default().insert(r.label_encoded);
        }
        groups
    }

    /// Number of distinct groups per class code.
    pub fn groups_per_class(&self) -> BTreeMap<usize, usize> {
        let mut counts = BTreeMap::new();
        for codes in self.group_labels().values() {
            for &code in codes {
                *counts.entry(code).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Rows whose group is in `groups`, original order kept.
    pub fn select_groups(&self, groups: &BTreeSet<i64>) -> SampleTable {
        SampleTable {
            frequency_columns: self.frequency_columns.clone(),
            records: self
                .records
                .iter()
                .filter(|r| groups.contains(&r.group_id))
                .cloned()
                .collect(),
        }
    }
}

fn check_widths(expected: usize, widths: impl Iterator<Item = usize>) -> Result<()> {
    for width in widths {
        if width != expected {
            return Err(PipelineError::ShapeMismatch {
                what: "spectral values per row".into(),
                expected,
                found: width,
            });
        }
    }
    Ok(())
}
