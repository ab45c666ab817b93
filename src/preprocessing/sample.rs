use log::info;

use super::{CleaningStrategy, FrequencyColumnCleaner, LabelNormalizer, LabelVocabulary};
use crate::config::PipelineConfig;
use crate::data::model::{LabeledRecord, LabeledTable, RawTable, SampleTable};
use crate::error::{PipelineError, Result};

/// Group id encoded in a file identifier: the integer before the first `_`.
///
/// `"0042_scan_b.hdr"` → `Some(42)`.
pub fn parse_group_id(identifier: &str) -> Option<i64> {
    identifier
        .split('_')
        .next()
        .and_then(|token| token.trim().parse::<i64>().ok())
}

/// Runs the full cleaning sequence over a raw table.
///
/// Order matters, each step narrows the rows the next one sees:
/// 1. derive `group_id` from the file identifier
/// 2. normalise label text, rejecting labels left blank
/// 3. exclude and merge classes
/// 4. drop rows with missing spectral values
/// 5. fit the vocabulary and encode labels
#[derive(Debug, Clone)]
pub struct SamplePreprocessor {
    labels: LabelNormalizer,
    cleaner: FrequencyColumnCleaner,
}

impl SamplePreprocessor {
    pub fn new(labels: LabelNormalizer, cleaner: FrequencyColumnCleaner) -> Self {
        Self { labels, cleaner }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            LabelNormalizer::from_config(&config.labels),
            FrequencyColumnCleaner::from_config(&config.data),
        )
    }

    /// Clean and encode `raw`, returning the table and the vocabulary fitted
    /// on it.
    pub fn process(&self, raw: RawTable) -> Result<(SampleTable, LabelVocabulary)> {
        self.clean(raw)
    }

    fn group(raw: RawTable) -> Result<LabeledTable> {
        let records = raw
            .records
            .into_iter()
            .enumerate()
            .map(|(row, r)| {
                let group_id =
                    parse_group_id(&r.file).ok_or_else(|| PipelineError::MalformedIdentifier {
                        row,
                        identifier: r.file.clone(),
                    })?;
                let label = LabelNormalizer::normalize(&r.label);
                if label.is_empty() {
                    return Err(PipelineError::MalformedLabel {
                        row,
                        file: r.file,
                        label: r.label,
                    });
                }
                Ok(LabeledRecord {
                    label,
                    file: r.file,
                    group_id,
                    frequencies: r.frequencies,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(LabeledTable {
            frequency_columns: raw.frequency_columns,
            records,
        })
    }
}

fn ensure_rows(table: LabeledTable, step: &str) -> Result<LabeledTable> {
    if table.is_empty() {
        return Err(PipelineError::EmptyDataset(step.to_string()));
    }
    Ok(table)
}

impl CleaningStrategy for SamplePreprocessor {
    type Input = RawTable;
    type Output = (SampleTable, LabelVocabulary);

    fn clean(&self, raw: RawTable) -> Result<(SampleTable, LabelVocabulary)> {
        let total = raw.len();
        let grouped = ensure_rows(Self::group(raw)?, "ingestion")?;
        let labeled = ensure_rows(self.labels.apply(grouped), "label exclusion")?;
        let cleaned = ensure_rows(self.cleaner.clean(labeled)?, "frequency cleaning")?;
        let output = LabelNormalizer::fit_encode(cleaned)?;
        self.validate(&output)?;

        let (table, vocabulary) = &output;
        info!(
            "preprocessing kept {} of {total} rows in {} groups, {} classes: {:?}",
            table.len(),
            table.group_ids().len(),
            vocabulary.num_classes(),
            vocabulary.classes()
        );
        Ok(output)
    }

    fn validate(&self, (table, vocabulary): &(SampleTable, LabelVocabulary)) -> Result<()> {
        if table.is_empty() {
            return Err(PipelineError::EmptyDataset("preprocessing".into()));
        }
        for record in &table.records {
            if vocabulary.decode(record.label_encoded)? != record.label {
                return Err(PipelineError::UnknownLabel(record.label.clone()));
            }
        }
        Ok(())
    }
}
