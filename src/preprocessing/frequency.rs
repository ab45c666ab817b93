use log::{debug, info};

use super::CleaningStrategy;
use crate::config::{CollisionPolicy, DataConfig};
use crate::data::model::LabeledTable;
use crate::error::{PipelineError, Result};

/// Drops every row with a missing spectral value.
///
/// Missing values (`NaN`) are first replaced by the sentinel, then every row
/// holding the sentinel in any frequency column is removed. A value that was
/// already equal to the sentinel is indistinguishable from "missing" once
/// filled, so it is either rejected or dropped depending on the
/// [`CollisionPolicy`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyColumnCleaner {
    sentinel: f64,
    policy: CollisionPolicy,
}

impl FrequencyColumnCleaner {
    pub fn new(sentinel: f64, policy: CollisionPolicy) -> Self {
        Self { sentinel, policy }
    }

    pub fn from_config(config: &DataConfig) -> Self {
        Self::new(config.sentinel, config.collision_policy)
    }
}

impl CleaningStrategy for FrequencyColumnCleaner {
    type Input = LabeledTable;
    type Output = LabeledTable;

    fn clean(&self, table: LabeledTable) -> Result<LabeledTable> {
        let before = table.len();
        let mut records = Vec::with_capacity(before);

        for (row, mut record) in table.records.into_iter().enumerate() {
            if self.policy == CollisionPolicy::Reject {
                if let Some(col) = record.frequencies.iter().position(|&v| v == self.sentinel) {
                    return Err(PipelineError::CleaningInvariant(format!(
                        "row {row} ({}), column '{}' holds the sentinel value {}",
                        record.file, table.frequency_columns[col], self.sentinel
                    )));
                }
            }

            for v in record.frequencies.iter_mut().filter(|v| v.is_nan()) {
                *v = self.sentinel;
            }

            if record.frequencies.iter().any(|&v| v == self.sentinel) {
                debug!("dropping row {row} ({}): missing spectral values", record.file);
                continue;
            }
            records.push(record);
        }

        let cleaned = LabeledTable {
            frequency_columns: table.frequency_columns,
            records,
        };
        self.validate(&cleaned)?;

        info!(
            "frequency cleaning kept {} of {before} rows",
            cleaned.len()
        );
        Ok(cleaned)
    }

    fn validate(&self, table: &LabeledTable) -> Result<()> {
        let (mut missing, mut sentinel) = (0usize, 0usize);
        for v in table.records.iter().flat_map(|r| &r.frequencies) {
            if v.is_nan() {
                missing += 1;
            } else if *v == self.sentinel {
                sentinel += 1;
            }
        }
        if missing > 0 || sentinel > 0 {
            return Err(PipelineError::CleaningInvariant(format!(
                "{missing} missing and {sentinel} sentinel values remain in frequency columns"
            )));
        }
        Ok(())
    }
}
