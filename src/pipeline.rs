//! End-to-end orchestration of the data side of a training run.
//!
//! ```text
//!  RawTable ─▶ SamplePreprocessor ─▶ GroupStratifiedSplitter ─▶ SplitTensors ─▶ [training]
//!                      │                                                          │
//!                      └──────── LabelVocabulary ──────────┐         per-pixel codes
//!                                                          ▼                      ▼
//!                                                    EvaluationReport ◀── PredictionRecord
//! ```

use crate::config::PipelineConfig;
use crate::data::model::{RawTable, SampleTable};
use crate::error::Result;
use crate::evaluation::{EvaluationReport, PredictionRecord};
use crate::preprocessing::{LabelVocabulary, SamplePreprocessor};
use crate::split::{DivideStrategy, GroupStratifiedSplitter, SplitTensors};

/// Output of [`prepare`]: both partitions, their tensors and the vocabulary
/// fitted for this run.
#[derive(Debug, Clone)]
pub struct PreparedData {
    pub vocabulary: LabelVocabulary,
    pub train: SampleTable,
    pub test: SampleTable,
    pub tensors: SplitTensors,
}

/// Clean, split and shape a raw table.
pub fn prepare(raw: RawTable, config: &PipelineConfig) -> Result<PreparedData> {
    config.validate()?;
    let (table, vocabulary) = SamplePreprocessor::from_config(config).process(raw)?;

    let splitter = GroupStratifiedSplitter::from_config(&config.split)?;
    let (train, test) = splitter.split(&table)?;
    let tensors = splitter.shape(&train, &test, &vocabulary)?;

    Ok(PreparedData {
        vocabulary,
        train,
        test,
        tensors,
    })
}

/// Evaluate per-pixel predicted codes, aligned with the rows of `test`.
pub fn evaluate(
    test: &SampleTable,
    predicted: &[usize],
    vocabulary: &LabelVocabulary,
) -> Result<EvaluationReport> {
    let truth = test.records.iter().map(|r| (r.group_id, r.label_encoded));
    let records = PredictionRecord::align(truth, predicted)?;
    EvaluationReport::build(&records, vocabulary)
}
