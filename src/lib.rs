//! Data pipeline for hyperspectral pixel classification.
//!
//! Raw per-pixel spectra tied to labelled sample images are cleaned, split
//! into train and test partitions at the image level (stratified by class,
//! so no image leaks across the boundary), shaped into tensors for a 1-D
//! convolutional model, and the model's per-pixel predictions are scored at
//! both pixel and image granularity.
//!
//! ```text
//!  data::loader ─▶ preprocessing ─▶ split ─▶ export ─▶ [training] ─▶ evaluation
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod pipeline;
pub mod preprocessing;
pub mod split;

pub use config::{CollisionPolicy, DataConfig, LabelConfig, MergeRule, PipelineConfig, SplitConfig};
pub use data::model::{RawRecord, RawTable, SampleRecord, SampleTable};
pub use error::{PipelineError, Result};
pub use evaluation::{EvaluationReport, ImageAggregator, PredictionRecord};
pub use pipeline::{evaluate, prepare, PreparedData};
pub use preprocessing::{
    CleaningStrategy, FrequencyColumnCleaner, LabelNormalizer, LabelVocabulary, SamplePreprocessor,
};
pub use split::{DivideStrategy, GroupStratifiedSplitter, SplitTensors};
