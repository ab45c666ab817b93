use thiserror::Error;

/// Errors raised by the cleaning, splitting and evaluation stages.
///
/// Every variant is fatal for the run: all of them are deterministic
/// functions of the input, so nothing here is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The file identifier has no parseable leading integer before `_`.
    #[error("row {row}: cannot derive group id from file identifier '{identifier}'")]
    MalformedIdentifier { row: usize, identifier: String },

    /// The label is blank once normalized.
    #[error("row {row} ({file}): label '{label}' is empty after normalization")]
    MalformedLabel {
        row: usize,
        file: String,
        label: String,
    },

    #[error("required column '{0}' is missing")]
    MissingColumn(String),

    #[error("no frequency columns found with prefix '{prefix}'")]
    NoFrequencyColumns { prefix: String },

    /// A missing or sentinel value survived cleaning, or real data collided
    /// with the sentinel.
    #[error("cleaning invariant violated: {0}")]
    CleaningInvariant(String),

    #[error("dataset is empty after {0}")]
    EmptyDataset(String),

    #[error("class '{class}' has {groups} image group(s), at least {required} are needed to stratify")]
    InsufficientGroups {
        class: String,
        groups: usize,
        required: usize,
    },

    /// `test_fraction` of the stratified groups cannot give every class at
    /// least one group in each partition.
    #[error(
        "test fraction {test_fraction} of {groups} image groups gives {test_groups} test \
         group(s), but each of the {classes} classes needs a group on both sides"
    )]
    InfeasibleSplit {
        test_fraction: f64,
        groups: usize,
        test_groups: usize,
        classes: usize,
    },

    /// Pixels of one image group carry different labels in the cleaned table.
    #[error("group {group_id}: pixels carry different labels ({expected} vs {found})")]
    MixedGroupLabels {
        group_id: i64,
        expected: usize,
        found: usize,
    },

    /// Pixels of one image group disagree on the true label.
    #[error("group {group_id}: pixels disagree on the true label ({expected} vs {found})")]
    AggregationInconsistency {
        group_id: i64,
        expected: usize,
        found: usize,
    },

    #[error("label '{0}' is not in the vocabulary")]
    UnknownLabel(String),

    #[error("class code {code} is out of range for {num_classes} classes")]
    UnknownLabelCode { code: usize, num_classes: usize },

    #[error("{what}: expected {expected}, found {found}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
