//! Cleaning stages that turn a [`RawTable`](crate::data::model::RawTable)
//! into an encoded [`SampleTable`](crate::data::model::SampleTable).
//!
//! ```text
//!  RawTable
//!     │  group ids from `File`, label text normalised
//!     ▼
//!  LabeledTable ── exclude / merge classes ──▶ LabeledTable
//!     │  FrequencyColumnCleaner (sentinel fill + row drop)
//!     ▼
//!  LabeledTable ── fit_encode ──▶ SampleTable + LabelVocabulary
//! ```

pub mod frequency;
pub mod labels;
pub mod sample;

use crate::error::Result;

pub use frequency::FrequencyColumnCleaner;
pub use labels::{LabelNormalizer, LabelVocabulary};
pub use sample::{parse_group_id, SamplePreprocessor};

/// A table-cleaning stage.
///
/// `clean` consumes its input and returns a new table; `validate` checks the
/// stage's postcondition on an output and is called by `clean` before it
/// returns.
pub trait CleaningStrategy {
    type Input;
    type Output;

    fn clean(&self, input: Self::Input) -> Result<Self::Output>;

    fn validate(&self, output: &Self::Output) -> Result<()>;
}
