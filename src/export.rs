//! Hand-off files between the data pipeline and the training step.
//!
//! A prepared directory holds:
//!
//! | File | Contents |
//! |------|----------|
//! | `x_train.npy`, `x_test.npy` | features, `(rows, frequencies, 1)` f64 |
//! | `y_train.npy`, `y_test.npy` | one-hot labels, `(rows, classes)` f64 |
//! | `vocabulary.json` | class names in code order |
//! | `train_index.csv`, `test_index.csv` | per-row file, group and label, in tensor row order |
//! | `manifest.json` | partition sizes, frequency columns and the config used |

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use log::info;
use ndarray::{Array1, Array2};
use ndarray_npy::{read_npy, write_npy};
use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::data::model::SampleTable;
use crate::error::PipelineError;
use crate::pipeline::PreparedData;
use crate::preprocessing::LabelVocabulary;

pub const X_TRAIN: &str = "x_train.npy";
pub const X_TEST: &str = "x_test.npy";
pub const Y_TRAIN: &str = "y_train.npy";
pub const Y_TEST: &str = "y_test.npy";
pub const VOCABULARY: &str = "vocabulary.json";
pub const TRAIN_INDEX: &str = "train_index.csv";
pub const TEST_INDEX: &str = "test_index.csv";
pub const MANIFEST: &str = "manifest.json";

/// Metadata for one tensor row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow {
    pub row: usize,
    pub file: String,
    pub group_id: i64,
    pub label: String,
    pub label_encoded: usize,
}

impl IndexRow {
    fn from_table(table: &SampleTable) -> Vec<Self> {
        table
            .records
            .iter()
            .enumerate()
            .map(|(row, r)| Self {
                row,
                file: r.file.clone(),
                group_id: r.group_id,
                label: r.label.clone(),
                label_encoded: r.label_encoded,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionSummary {
    pub rows: usize,
    pub groups: usize,
}

impl PartitionSummary {
    fn of(table: &SampleTable) -> Self {
        Self {
            rows: table.len(),
            groups: table.group_ids().len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub frequency_columns: Vec<String>,
    pub num_classes: usize,
    pub train: PartitionSummary,
    pub test: PartitionSummary,
    pub config: PipelineConfig,
}

// ---------------------------------------------------------------------------
// Writing
// ---------------------------------------------------------------------------

/// Write every hand-off file into `dir`, creating it if needed.
pub fn write_prepared(dir: &Path, prepared: &PreparedData, config: &PipelineConfig) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let tensors = &prepared.tensors;
    write_npy(dir.join(X_TRAIN), &tensors.features_train).context("writing x_train")?;
    write_npy(dir.join(X_TEST), &tensors.features_test).context("writing x_test")?;
    write_npy(dir.join(Y_TRAIN), &tensors.labels_train).context("writing y_train")?;
    write_npy(dir.join(Y_TEST), &tensors.labels_test).context("writing y_test")?;

    write_json(&dir.join(VOCABULARY), &prepared.vocabulary)?;
    write_index(&dir.join(TRAIN_INDEX), &prepared.train)?;
    write_index(&dir.join(TEST_INDEX), &prepared.test)?;

    let manifest = Manifest {
        frequency_columns: prepared.train.frequency_columns.clone(),
        num_classes: prepared.vocabulary.num_classes(),
        train: PartitionSummary::of(&prepared.train),
        test: PartitionSummary::of(&prepared.test),
        config: config.clone(),
    };
    write_json(&dir.join(MANIFEST), &manifest)?;

    info!("wrote prepared data to {}", dir.display());
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("serialising JSON")?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

fn write_index(path: &Path, table: &SampleTable) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    for row in IndexRow::from_table(table) {
        writer.serialize(row).context("writing index row")?;
    }
    writer.flush().context("flushing index")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Reading
// ---------------------------------------------------------------------------

pub fn read_vocabulary(dir: &Path) -> Result<LabelVocabulary> {
    let path = dir.join(VOCABULARY);
    let text =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).context("parsing vocabulary")
}

pub fn read_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST);
    let text =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).context("parsing manifest")
}

/// Check that `manifest` describes the same prepared directory as the
/// vocabulary and test index read beside it.
pub fn check_manifest(
    manifest: &Manifest,
    vocabulary: &LabelVocabulary,
    test_index: &[IndexRow],
) -> Result<()> {
    if manifest.num_classes != vocabulary.num_classes() {
        return Err(PipelineError::ShapeMismatch {
            what: format!("classes in {MANIFEST} vs {VOCABULARY}"),
            expected: manifest.num_classes,
            found: vocabulary.num_classes(),
        }
        .into());
    }
    if manifest.test.rows != test_index.len() {
        return Err(PipelineError::ShapeMismatch {
            what: format!("test rows in {MANIFEST} vs {TEST_INDEX}"),
            expected: manifest.test.rows,
            found: test_index.len(),
        }
        .into());
    }
    Ok(())
}

/// Read the test-row metadata, checking every label against `vocabulary`.
pub fn read_test_index(dir: &Path, vocabulary: &LabelVocabulary) -> Result<Vec<IndexRow>> {
    let path = dir.join(TEST_INDEX);
    let mut reader =
        csv::Reader::from_path(&path).with_context(|| format!("opening {}", path.display()))?;
    let mut rows = Vec::new();
    for (i, result) in reader.deserialize().enumerate() {
        let row: IndexRow = result.with_context(|| format!("test index row {i}"))?;
        if row.row != i {
            bail!("test index row {i} is numbered {}", row.row);
        }
        if vocabulary.encode(&row.label)? != row.label_encoded {
            bail!(
                "test index row {i}: label '{}' does not match code {}",
                row.label,
                row.label_encoded
            );
        }
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Debug, Deserialize)]
struct PredictionRow {
    predicted: usize,
}

/// Read per-pixel predicted class codes.
///
/// Supported formats:
/// * `.csv` – a `predicted` column of class codes
/// * `.npy` – 1-D integer codes, or 2-D `(rows, classes)` scores reduced by
///   argmax (first maximal column); the score width must be `num_classes`
pub fn read_predictions(path: &Path, num_classes: usize) -> Result<Vec<usize>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "csv" => {
            let mut reader = csv::Reader::from_path(path).context("opening predictions CSV")?;
            reader
                .deserialize()
                .enumerate()
                .map(|(i, row)| {
                    let row: PredictionRow = row.with_context(|| format!("predictions row {i}"))?;
                    Ok(row.predicted)
                })
                .collect()
        }
        "npy" => read_npy_predictions(path, num_classes),
        other => bail!("Unsupported predictions extension: .{other}"),
    }
}

fn read_npy_predictions(path: &Path, num_classes: usize) -> Result<Vec<usize>> {
    if let Ok(codes) = read_npy::<_, Array1<i64>>(path) {
        return codes
            .iter()
            .map(|&c| usize::try_from(c).with_context(|| format!("negative class code {c}")))
            .collect();
    }
    if let Ok(codes) = read_npy::<_, Array1<i32>>(path) {
        return codes
            .iter()
            .map(|&c| usize::try_from(c).with_context(|| format!("negative class code {c}")))
            .collect();
    }
    let scores: Array2<f64> = match read_npy::<_, Array2<f32>>(path) {
        Ok(scores) => scores.mapv(f64::from),
        Err(_) => read_npy(path).with_context(|| {
            format!("{} holds neither class codes nor a score matrix", path.display())
        })?,
    };
    if scores.ncols() != num_classes {
        return Err(PipelineError::ShapeMismatch {
            what: format!("score columns in {}", path.display()),
            expected: num_classes,
            found: scores.ncols(),
        }
        .into());
    }
    Ok(argmax_rows(&scores))
}

/// Column of the first maximal score in each row.
pub fn argmax_rows(scores: &Array2<f64>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| {
                    if v > best_v {
                        (i, v)
                    } else {
                        (best, best_v)
                    }
                })
                .0
        })
        .collect()
}
