use ndarray::{Array2, Array3};

use crate::data::model::SampleTable;
use crate::error::{PipelineError, Result};
use crate::preprocessing::LabelVocabulary;

/// Model-ready tensors for both partitions.
///
/// Features are `(rows, frequencies, 1)` for 1-D convolution; labels are
/// one-hot `(rows, num_classes)` over the full vocabulary, so both label
/// tensors have the same width even when a partition lacks a class.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitTensors {
    pub features_train: Array3<f64>,
    pub features_test: Array3<f64>,
    pub labels_train: Array2<f64>,
    pub labels_test: Array2<f64>,
}

impl SplitTensors {
    pub fn num_classes(&self) -> usize {
        self.labels_train.ncols()
    }
}

/// Spectral columns as `(rows, frequencies, 1)`.
pub fn features_tensor(table: &SampleTable) -> Array3<f64> {
    Array3::from_shape_fn((table.len(), table.num_features(), 1), |(row, col, _)| {
        table.records[row].frequencies[col]
    })
}

/// One-hot encode `label_encoded` over `num_classes` columns.
pub fn one_hot(table: &SampleTable, num_classes: usize) -> Result<Array2<f64>> {
    let mut labels = Array2::zeros((table.len(), num_classes));
    for (row, record) in table.records.iter().enumerate() {
        if record.label_encoded >= num_classes {
            return Err(PipelineError::UnknownLabelCode {
                code: record.label_encoded,
                num_classes,
            });
        }
        labels[[row, record.label_encoded]] = 1.0;
    }
    Ok(labels)
}

/// Shape both partitions.
pub fn to_tensors(
    train: &SampleTable,
    test: &SampleTable,
    vocabulary: &LabelVocabulary,
) -> Result<SplitTensors> {
    if train.num_features() != test.num_features() {
        return Err(PipelineError::ShapeMismatch {
            what: "test frequency columns".into(),
            expected: train.num_features(),
            found: test.num_features(),
        });
    }
    let num_classes = vocabulary.num_classes();
    Ok(SplitTensors {
        features_train: features_tensor(train),
        features_test: features_tensor(test),
        labels_train: one_hot(train, num_classes)?,
        labels_test: one_hot(test, num_classes)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::SampleRecord;

    fn table(codes: &[usize]) -> SampleTable {
        let records = codes
            .iter()
            .enumerate()
            .map(|(i, &code)| SampleRecord {
                file: format!("{i}_p"),
                group_id: i as i64,
                label: String::new(),
                label_encoded: code,
                frequencies: vec![i as f64, 10.0 + i as f64, 20.0 + i as f64],
            })
            .collect();
        SampleTable::new(vec!["frq1".into(), "frq2".into(), "frq3".into()], records).unwrap()
    }

    #[test]
    fn features_gain_trailing_channel() {
        let features = features_tensor(&table(&[0, 1]));
        assert_eq!(features.shape(), &[2, 3, 1]);
        assert_eq!(features[[1, 2, 0]], 21.0);
    }

    #[test]
    fn one_hot_width_is_vocabulary_size() {
        let vocab = LabelVocabulary::fit(["a", "b", "c", "d"]);
        let tensors = to_tensors(&table(&[0, 0, 1]), &table(&[3]), &vocab).unwrap();
        assert_eq!(tensors.labels_train.shape(), &[3, 4]);
        assert_eq!(tensors.labels_test.shape(), &[1, 4]);
        assert_eq!(tensors.labels_test.row(0).to_vec(), vec![0.0, 0.0, 0.0, 1.0]);
        assert_eq!(tensors.num_classes(), 4);
    }

    #[test]
    fn one_hot_rejects_out_of_range_code() {
        assert!(matches!(
            one_hot(&table(&[5]), 2),
            Err(PipelineError::UnknownLabelCode { code: 5, num_classes: 2 })
        ));
    }
}
