use std::collections::BTreeMap;

use log::debug;
use serde::{Deserialize, Serialize};

use super::metrics::ConfusionMatrix;
use crate::error::{PipelineError, Result};

/// One pixel's ground truth and prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub group_id: i64,
    pub true_label: usize,
    pub predicted_label: usize,
}

impl PredictionRecord {
    /// Pair per-pixel predictions with the `(group_id, true code)` of each
    /// test row, in test-row order.
    ///
    /// The group comes from the retained test metadata, never from the row
    /// position.
    pub fn align<I>(truth: I, predicted: &[usize]) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = (i64, usize)>,
        I::IntoIter: ExactSizeIterator,
    {
        let truth = truth.into_iter();
        if truth.len() != predicted.len() {
            return Err(PipelineError::ShapeMismatch {
                what: "predictions for test rows".into(),
                expected: truth.len(),
                found: predicted.len(),
            });
        }
        Ok(truth
            .zip(predicted)
            .map(|((group_id, true_label), &predicted_label)| Self {
                group_id,
                true_label,
                predicted_label,
            })
            .collect())
    }
}

/// The majority-vote outcome for one image group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImagePrediction {
    pub group_id: i64,
    pub true_label: usize,
    pub predicted_label: usize,
    pub pixel_count: usize,
    /// Pixel votes per class code.
    pub votes: Vec<usize>,
}

/// Image-level predictions and metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAggregate {
    /// One entry per group, ascending group id.
    pub predictions: Vec<ImagePrediction>,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

/// Collapses pixel predictions into one prediction per image group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageAggregator {
    num_classes: usize,
}

impl ImageAggregator {
    pub fn new(num_classes: usize) -> Self {
        Self { num_classes }
    }

    /// Majority vote per group.
    ///
    /// Ties go to the lowest class code, so the result depends only on the
    /// multiset of pixel predictions, never on their order. The true label
    /// of a group is that of its pixels; pixels that disagree are an error.
    pub fn aggregate(&self, predictions: &[PredictionRecord]) -> Result<ImageAggregate> {
        if predictions.is_empty() {
            return Err(PipelineError::EmptyDataset("image aggregation".into()));
        }

        // group → (true label, votes per class)
        let mut groups: BTreeMap<i64, (usize, Vec<usize>)> = BTreeMap::new();
        for p in predictions {
            for code in [p.true_label, p.predicted_label] {
                if code >= self.num_classes {
                    return Err(PipelineError::UnknownLabelCode {
                        code,
                        num_classes: self.num_classes,
                    });
                }
            }
            let (truth, votes) = groups
                .entry(p.group_id)
                .or_insert_with(|| (p.true_label, vec![0; self.num_classes]));
            if *truth != p.true_label {
                return Err(PipelineError::AggregationInconsistency {
                    group_id: p.group_id,
                    expected: *truth,
                    found: p.true_label,
                });
            }
            votes[p.predicted_label] += 1;
        }

        let mut confusion = ConfusionMatrix::new(self.num_classes);
        let mut images = Vec::with_capacity(groups.len());
        for (group_id, (true_label, votes)) in groups {
            let predicted_label = majority_vote(&votes);
            if votes.iter().filter(|&&n| n == votes[predicted_label]).count() > 1 {
                debug!("group {group_id}: tied vote {votes:?}, picked class {predicted_label}");
            }
            confusion.add(true_label, predicted_label)?;
            images.push(ImagePrediction {
                group_id,
                true_label,
                predicted_label,
                pixel_count: votes.iter().sum(),
                votes,
            });
        }

        Ok(ImageAggregate {
            accuracy: confusion.accuracy(),
            predictions: images,
            confusion,
        })
    }
}

/// Index of the first maximal count: the lowest code among tied modes.
pub fn majority_vote(votes: &[usize]) -> usize {
    votes
        .iter()
        .enumerate()
        .fold((0, 0), |(best, best_n), (code, &n)| {
            if n > best_n {
                (code, n)
            } else {
                (best, best_n)
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pixels(group_id: i64, true_label: usize, predicted: &[usize]) -> Vec<PredictionRecord> {
        predicted
            .iter()
            .map(|&predicted_label| PredictionRecord {
                group_id,
                true_label,
                predicted_label,
            })
            .collect()
    }

    #[test]
    fn tie_goes_to_lowest_code() {
        let result = ImageAggregator::new(2)
            .aggregate(&pixels(7, 1, &[0, 0, 1, 1]))
            .unwrap();
        assert_eq!(result.predictions[0].predicted_label, 0);
        assert_eq!(result.predictions[0].votes, vec![2, 2]);
        assert_eq!(result.accuracy, 0.0);
    }

    #[test]
    fn vote_ignores_pixel_order() {
        let aggregator = ImageAggregator::new(3);
        let a = aggregator.aggregate(&pixels(1, 2, &[2, 1, 2, 1, 0])).unwrap();
        let b = aggregator.aggregate(&pixels(1, 2, &[1, 1, 0, 2, 2])).unwrap();
        assert_eq!(a.predictions[0].predicted_label, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn aggregates_each_group_and_scores_images() {
        let mut records = pixels(3, 0, &[0, 0, 1]);
        records.extend(pixels(1, 1, &[1, 1, 1, 0]));
        records.extend(pixels(2, 1, &[0, 0, 1]));
        let result = ImageAggregator::new(3).aggregate(&records).unwrap();

        let summary: Vec<_> = result
            .predictions
            .iter()
            .map(|p| (p.group_id, p.true_label, p.predicted_label, p.pixel_count))
            .collect();
        assert_eq!(summary, vec![(1, 1, 1, 4), (2, 1, 0, 3), (3, 0, 0, 3)]);
        assert!((result.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(result.confusion.num_classes(), 3);
        assert_eq!(result.confusion.get(1, 0), 1);
        assert_eq!(result.confusion.rows()[2], vec![0, 0, 0]);
    }

    #[test]
    fn disagreeing_true_labels_are_fatal() {
        let mut records = pixels(4, 0, &[0, 1]);
        records.extend(pixels(4, 1, &[1]));
        let err = ImageAggregator::new(2).aggregate(&records).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::AggregationInconsistency { group_id: 4, expected: 0, found: 1 }
        ));
    }

    #[test]
    fn align_uses_given_groups_and_checks_length() {
        let truth = vec![(10, 0), (10, 0), (20, 1)];
        let records = PredictionRecord::align(truth.clone(), &[1, 0, 1]).unwrap();
        assert_eq!(records[2].group_id, 20);
        assert_eq!(records[0].predicted_label, 1);
        assert!(matches!(
            PredictionRecord::align(truth, &[0, 1]),
            Err(PipelineError::ShapeMismatch { expected: 3, found: 2, .. })
        ));
    }

    #[test]
    fn empty_or_out_of_range_input_is_rejected() {
        assert!(ImageAggregator::new(2).aggregate(&[]).is_err());
        assert!(ImageAggregator::new(2).aggregate(&pixels(1, 0, &[2])).is_err());
    }
}
