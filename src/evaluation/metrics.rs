use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

// ---------------------------------------------------------------------------
// ConfusionMatrix
// ---------------------------------------------------------------------------

/// Square count matrix over the full vocabulary: rows are true classes,
/// columns predicted classes. Classes never seen keep all-zero rows and
/// columns so the shape is stable across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn new(num_classes: usize) -> Self {
        Self {
            counts: vec![vec![0; num_classes]; num_classes],
        }
    }

    /// Build from `(true, predicted)` code pairs.
    pub fn from_pairs(
        num_classes: usize,
        pairs: impl IntoIterator<Item = (usize, usize)>,
    ) -> Result<Self> {
        let mut matrix = Self::new(num_classes);
        for (truth, predicted) in pairs {
            matrix.add(truth, predicted)?;
        }
        Ok(matrix)
    }

    pub fn add(&mut self, truth: usize, predicted: usize) -> Result<()> {
        let num_classes = self.num_classes();
        for code in [truth, predicted] {
            if code >= num_classes {
                return Err(PipelineError::UnknownLabelCode { code, num_classes });
            }
        }
        self.counts[truth][predicted] += 1;
        Ok(())
    }

    pub fn num_classes(&self) -> usize {
        self.counts.len()
    }

    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }

    pub fn rows(&self) -> &[Vec<usize>] {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Diagonal sum.
    pub fn correct(&self) -> usize {
        (0..self.num_classes()).map(|i| self.counts[i][i]).sum()
    }

    /// Fraction on the diagonal; 0 for an empty matrix.
    pub fn accuracy(&self) -> f64 {
        ratio(self.correct(), self.total())
    }

    /// Number of true samples per class.
    pub fn support(&self, class: usize) -> usize {
        self.counts[class].iter().sum()
    }

    /// Number of predictions per class.
    pub fn predicted(&self, class: usize) -> usize {
        self.counts.iter().map(|row| row[class]).sum()
    }

    /// Precision, recall and F1 for every class; undefined ratios are 0.
    pub fn class_metrics(&self, class_names: &[String]) -> Vec<ClassMetrics> {
        (0..self.num_classes())
            .map(|c| {
                let tp = self.counts[c][c];
                let support = self.support(c);
                let precision = ratio(tp, self.predicted(c));
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    class: class_names.get(c).cloned().unwrap_or_else(|| c.to_string()),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Per-class F1 weighted by true-class support.
    pub fn weighted_f1(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        self.class_metrics(&[])
            .iter()
            .map(|m| m.f1 * m.support as f64)
            .sum::<f64>()
            / total as f64
    }

    /// Unweighted mean F1 over classes that occur as truth or prediction.
    pub fn macro_f1(&self) -> f64 {
        let present: Vec<f64> = self
            .class_metrics(&[])
            .iter()
            .enumerate()
            .filter(|(c, m)| m.support > 0 || self.predicted(*c) > 0)
            .map(|(_, m)| m.f1)
            .collect();
        if present.is_empty() {
            0.0
        } else {
            present.iter().sum::<f64>() / present.len() as f64
        }
    }
}

/// One row of a classification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}
