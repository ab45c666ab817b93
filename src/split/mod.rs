//! Train/test division at the image-group level.
//!
//! The stratification unit is the image group, not the pixel: every pixel of
//! a group lands in the same partition, and each class keeps roughly its
//! share of groups on both sides.

pub mod tensors;

use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::config::SplitConfig;
use crate::data::model::SampleTable;
use crate::error::{PipelineError, Result};
use crate::preprocessing::LabelVocabulary;

pub use tensors::{features_tensor, one_hot, to_tensors, SplitTensors};

/// A train/test divider.
pub trait DivideStrategy {
    /// Partition `table` into `(train, test)`.
    fn split(&self, table: &SampleTable) -> Result<(SampleTable, SampleTable)>;

    /// Shape both partitions into model tensors.
    fn shape(
        &self,
        train: &SampleTable,
        test: &SampleTable,
        vocabulary: &LabelVocabulary,
    ) -> Result<SplitTensors> {
        to_tensors(train, test, vocabulary)
    }
}

/// Seeded, class-stratified split over image groups.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupStratifiedSplitter {
    test_fraction: f64,
    random_seed: u64,
    allow_singleton_classes: bool,
}

impl GroupStratifiedSplitter {
    pub fn new(test_fraction: f64, random_seed: u64) -> Result<Self> {
        Self::from_config(&SplitConfig {
            test_fraction,
            random_seed,
            ..SplitConfig::default()
        })
    }

    pub fn from_config(config: &SplitConfig) -> Result<Self> {
        if !(config.test_fraction > 0.0 && config.test_fraction < 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                config.test_fraction
            )));
        }
        Ok(Self {
            test_fraction: config.test_fraction,
            random_seed: config.random_seed,
            allow_singleton_classes: config.allow_singleton_classes,
        })
    }

    /// Place single-group classes wholly in train instead of failing.
    pub fn allow_singleton_classes(mut self, allow: bool) -> Self {
        self.allow_singleton_classes = allow;
        self
    }

    /// Group ids per class code, each list sorted by group id.
    fn groups_by_class(table: &SampleTable) -> Result<BTreeMap<usize, Vec<i64>>> {
        let mut by_class: BTreeMap<usize, Vec<i64>> = BTreeMap::new();
        for (group_id, codes) in table.group_labels() {
            let mut codes = codes.into_iter();
            match (codes.next(), codes.next()) {
                (Some(code), None) => by_class.entry(code).or_default().push(group_id),
                (Some(expected), Some(found)) => {
                    return Err(PipelineError::MixedGroupLabels {
                        group_id,
                        expected,
                        found,
                    })
                }
                (None, _) => {}
            }
        }
        Ok(by_class)
    }

    /// Human-readable name of a class code, taken from the table itself.
    fn class_name(table: &SampleTable, code: usize) -> String {
        table
            .records
            .iter()
            .find(|r| r.label_encoded == code)
            .map(|r| r.label.clone())
            .unwrap_or_else(|| code.to_string())
    }
}

impl DivideStrategy for GroupStratifiedSplitter {
    fn split(&self, table: &SampleTable) -> Result<(SampleTable, SampleTable)> {
        let by_class = Self::groups_by_class(table)?;

        let mut train_groups = BTreeSet::new();
        let mut strata = Vec::new();
        for (code, groups) in by_class {
            if groups.len() >= 2 {
                strata.push((code, groups));
                continue;
            }
            if !self.allow_singleton_classes {
                return Err(PipelineError::InsufficientGroups {
                    class: Self::class_name(table, code),
                    groups: groups.len(),
                    required: 2,
                });
            }
            warn!(
                "class '{}' has a single image group, placing it in train only",
                Self::class_name(table, code)
            );
            train_groups.extend(groups);
        }

        if strata.is_empty() {
            return Err(PipelineError::EmptyDataset(
                "group split (no class has two image groups)".into(),
            ));
        }

        let sizes: Vec<usize> = strata.iter().map(|(_, g)| g.len()).collect();
        let test_counts = allocate_test_groups(&sizes, self.test_fraction)?;

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_seed);
        let mut test_groups = BTreeSet::new();
        for ((_, mut groups), n_test) in strata.into_iter().zip(test_counts) {
            groups.shuffle(&mut rng);
            let (test, train) = groups.split_at(n_test);
            test_groups.extend(test.iter().copied());
            train_groups.extend(train.iter().copied());
        }

        let train = table.select_groups(&train_groups);
        let test = table.select_groups(&test_groups);
        info!(
            "split {} groups into {} train ({} rows) and {} test ({} rows), seed {}",
            train_groups.len() + test_groups.len(),
            train_groups.len(),
            train.len(),
            test_groups.len(),
            test.len(),
            self.random_seed
        );
        Ok((train, test))
    }
}

/// Number of test groups per stratum.
///
/// The total is `ceil(test_fraction * n)`. It must leave every stratum at
/// least one group on each side, i.e. lie in `[k, n - k]`, otherwise the
/// split is infeasible. The total is distributed over strata by largest
/// remainder; ties go to the lower stratum index. Every size must be ≥ 2.
pub fn allocate_test_groups(sizes: &[usize], test_fraction: f64) -> Result<Vec<usize>> {
    let n: usize = sizes.iter().sum();
    let k = sizes.len();
    let n_test = ((n as f64) * test_fraction - 1e-9).ceil().max(0.0) as usize;
    if n_test < k || n_test > n.saturating_sub(k) {
        return Err(PipelineError::InfeasibleSplit {
            test_fraction,
            groups: n,
            test_groups: n_test,
            classes: k,
        });
    }

    let quotas: Vec<f64> = sizes
        .iter()
        .map(|&s| s as f64 * n_test as f64 / n as f64)
        .collect();
    let mut counts: Vec<usize> = sizes
        .iter()
        .zip(&quotas)
        .map(|(&s, q)| (q.floor() as usize).clamp(1, s - 1))
        .collect();

    let mut total: usize = counts.iter().sum();
    while total < n_test {
        let pick = (0..k)
            .filter(|&i| counts[i] < sizes[i] - 1)
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if quotas[b] - counts[b] as f64 >= quotas[i] - counts[i] as f64 => Some(b),
                _ => Some(i),
            });
        let Some(i) = pick else { break };
        counts[i] += 1;
        total += 1;
    }
    while total > n_test {
        let pick = (0..k)
            .filter(|&i| counts[i] > 1)
            .fold(None, |best: Option<usize>, i| match best {
                Some(b) if quotas[b] - counts[b] as f64 <= quotas[i] - counts[i] as f64 => Some(b),
                _ => Some(i),
            });
        let Some(i) = pick else { break };
        counts[i] -= 1;
        total -= 1;
    }
    Ok(counts)
}
