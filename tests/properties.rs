//! Property tests for the cleaning, splitting and aggregation invariants.

use proptest::prelude::*;

use hsi_classifier::data::model::{LabeledRecord, LabeledTable};
use hsi_classifier::evaluation::{majority_vote, ImageAggregator, PredictionRecord};
use hsi_classifier::split::allocate_test_groups;
use hsi_classifier::{
    CleaningStrategy, CollisionPolicy, DivideStrategy, FrequencyColumnCleaner,
    GroupStratifiedSplitter, LabelVocabulary, PipelineError, SampleRecord, SampleTable,
};

const SENTINEL: f64 = -9999.0;

/// A spectral value: mostly ordinary, sometimes missing or the sentinel.
fn arb_value() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -10.0f64..10.0,
        1 => Just(f64::NAN),
        1 => Just(SENTINEL),
    ]
}

fn arb_labeled_table() -> impl Strategy<Value = LabeledTable> {
    (1usize..6).prop_flat_map(|width| {
        prop::collection::vec(prop::collection::vec(arb_value(), width), 0..40).prop_map(
            move |rows| LabeledTable {
                frequency_columns: (0..width).map(|i| format!("frq{i}")).collect(),
                records: rows
                    .into_iter()
                    .enumerate()
                    .map(|(i, frequencies)| LabeledRecord {
                        file: format!("{i}_px"),
                        group_id: i as i64,
                        label: "A".into(),
                        frequencies,
                    })
                    .collect(),
            },
        )
    })
}

/// Pixel counts per group for each class; every class has ≥ 2 groups.
fn arb_class_groups() -> impl Strategy<Value = Vec<Vec<usize>>> {
    prop::collection::vec(prop::collection::vec(1usize..6, 2..8), 1..5)
}

fn build_table(classes: &[Vec<usize>]) -> SampleTable {
    let mut records = Vec::new();
    let mut group_id = 100;
    for (code, groups) in classes.iter().enumerate() {
        for &pixels in groups {
            for p in 0..pixels {
                records.push(SampleRecord {
                    file: format!("{group_id}_{p}"),
                    group_id,
                    label: format!("c{code}"),
                    label_encoded: code,
                    frequencies: vec![p as f64],
                });
            }
            group_id += 1;
        }
    }
    SampleTable::new(vec!["frq".into()], records).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn drop_policy_leaves_no_missing_or_sentinel(table in arb_labeled_table()) {
        let cleaner = FrequencyColumnCleaner::new(SENTINEL, CollisionPolicy::Drop);
        let expected = table
            .records
            .iter()
            .filter(|r| r.frequencies.iter().all(|v| !v.is_nan() && *v != SENTINEL))
            .count();
        let cleaned = cleaner.clean(table).unwrap();
        prop_assert_eq!(cleaned.len(), expected);
        for v in cleaned.records.iter().flat_map(|r| &r.frequencies) {
            prop_assert!(!v.is_nan());
            prop_assert!(*v != SENTINEL);
        }
    }

    #[test]
    fn reject_policy_fails_exactly_when_sentinel_present(table in arb_labeled_table()) {
        let has_sentinel = table
            .records
            .iter()
            .any(|r| r.frequencies.contains(&SENTINEL));
        let cleaner = FrequencyColumnCleaner::new(SENTINEL, CollisionPolicy::Reject);
        match cleaner.clean(table) {
            Ok(cleaned) => {
                prop_assert!(!has_sentinel);
                prop_assert!(cleaned.records.iter().flat_map(|r| &r.frequencies).all(|v| !v.is_nan()));
            }
            Err(err) => {
                prop_assert!(has_sentinel);
                prop_assert!(matches!(err, PipelineError::CleaningInvariant(_)), "unexpected error: {}", err);
            }
        }
    }

    #[test]
    fn split_is_group_disjoint_and_stratified(
        classes in arb_class_groups(),
        test_fraction in 0.05f64..0.95,
        seed in any::<u64>(),
    ) {
        let table = build_table(&classes);
        let splitter = GroupStratifiedSplitter::new(test_fraction, seed).unwrap();
        let n: usize = classes.iter().map(Vec::len).sum();
        let k = classes.len();
        let wanted = ((n as f64) * test_fraction - 1e-9).ceil() as usize;
        if wanted < k || wanted > n - k {
            let infeasible = matches!(
                splitter.split(&table),
                Err(PipelineError::InfeasibleSplit { .. })
            );
            prop_assert!(infeasible);
            return Ok(());
        }
        let (train, test) = splitter.split(&table).unwrap();
        prop_assert_eq!(test.group_ids().len(), wanted);

        let (tr, te) = (train.group_ids(), test.group_ids());
        prop_assert!(tr.is_disjoint(&te));
        prop_assert_eq!(tr.len() + te.len(), table.group_ids().len());
        prop_assert_eq!(train.len() + test.len(), table.len());

        let (train_counts, test_counts) = (train.groups_per_class(), test.groups_per_class());
        for code in 0..classes.len() {
            prop_assert!(train_counts.get(&code).copied().unwrap_or(0) >= 1);
            prop_assert!(test_counts.get(&code).copied().unwrap_or(0) >= 1);
        }

        let again = splitter.split(&table).unwrap();
        prop_assert_eq!(again.1.group_ids(), te);
    }

    #[test]
    fn allocation_stays_within_class_bounds(
        sizes in prop::collection::vec(2usize..30, 1..8),
        test_fraction in 0.01f64..0.99,
    ) {
        let n: usize = sizes.iter().sum();
        let k = sizes.len();
        let wanted = ((n as f64) * test_fraction - 1e-9).ceil() as usize;
        match allocate_test_groups(&sizes, test_fraction) {
            Ok(counts) => {
                prop_assert!(wanted >= k && wanted <= n - k);
                prop_assert_eq!(counts.iter().sum::<usize>(), wanted);
                for (c, s) in counts.iter().zip(&sizes) {
                    prop_assert!(*c >= 1 && *c < *s);
                }
            }
            Err(err) => {
                prop_assert!(wanted < k || wanted > n - k);
                let infeasible = matches!(err, PipelineError::InfeasibleSplit { .. });
                prop_assert!(infeasible);
            }
        }
    }

    #[test]
    fn one_hot_width_is_always_num_classes(
        classes in arb_class_groups(),
        extra_classes in 0usize..3,
        seed in any::<u64>(),
    ) {
        let table = build_table(&classes);
        let names: Vec<String> = (0..classes.len() + extra_classes).map(|c| format!("c{c:02}")).collect();
        let vocabulary = LabelVocabulary::fit(names);
        // half of the groups is always feasible when every class has two
        let splitter = GroupStratifiedSplitter::new(0.5, seed).unwrap();
        let (train, test) = splitter.split(&table).unwrap();
        let tensors = splitter.shape(&train, &test, &vocabulary).unwrap();
        prop_assert_eq!(tensors.labels_train.ncols(), vocabulary.num_classes());
        prop_assert_eq!(tensors.labels_test.ncols(), vocabulary.num_classes());
        prop_assert_eq!(tensors.features_train.shape(), &[train.len(), 1, 1]);
    }

    #[test]
    fn vocabulary_round_trips(labels in prop::collection::vec("[A-Za-z ]{1,12}", 1..20)) {
        let vocabulary = LabelVocabulary::fit(labels.clone());
        for label in &labels {
            let code = vocabulary.encode(label).unwrap();
            prop_assert!(code < vocabulary.num_classes());
            prop_assert_eq!(vocabulary.decode(code).unwrap(), label.as_str());
        }
    }

    #[test]
    fn majority_vote_ignores_row_order(
        mut predicted in prop::collection::vec(0usize..4, 1..30),
        seed in any::<u64>(),
    ) {
        let records = |codes: &[usize]| -> Vec<PredictionRecord> {
            codes
                .iter()
                .map(|&predicted_label| PredictionRecord { group_id: 9, true_label: 0, predicted_label })
                .collect()
        };
        let aggregator = ImageAggregator::new(4);
        let first = aggregator.aggregate(&records(&predicted)).unwrap();

        // deterministic permutation driven by the seed
        let n = predicted.len();
        predicted.rotate_left((seed % n as u64) as usize);
        predicted.reverse();
        let second = aggregator.aggregate(&records(&predicted)).unwrap();

        prop_assert_eq!(first.predictions[0].predicted_label, second.predictions[0].predicted_label);
        let votes = &first.predictions[0].votes;
        let winner = first.predictions[0].predicted_label;
        prop_assert_eq!(winner, majority_vote(votes));
        prop_assert!(votes.iter().all(|&v| v <= votes[winner]));
        prop_assert!(votes[..winner].iter().all(|&v| v < votes[winner]));
    }
}
