//! End-to-end checks over the public pipeline API and the hand-off files.

use std::collections::BTreeSet;
use std::fs;

use hsi_classifier::data::loader::load_file;
use hsi_classifier::evaluation::PredictionRecord;
use hsi_classifier::export;
use hsi_classifier::{
    prepare, CollisionPolicy, DivideStrategy, GroupStratifiedSplitter, PipelineConfig,
    PipelineError, RawRecord, RawTable, SamplePreprocessor,
};

/// Group 1: 5 rows "A", group 2: 5 rows "B", group 3: 3 rows "A".
fn three_group_table() -> RawTable {
    let mut records = Vec::new();
    for (group, label, rows) in [(1, "A", 5), (2, "B", 5), (3, "A", 3)] {
        for row in 0..rows {
            records.push(RawRecord {
                file: format!("{group}_tile_{row}.hdr"),
                label: label.to_string(),
                frequencies: vec![group as f64 + row as f64 / 10.0, 1.0],
            });
        }
    }
    RawTable::new(vec!["frq_500".into(), "frq_600".into()], records).unwrap()
}

fn three_group_config() -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.split.test_fraction = 1.0 / 3.0;
    config.split.random_seed = 2024;
    config.split.allow_singleton_classes = true;
    config
}

#[test]
fn three_groups_one_held_out() {
    let config = three_group_config();
    let prepared = prepare(three_group_table(), &config).unwrap();

    let train_groups = prepared.train.group_ids();
    let test_groups = prepared.test.group_ids();
    assert_eq!(test_groups.len(), 1);
    assert_eq!(train_groups.len(), 2);
    assert!(train_groups.is_disjoint(&test_groups));
    assert_eq!(prepared.train.len() + prepared.test.len(), 13);

    // The single-group class always trains; the held-out group is an "A" image.
    assert!(train_groups.contains(&2));
    let held_out = *test_groups.iter().next().unwrap();
    assert!(held_out == 1 || held_out == 3);

    for _ in 0..3 {
        let again = prepare(three_group_table(), &config).unwrap();
        assert_eq!(again.test.group_ids(), test_groups);
        assert_eq!(again.tensors, prepared.tensors);
    }
}

#[test]
fn three_groups_without_singleton_allowance_is_insufficient() {
    let mut config = three_group_config();
    config.split.allow_singleton_classes = false;
    let err = prepare(three_group_table(), &config).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::InsufficientGroups { ref class, groups: 1, .. } if class == "B"
    ));
}

#[test]
fn one_hot_width_survives_a_class_missing_from_test() {
    let config = three_group_config();
    let prepared = prepare(three_group_table(), &config).unwrap();
    // "B" only trains, yet test labels still carry its column.
    assert_eq!(prepared.tensors.labels_train.ncols(), 2);
    assert_eq!(prepared.tensors.labels_test.ncols(), 2);
    assert_eq!(prepared.tensors.features_test.shape()[1..], [2, 1]);
}

#[test]
fn sentinel_valued_measurement_is_a_cleaning_error() {
    let mut table = three_group_table();
    table.records[4].frequencies[1] = -9999.0;

    let err = prepare(table.clone(), &three_group_config()).unwrap_err();
    assert!(matches!(err, PipelineError::CleaningInvariant(_)));

    let mut lenient = three_group_config();
    lenient.data.collision_policy = CollisionPolicy::Drop;
    let prepared = prepare(table, &lenient).unwrap();
    assert_eq!(prepared.train.len() + prepared.test.len(), 12);
}

#[test]
fn evaluation_groups_by_group_id_not_row_position() {
    let mut records = Vec::new();
    for group in 1..=4 {
        let label = if group <= 2 { "Oak" } else { "Pine" };
        for row in 0..4 {
            records.push(RawRecord {
                file: format!("{group}_p{row}"),
                label: label.into(),
                frequencies: vec![row as f64],
            });
        }
    }
    let table = RawTable::new(vec!["frq1".into()], records).unwrap();
    let config = PipelineConfig::default();
    let (cleaned, vocabulary) = SamplePreprocessor::from_config(&config).process(table).unwrap();
    let splitter = GroupStratifiedSplitter::new(0.5, 3).unwrap();
    let (_, test) = splitter.split(&cleaned).unwrap();

    // One image per class in test, 4 pixels each: predict 3 of 4 right.
    let predicted: Vec<usize> = test
        .records
        .iter()
        .enumerate()
        .map(|(i, r)| if i % 4 == 0 { 1 - r.label_encoded } else { r.label_encoded })
        .collect();
    let report = hsi_classifier::evaluate(&test, &predicted, &vocabulary).unwrap();

    assert_eq!(report.image.predictions.len(), 2);
    assert_eq!(report.image.accuracy, 1.0);
    assert!((report.pixel.accuracy - 0.75).abs() < 1e-12);
    let groups: BTreeSet<i64> = report.image.predictions.iter().map(|p| p.group_id).collect();
    assert_eq!(groups, test.group_ids());
}

#[test]
fn prepared_directory_round_trips_to_an_evaluation() {
    let dir = tempfile::tempdir().unwrap();
    let raw_path = dir.path().join("samples.csv");
    let mut csv = String::from("File,Label,frq_1,frq_2\n");
    for group in 1..=6 {
        let label = match group % 3 {
            0 => "Birch (young)",
            1 => "Oak",
            _ => "Pine",
        };
        for row in 0..3 {
            let missing = if group == 1 && row == 0 { "" } else { "0.5" };
            csv.push_str(&format!("{group}_s{row}.hdr,{label},{missing},{row}\n"));
        }
        csv.push_str(&format!("{group}_x.hdr,Mixed or Not Classified,1,1\n"));
    }
    fs::write(&raw_path, csv).unwrap();

    let mut config = PipelineConfig::default();
    config.split.test_fraction = 0.5;
    let raw = load_file(&raw_path, &config.data).unwrap();
    assert_eq!(raw.len(), 24);
    let prepared = prepare(raw, &config).unwrap();
    assert_eq!(prepared.train.len() + prepared.test.len(), 17);

    let out = dir.path().join("prepared");
    export::write_prepared(&out, &prepared, &config).unwrap();

    let vocabulary = export::read_vocabulary(&out).unwrap();
    assert_eq!(vocabulary, prepared.vocabulary);
    let manifest = export::read_manifest(&out).unwrap();
    assert_eq!(manifest.num_classes, 3);
    assert_eq!(manifest.test.groups, 3);
    assert_eq!(manifest.config, config);

    let index = export::read_test_index(&out, &vocabulary).unwrap();
    assert_eq!(index.len(), prepared.test.len());

    let predictions_path = dir.path().join("pred.csv");
    let mut predictions = String::from("predicted\n");
    for row in &index {
        predictions.push_str(&format!("{}\n", row.label_encoded));
    }
    fs::write(&predictions_path, predictions).unwrap();
    export::check_manifest(&manifest, &vocabulary, &index).unwrap();
    let predicted = export::read_predictions(&predictions_path, vocabulary.num_classes()).unwrap();

    let records = PredictionRecord::align(
        index.iter().map(|row| (row.group_id, row.label_encoded)),
        &predicted,
    )
    .unwrap();
    let report = hsi_classifier::EvaluationReport::build(&records, &vocabulary).unwrap();
    assert_eq!(report.image.accuracy, 1.0);
    assert_eq!(report.pixel.f1, 1.0);
}
