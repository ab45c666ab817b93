use log::info;
use serde::{Deserialize, Serialize};

use super::aggregate::{ImageAggregator, ImagePrediction, PredictionRecord};
use super::metrics::{ClassMetrics, ConfusionMatrix};
use crate::error::Result;
use crate::preprocessing::LabelVocabulary;

/// Pixel-granularity scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PixelMetrics {
    pub accuracy: f64,
    /// Support-weighted F1.
    pub f1: f64,
    pub macro_f1: f64,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: ConfusionMatrix,
}

/// Image-granularity scores after majority vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageMetrics {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
    pub predictions: Vec<ImagePrediction>,
}

/// Everything the reporting step needs, with class names in code order for
/// labelling matrix axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub class_names: Vec<String>,
    pub pixel: PixelMetrics,
    pub image: ImageMetrics,
}

impl EvaluationReport {
    /// Score pixel predictions, then aggregate them per image group.
    pub fn build(predictions: &[PredictionRecord], vocabulary: &LabelVocabulary) -> Result<Self> {
        let num_classes = vocabulary.num_classes();
        let pixel_confusion = ConfusionMatrix::from_pairs(
            num_classes,
            predictions.iter().map(|p| (p.true_label, p.predicted_label)),
        )?;
        let image = ImageAggregator::new(num_classes).aggregate(predictions)?;

        Ok(Self {
            class_names: vocabulary.classes().to_vec(),
            pixel: PixelMetrics {
                accuracy: pixel_confusion.accuracy(),
                f1: pixel_confusion.weighted_f1(),
                macro_f1: pixel_confusion.macro_f1(),
                per_class: pixel_confusion.class_metrics(vocabulary.classes()),
                confusion: pixel_confusion,
            },
            image: ImageMetrics {
                accuracy: image.accuracy,
                confusion: image.confusion,
                predictions: image.predictions,
            },
        })
    }

    /// Log the headline metrics.
    pub fn log_summary(&self) {
        info!("pixel_accuracy: {:.4}", self.pixel.accuracy);
        info!("pixel_f1: {:.4}", self.pixel.f1);
        info!("image_accuracy: {:.4}", self.image.accuracy);
        for m in &self.pixel.per_class {
            info!(
                "  {:<24} precision {:.3}  recall {:.3}  f1 {:.3}  support {}",
                m.class, m.precision, m.recall, m.f1, m.support
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_carries_both_granularities() {
        let vocab = LabelVocabulary::fit(["Birch", "Oak", "Pine"]);
        let records: Vec<PredictionRecord> = [(1, 0, 0), (1, 0, 0), (1, 0, 2), (2, 2, 2), (2, 2, 1)]
            .into_iter()
            .map(|(group_id, true_label, predicted_label)| PredictionRecord {
                group_id,
                true_label,
                predicted_label,
            })
            .collect();
        let report = EvaluationReport::build(&records, &vocab).unwrap();

        assert_eq!(report.class_names, vec!["Birch", "Oak", "Pine"]);
        assert!((report.pixel.accuracy - 0.6).abs() < 1e-12);
        assert_eq!(report.pixel.confusion.num_classes(), 3);
        assert_eq!(report.pixel.per_class[1].class, "Oak");
        assert_eq!(report.pixel.per_class[1].support, 0);
        // group 2 ties between Oak and Pine, Oak (lower code) wins
        assert_eq!(report.image.predictions[1].predicted_label, 1);
        assert_eq!(report.image.accuracy, 0.5);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["image"]["confusion"]["counts"][0][0], 1);
    }
}
