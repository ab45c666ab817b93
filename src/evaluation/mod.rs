//! Pixel- and image-level evaluation of per-pixel class predictions.

pub mod aggregate;
pub mod metrics;
pub mod report;

pub use aggregate::{
    majority_vote, ImageAggregate, ImageAggregator, ImagePrediction, PredictionRecord,
};
pub use metrics::{ClassMetrics, ConfusionMatrix};
pub use report::{EvaluationReport, ImageMetrics, PixelMetrics};
