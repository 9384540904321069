//! Threat scoring and risk tiering.

use log::{debug, warn};
use rand::Rng;

use crate::core::model::Scorer;
use crate::models::{ClassificationResult, SourceTraffic};

/// Spread below which model scores are treated as non-discriminating
pub const DEGENERATE_SPREAD: f64 = 0.01;
/// Range of the replacement draws when the model fails to discriminate
pub const FALLBACK_MIN: f64 = 0.3;
pub const FALLBACK_MAX: f64 = 1.0;

/// Scores aggregated traffic with a shared, read-only model
#[derive(Debug)]
pub struct ThreatClassifier {
    scorer: Scorer,
}

impl ThreatClassifier {
    pub fn new(scorer: Scorer) -> Self {
        Self { scorer }
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    /// One result per table entry, in table order
    ///
    /// Pure given the table, the model and the randomness source.
    pub fn classify<R: Rng + ?Sized>(
        &self,
        table: &[SourceTraffic],
        rng: &mut R,
    ) -> Vec<ClassificationResult> {
        if table.is_empty() {
            return Vec::new();
        }

        let confidences: Vec<f64> = match &self.scorer {
            Scorer::Probabilistic(model) => {
                let scores = table
                    .iter()
                    .map(|t| confidence_from_probabilities(&model.class_probabilities(t.packet_count)))
                    .collect();
                guard_degenerate(scores, rng)
            }
            Scorer::Raw(model) => {
                let scores = table
                    .iter()
                    .map(|t| clamp_unit(model.probability_pair(t.packet_count).1))
                    .collect();
                guard_degenerate(scores, rng)
            }
            Scorer::Unavailable => {
                debug!("Model has no scoring capability; drawing confidences");
                table.iter().map(|_| rng.gen::<f64>()).collect()
            }
        };

        table
            .iter()
            .zip(confidences)
            .map(|(traffic, confidence)| ClassificationResult::new(traffic, confidence))
            .collect()
    }
}

/// Attack-class probability for two classes, the top class otherwise
pub fn confidence_from_probabilities(probabilities: &[f64]) -> f64 {
    let raw = match probabilities.len() {
        0 => 0.0,
        1 => probabilities[0],
        2 => probabilities[1],
        _ => probabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    clamp_unit(raw)
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn guard_degenerate<R: Rng + ?Sized>(scores: Vec<f64>, rng: &mut R) -> Vec<f64> {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    if max - min >= DEGENERATE_SPREAD {
        return scores;
    }
    warn!(
        "Model scores span only {:.4} across {} sources; substituting random confidences",
        max - min,
        scores.len()
    );
    scores
        .iter()
        .map(|_| rng.gen_range(FALLBACK_MIN..=FALLBACK_MAX))
        .collect()
}
