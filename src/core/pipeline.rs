//! One analysis run: capture → aggregation → classification → response.
//!
//! Stage-level failures (capture file missing or unreadable, model
//! unusable) abort the run. Once classification has produced results, an
//! alert-store failure is recorded in the summary and the response stage
//! still runs.

use std::fmt;
use std::path::Path;

use log::{error, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::core::aggregator::TrafficAggregator;
use crate::core::alerts::AlertStore;
use crate::core::capture::{CaptureError, CaptureLimits, CaptureReader, StopReason};
use crate::core::classifier::ThreatClassifier;
use crate::core::model::{load_model, ModelError, Scorer};
use crate::core::response::{ResponseEngine, ResponseReport};
use crate::models::{ClassificationResult, ClassifierConfig, RiskLevel};
use crate::utils::current_timestamp;

/// Errors that abort a run
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),
    #[error("Model error: {0}")]
    Model(#[from] ModelError),
}

/// Outcome of one analysis run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: String,
    pub frames: u64,
    pub stop_reason: Option<StopReason>,
    pub classified: usize,
    pub normal: usize,
    pub elevated: usize,
    pub high: usize,
    pub blocks_succeeded: usize,
    pub blocks_failed: usize,
    /// Alert-store write failure, if any
    pub alert_store_error: Option<String>,
    pub results: Vec<ClassificationResult>,
}

impl RunSummary {
    /// Sources flagged HIGH in this run
    pub fn flagged(&self) -> impl Iterator<Item = &ClassificationResult> {
        self.results.iter().filter(|r| r.risk_level == RiskLevel::High)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} ({})", self.run_id, self.started_at)?;
        write!(f, "  frames analysed: {}", self.frames)?;
        match self.stop_reason {
            Some(StopReason::PacketLimit) => writeln!(f, " (stopped at packet limit)")?,
            Some(StopReason::TimeLimit) => writeln!(f, " (stopped at time limit)")?,
            None => writeln!(f)?,
        }
        writeln!(
            f,
            "  sources classified: {} (NORMAL {}, ELEVATED {}, HIGH {})",
            self.classified, self.normal, self.elevated, self.high
        )?;
        for result in self.flagged() {
            writeln!(
                f,
                "    {} packets={} confidence={:.2}",
                result.source_address, result.packet_count, result.confidence
            )?;
        }
        write!(
            f,
            "  blocks: {} succeeded, {} failed",
            self.blocks_succeeded, self.blocks_failed
        )?;
        if let Some(e) = &self.alert_store_error {
            write!(f, "\n  alert store not updated: {}", e)?;
        }
        Ok(())
    }
}

/// Load the configured model, degrading to random scoring when allowed
pub fn build_classifier(config: &ClassifierConfig) -> Result<ThreatClassifier, ModelError> {
    match load_model(&config.model_path) {
        Ok(scorer) => Ok(ThreatClassifier::new(scorer)),
        Err(e) if config.allow_unscored => {
            warn!("Model unusable ({}); continuing with random scoring", e);
            Ok(ThreatClassifier::new(Scorer::Unavailable))
        }
        Err(e) => Err(e),
    }
}

/// Randomness source for a run; seeded when `seed` is given
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Runs the pipeline over capture files
pub struct Analyzer {
    limits: CaptureLimits,
    classifier: ThreatClassifier,
    alerts: AlertStore,
    rng: StdRng,
}

impl Analyzer {
    pub fn new(limits: CaptureLimits, classifier: ThreatClassifier, alerts: AlertStore, rng: StdRng) -> Self {
        Self {
            limits,
            classifier,
            alerts,
            rng,
        }
    }

    pub fn run(&mut self, capture: impl AsRef<Path>, engine: &mut ResponseEngine) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = current_timestamp();
        let capture = capture.as_ref();
        info!("Run {} analysing {}", run_id, capture.display());

        let mut reader = CaptureReader::open(capture, self.limits)?;
        let table = TrafficAggregator::aggregate(&mut reader)?;
        let frames = reader.stats().frames_yielded;
        let stop_reason = reader.stop_reason();
        drop(reader);

        let results = self.classifier.classify(&table, &mut self.rng);
        let count = |level: RiskLevel| results.iter().filter(|r| r.risk_level == level).count();
        let (normal, elevated, high) = (count(RiskLevel::Normal), count(RiskLevel::Elevated), count(RiskLevel::High));
        info!(
            "Classified {} sources: {} NORMAL, {} ELEVATED, {} HIGH",
            results.len(),
            normal,
            elevated,
            high
        );

        let alert_store_error = match self.alerts.record_run(&run_id, &started_at, &results) {
            Ok(_) => None,
            Err(e) => {
                error!("Failed to persist alerts for run {}: {}", run_id, e);
                Some(e.to_string())
            }
        };

        let report = if high > 0 {
            engine.apply_automated_response(&results)
        } else {
            ResponseReport::default()
        };

        Ok(RunSummary {
            run_id,
            started_at,
            frames,
            stop_reason,
            classified: results.len(),
            normal,
            elevated,
            high,
            blocks_succeeded: report.succeeded,
            blocks_failed: report.failed,
            alert_store_error,
            results,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourceTraffic;
    use std::net::IpAddr;

    fn result(addr: &str, confidence: f64) -> ClassificationResult {
        let traffic = SourceTraffic {
            source_address: addr.parse::<IpAddr>().unwrap(),
            packet_count: 10,
        };
        ClassificationResult::new(&traffic, confidence)
    }

    #[test]
    fn test_summary_display_lists_flagged_sources() {
        let summary = RunSummary {
            run_id: "run".to_string(),
            started_at: "2024-05-01 10:00:00".to_string(),
            frames: 103,
            stop_reason: Some(StopReason::PacketLimit),
            classified: 2,
            normal: 1,
            elevated: 0,
            high: 1,
            blocks_succeeded: 1,
            blocks_failed: 0,
            alert_store_error: None,
            results: vec![result("10.0.0.5", 0.9), result("10.0.0.9", 0.1)],
        };
        let text = summary.to_string();
        assert!(text.contains("stopped at packet limit"));
        assert!(text.contains("10.0.0.5"));
        assert!(!text.contains("10.0.0.9"));
        assert_eq!(summary.flagged().count(), 1);
    }

    #[test]
    fn test_missing_model_is_fatal_unless_allowed() {
        let mut config = ClassifierConfig {
            model_path: "does/not/exist.json".to_string(),
            allow_unscored: false,
            seed: None,
        };
        assert!(matches!(build_classifier(&config), Err(ModelError::NotFound(_))));

        config.allow_unscored = true;
        let classifier = build_classifier(&config).unwrap();
        assert!(matches!(classifier.scorer(), Scorer::Unavailable));
    }
}
