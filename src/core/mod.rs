//! Core functionality for the DDoS guard.
//!
//! This module contains the analysis pipeline (capture ingestion, per-source
//! aggregation, threat classification) and the response side (firewall
//! drivers, block list, action journal and alert store).

pub mod aggregator;
pub mod alerts;
pub mod capture;
pub mod classifier;
pub mod firewall;
pub mod journal;
pub mod model;
pub mod pipeline;
pub mod response;
pub mod storage;

pub use aggregator::TrafficAggregator;
pub use alerts::AlertStore;
pub use capture::{CaptureError, CaptureLimits, CaptureReader, CapturedFrame, StopReason};
pub use classifier::ThreatClassifier;
pub use firewall::{driver_for, CommandFirewall, FirewallDriver, FirewallError, NoopFirewall};
pub use journal::ActionJournal;
pub use model::{load_model, ModelError, Scorer};
pub use pipeline::{build_classifier, Analyzer, PipelineError, RunSummary};
pub use response::{ActionOutcome, BlockList, ResponseEngine, ResponseError, ResponseMode};
pub use storage::{FileStorage, MemoryStorage, Storage, StorageError};
