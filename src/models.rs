use std::fmt;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Capture limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Maximum number of network-layer frames yielded per run
    pub max_packets: u64,
    /// Wall-clock budget for reading the capture (seconds)
    pub max_duration_secs: u64,
    /// Log a progress line every N yielded frames
    pub progress_every: u64,
}

/// Classifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Trained model document
    pub model_path: String,
    /// Fall back to random scoring when the model cannot be loaded
    pub allow_unscored: bool,
    /// Seed for the randomness source, unseeded when absent
    pub seed: Option<u64>,
}

/// Firewall command family
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FirewallBackend {
    Netsh,
    Iptables,
    None,
}

/// Response configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseConfig {
    /// Process-wide default: journal actions without touching the firewall
    pub simulate: bool,
    /// Actor recorded for operator-triggered actions
    pub operator: String,
    /// Firewall command family used in real mode
    pub firewall: FirewallBackend,
}

/// Flat-file locations, relative to `data_dir`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
    pub block_list: String,
    pub action_log: String,
    pub alert_log: String,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
}

/// Application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub capture: CaptureConfig,
    pub classifier: ClassifierConfig,
    pub response: ResponseConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
}

impl FirewallBackend {
    pub fn platform_default() -> Self {
        if cfg!(windows) {
            FirewallBackend::Netsh
        } else {
            FirewallBackend::Iptables
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FirewallBackend::Netsh => "netsh",
            FirewallBackend::Iptables => "iptables",
            FirewallBackend::None => "none",
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                max_packets: 200_000,
                max_duration_secs: 20,
                progress_every: 50_000,
            },
            classifier: ClassifierConfig {
                model_path: "model/attack_detector.json".to_string(),
                allow_unscored: false,
                seed: None,
            },
            response: ResponseConfig {
                simulate: true,
                operator: "admin".to_string(),
                firewall: FirewallBackend::platform_default(),
            },
            storage: StorageConfig {
                data_dir: ".".to_string(),
                block_list: "blocked_ip.txt".to_string(),
                action_log: "data/actions.log".to_string(),
                alert_log: "data/alert_log.csv".to_string(),
            },
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 5000,
            },
        }
    }
}

/// Frame count for one source address within a single capture pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTraffic {
    pub source_address: IpAddr,
    pub packet_count: u64,
}

/// Risk tier derived from a confidence score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Normal = 0,
    Elevated = 1,
    High = 2,
}

impl RiskLevel {
    pub const ELEVATED_THRESHOLD: f64 = 0.4;
    pub const HIGH_THRESHOLD: f64 = 0.7;

    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::HIGH_THRESHOLD {
            RiskLevel::High
        } else if confidence >= Self::ELEVATED_THRESHOLD {
            RiskLevel::Elevated
        } else {
            RiskLevel::Normal
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::Normal => "NORMAL",
            RiskLevel::Elevated => "ELEVATED",
            RiskLevel::High => "HIGH",
        };
        f.write_str(name)
    }
}

/// Scored source; one per `SourceTraffic` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub source_address: IpAddr,
    pub packet_count: u64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

impl ClassificationResult {
    pub fn new(traffic: &SourceTraffic, confidence: f64) -> Self {
        Self {
            source_address: traffic.source_address,
            packet_count: traffic.packet_count,
            confidence,
            risk_level: RiskLevel::from_confidence(confidence),
        }
    }
}

/// Persisted HIGH-risk classification, one CSV row in the alert store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: String,
    pub run_id: String,
    #[serde(rename = "src_ip")]
    pub source_address: IpAddr,
    pub packet_count: u64,
    pub confidence: f64,
    pub risk_level: RiskLevel,
}

/// Outcome recorded for each block/unblock attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Block,
    Unblock,
    SimulatedBlock,
    SimulatedUnblock,
    BlockFailed,
    UnblockFailed,
    BlockError,
    UnblockError,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::Block,
        Action::Unblock,
        Action::SimulatedBlock,
        Action::SimulatedUnblock,
        Action::BlockFailed,
        Action::UnblockFailed,
        Action::BlockError,
        Action::UnblockError,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Block => "BLOCK",
            Action::Unblock => "UNBLOCK",
            Action::SimulatedBlock => "SIMULATED_BLOCK",
            Action::SimulatedUnblock => "SIMULATED_UNBLOCK",
            Action::BlockFailed => "BLOCK_FAILED",
            Action::UnblockFailed => "UNBLOCK_FAILED",
            Action::BlockError => "BLOCK_ERROR",
            Action::UnblockError => "UNBLOCK_ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == s)
    }

    /// Whether the requested effect took place (simulated actions count)
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Action::Block | Action::Unblock | Action::SimulatedBlock | Action::SimulatedUnblock
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One line of the action journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    pub timestamp: String,
    pub actor: String,
    pub action: Action,
    pub source_address: String,
}
