//! Command-line interface.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::core::ResponseMode;
use crate::models::Config;

/// Errors from CLI argument validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CliError {
    #[error("max-packets must be at least 1, got {0}")]
    InvalidMaxPackets(u64),
    #[error("max-duration must be at least 1 second, got {0}")]
    InvalidMaxDuration(u64),
}

/// Detect volumetric senders in a capture file and block them.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "ddos-guard")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to $CONFIG_FILE or config/default.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Analyse a capture file and respond to HIGH-risk sources.
    Analyze(AnalyzeArgs),
    /// Block an address.
    Block(IpArgs),
    /// Unblock an address.
    Unblock(IpArgs),
    /// Print the block list.
    Blocked,
    /// Print the alert store.
    Alerts,
    /// Serve the operator API.
    Serve,
}

/// Arguments for the analyze command.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeArgs {
    /// Capture file (pcap or pcapng).
    pub capture: PathBuf,

    /// Stop after this many network-layer frames.
    #[arg(long)]
    pub max_packets: Option<u64>,

    /// Stop after this many seconds of reading.
    #[arg(long)]
    pub max_duration: Option<u64>,

    /// Journal responses without touching the firewall.
    #[arg(long, conflicts_with = "enforce")]
    pub simulate: bool,

    /// Apply responses to the firewall.
    #[arg(long)]
    pub enforce: bool,

    /// Seed for reproducible random scoring.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl AnalyzeArgs {
    pub fn validate(&self) -> Result<(), CliError> {
        if let Some(0) = self.max_packets {
            return Err(CliError::InvalidMaxPackets(0));
        }
        if let Some(0) = self.max_duration {
            return Err(CliError::InvalidMaxDuration(0));
        }
        Ok(())
    }

    /// Layer the per-run flags over the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(max_packets) = self.max_packets {
            config.capture.max_packets = max_packets;
        }
        if let Some(max_duration) = self.max_duration {
            config.capture.max_duration_secs = max_duration;
        }
        if self.simulate {
            config.response.simulate = true;
        }
        if self.enforce {
            config.response.simulate = false;
        }
        if self.seed.is_some() {
            config.classifier.seed = self.seed;
        }
    }
}

/// Arguments for the block and unblock commands.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct IpArgs {
    /// Target address.
    pub ip: IpAddr,

    /// Journal the action without touching the firewall.
    #[arg(long, conflicts_with = "enforce")]
    pub simulate: bool,

    /// Apply to the firewall.
    #[arg(long)]
    pub enforce: bool,
}

impl IpArgs {
    /// Mode for this action; `default` applies when neither flag is given
    pub fn mode(&self, default: ResponseMode) -> ResponseMode {
        if self.enforce {
            ResponseMode::Enforce
        } else if self.simulate {
            ResponseMode::Simulate
        } else {
            default
        }
    }
}
