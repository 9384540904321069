//! Automated and operator-triggered firewall response.
//!
//! Every `block`/`unblock` call appends exactly one journal entry,
//! whatever the outcome. The block list tolerates duplicates; the
//! firewall rule name is derived from the address, which makes repeated
//! blocks a no-op at the firewall layer.

use std::fmt;
use std::net::IpAddr;
use std::sync::Arc;

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::firewall::{driver_for, FirewallDriver, FirewallError};
use crate::core::journal::ActionJournal;
use crate::core::storage::{Storage, StorageError};
use crate::models::{Action, ClassificationResult, Config, RiskLevel};

/// Actor recorded for automated responses
pub const SYSTEM_ACTOR: &str = "system";

/// Errors that can occur while responding
#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StorageError),
}

/// Whether a call touches the real firewall
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    Simulate,
    Enforce,
}

impl ResponseMode {
    pub fn from_simulate(simulate: bool) -> Self {
        if simulate {
            ResponseMode::Simulate
        } else {
            ResponseMode::Enforce
        }
    }
}

impl fmt::Display for ResponseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseMode::Simulate => f.write_str("simulate"),
            ResponseMode::Enforce => f.write_str("enforce"),
        }
    }
}

/// Result of one block/unblock call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionOutcome {
    pub action: Action,
    pub address: IpAddr,
    pub message: String,
}

impl ActionOutcome {
    pub fn ok(&self) -> bool {
        self.action.is_success()
    }
}

/// Tally of an automated response pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResponseReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Newline-delimited list of blocked addresses
#[derive(Clone)]
pub struct BlockList {
    storage: Arc<dyn Storage>,
    key: String,
}

impl BlockList {
    pub fn new(storage: Arc<dyn Storage>, key: impl Into<String>) -> Self {
        Self { storage, key: key.into() }
    }

    pub fn entries(&self) -> Result<Vec<String>, StorageError> {
        let contents = self.storage.read(&self.key)?.unwrap_or_default();
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub fn contains(&self, address: IpAddr) -> Result<bool, StorageError> {
        let needle = address.to_string();
        Ok(self.entries()?.iter().any(|entry| *entry == needle))
    }

    /// Append unconditionally; duplicates are kept
    pub fn append(&self, address: IpAddr) -> Result<(), StorageError> {
        self.storage.append_line(&self.key, &address.to_string())
    }

    /// Rewrite without `address`, preserving the order of everything else
    ///
    /// An absent file is left absent.
    pub fn remove(&self, address: IpAddr) -> Result<(), StorageError> {
        if self.storage.read(&self.key)?.is_none() {
            return Ok(());
        }
        let needle = address.to_string();
        let kept: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|entry| *entry != needle)
            .collect();
        let mut contents = kept.join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        self.storage.rewrite(&self.key, &contents)
    }
}

/// Sole mutator of the block list and writer of the action journal
pub struct ResponseEngine {
    block_list: BlockList,
    journal: ActionJournal,
    firewall: Box<dyn FirewallDriver>,
    default_mode: ResponseMode,
}

impl ResponseEngine {
    pub fn new(
        block_list: BlockList,
        journal: ActionJournal,
        firewall: Box<dyn FirewallDriver>,
        default_mode: ResponseMode,
    ) -> Self {
        Self {
            block_list,
            journal,
            firewall,
            default_mode,
        }
    }

    /// Wire the engine to `storage` using the configured keys and backend
    pub fn from_config(config: &Config, storage: Arc<dyn Storage>) -> Self {
        Self::new(
            BlockList::new(storage.clone(), config.storage.block_list.as_str()),
            ActionJournal::new(storage, config.storage.action_log.as_str()),
            driver_for(config.response.firewall),
            ResponseMode::from_simulate(config.response.simulate),
        )
    }

    pub fn default_mode(&self) -> ResponseMode {
        self.default_mode
    }

    pub fn block_list(&self) -> &BlockList {
        &self.block_list
    }

    pub fn journal(&self) -> &ActionJournal {
        &self.journal
    }

    /// Block every HIGH-risk source in the process default mode
    ///
    /// A failure on one source never prevents attempts on the rest.
    pub fn apply_automated_response(&mut self, results: &[ClassificationResult]) -> ResponseReport {
        let mode = self.default_mode;
        let mut report = ResponseReport::default();

        for result in results.iter().filter(|r| r.risk_level == RiskLevel::High) {
            report.attempted += 1;
            info!(
                "Responding to {} (confidence {:.2}, {} packets)",
                result.source_address, result.confidence, result.packet_count
            );
            match self.block(result.source_address, mode, SYSTEM_ACTOR) {
                Ok(outcome) if outcome.ok() => report.succeeded += 1,
                Ok(_) => report.failed += 1,
                Err(e) => {
                    error!("Response for {} not persisted: {}", result.source_address, e);
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Add `address` to the block list and, in enforce mode, the firewall
    pub fn block(&mut self, address: IpAddr, mode: ResponseMode, actor: &str) -> Result<ActionOutcome, ResponseError> {
        if let Err(e) = self.block_list.append(address) {
            self.journal_failure(actor, Action::BlockError, address);
            return Err(e.into());
        }

        let (action, message) = match mode {
            ResponseMode::Simulate => (Action::SimulatedBlock, "Simulated block (no system change)".to_string()),
            ResponseMode::Enforce => match self.firewall.add_block_rule(address) {
                Ok(()) => (Action::Block, format!("Blocked via {}", self.firewall.name())),
                Err(e) => (failure_action(&e, Action::BlockFailed, Action::BlockError), e.to_string()),
            },
        };

        self.finish(actor, action, address, message)
    }

    /// Remove `address` from the block list and, in enforce mode, the firewall
    pub fn unblock(&mut self, address: IpAddr, mode: ResponseMode, actor: &str) -> Result<ActionOutcome, ResponseError> {
        if let Err(e) = self.block_list.remove(address) {
            self.journal_failure(actor, Action::UnblockError, address);
            return Err(e.into());
        }

        let (action, message) = match mode {
            ResponseMode::Simulate => (Action::SimulatedUnblock, "Simulated unblock (no system change)".to_string()),
            ResponseMode::Enforce => match self.firewall.delete_block_rule(address) {
                Ok(()) => (Action::Unblock, format!("Unblocked via {}", self.firewall.name())),
                Err(e) => (failure_action(&e, Action::UnblockFailed, Action::UnblockError), e.to_string()),
            },
        };

        self.finish(actor, action, address, message)
    }

    fn finish(&self, actor: &str, action: Action, address: IpAddr, message: String) -> Result<ActionOutcome, ResponseError> {
        self.journal.record(actor, action, address)?;
        match action {
            Action::Block => warn!("{} blocked {}", actor, address),
            Action::Unblock | Action::SimulatedBlock | Action::SimulatedUnblock => {
                info!("{} {} {}", actor, action, address)
            }
            _ => error!("{} {} {}: {}", actor, action, address, message),
        }
        Ok(ActionOutcome { action, address, message })
    }

    fn journal_failure(&self, actor: &str, action: Action, address: IpAddr) {
        if let Err(e) = self.journal.record(actor, action, address) {
            error!("Could not journal {} for {}: {}", action, address, e);
        }
    }
}

fn failure_action(error: &FirewallError, failed: Action, errored: Action) -> Action {
    match error {
        FirewallError::CommandFailed { .. } => failed,
        FirewallError::Invocation { .. } | FirewallError::Unavailable => errored,
    }
}
