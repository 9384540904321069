//! Firewall drivers.
//!
//! The response engine only ever asks for two things: add the block rule
//! for an address, or delete it. Rule names are derived from the address,
//! so adding a rule that already exists leaves the firewall unchanged.

use std::net::IpAddr;
use std::process::{Command, Output};

use log::debug;
use thiserror::Error;

use crate::models::FirewallBackend;
use crate::utils::block_rule_name;

/// Errors that can occur while driving the firewall
#[derive(Error, Debug)]
pub enum FirewallError {
    #[error("{command} exited with code {exit_code}: {message}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        message: String,
    },
    #[error("Failed to invoke {command}: {source}")]
    Invocation {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("No firewall backend configured")]
    Unavailable,
}

/// Narrow interface over the host firewall
#[cfg_attr(test, mockall::automock)]
pub trait FirewallDriver: Send + Sync {
    fn add_block_rule(&self, address: IpAddr) -> Result<(), FirewallError>;
    fn delete_block_rule(&self, address: IpAddr) -> Result<(), FirewallError>;
    fn name(&self) -> &'static str;
}

/// Build the driver for `backend`
pub fn driver_for(backend: FirewallBackend) -> Box<dyn FirewallDriver> {
    match backend {
        FirewallBackend::None => Box::new(NoopFirewall),
        other => Box::new(CommandFirewall::new(other)),
    }
}

/// Driver used when no real firewall may be touched
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopFirewall;

impl FirewallDriver for NoopFirewall {
    fn add_block_rule(&self, _address: IpAddr) -> Result<(), FirewallError> {
        Err(FirewallError::Unavailable)
    }

    fn delete_block_rule(&self, _address: IpAddr) -> Result<(), FirewallError> {
        Err(FirewallError::Unavailable)
    }

    fn name(&self) -> &'static str {
        "none"
    }
}

/// Driver shelling out to `netsh` or `iptables`
#[derive(Debug, Clone, Copy)]
pub struct CommandFirewall {
    backend: FirewallBackend,
}

impl CommandFirewall {
    pub fn new(backend: FirewallBackend) -> Self {
        Self { backend }
    }

    /// Program and arguments adding the block rule for `address`
    pub fn add_command(&self, address: IpAddr) -> (&'static str, Vec<String>) {
        let rule = block_rule_name(&address);
        match self.backend {
            FirewallBackend::Iptables => (iptables_program(address), iptables_args("-I", address, &rule)),
            _ => (
                "netsh",
                vec![
                    "advfirewall".to_string(),
                    "firewall".to_string(),
                    "add".to_string(),
                    "rule".to_string(),
                    format!("name={}", rule),
                    "dir=in".to_string(),
                    "action=block".to_string(),
                    format!("remoteip={}", address),
                ],
            ),
        }
    }

    /// Program and arguments deleting the block rule for `address`
    pub fn delete_command(&self, address: IpAddr) -> (&'static str, Vec<String>) {
        let rule = block_rule_name(&address);
        match self.backend {
            FirewallBackend::Iptables => (iptables_program(address), iptables_args("-D", address, &rule)),
            _ => (
                "netsh",
                vec![
                    "advfirewall".to_string(),
                    "firewall".to_string(),
                    "delete".to_string(),
                    "rule".to_string(),
                    format!("name={}", rule),
                ],
            ),
        }
    }

    fn iptables_rule_exists(&self, address: IpAddr) -> bool {
        let rule = block_rule_name(&address);
        Command::new(iptables_program(address))
            .args(iptables_args("-C", address, &rule))
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }
}

fn iptables_program(address: IpAddr) -> &'static str {
    match address {
        IpAddr::V4(_) => "iptables",
        IpAddr::V6(_) => "ip6tables",
    }
}

fn iptables_args(op: &str, address: IpAddr, rule: &str) -> Vec<String> {
    vec![
        op.to_string(),
        "INPUT".to_string(),
        "-s".to_string(),
        address.to_string(),
        "-j".to_string(),
        "DROP".to_string(),
        "-m".to_string(),
        "comment".to_string(),
        "--comment".to_string(),
        rule.to_string(),
    ]
}

fn run(program: &str, args: &[String]) -> Result<(), FirewallError> {
    debug!("Running {} {}", program, args.join(" "));
    let output: Output = Command::new(program)
        .args(args)
        .output()
        .map_err(|source| FirewallError::Invocation {
            command: program.to_string(),
            source,
        })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            String::from_utf8_lossy(&output.stdout).trim().to_string()
        } else {
            stderr
        };
        Err(FirewallError::CommandFailed {
            command: program.to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            message,
        })
    }
}

impl FirewallDriver for CommandFirewall {
    fn add_block_rule(&self, address: IpAddr) -> Result<(), FirewallError> {
        if self.backend == FirewallBackend::Iptables && self.iptables_rule_exists(address) {
            debug!("Rule {} already present", block_rule_name(&address));
            return Ok(());
        }
        let (program, args) = self.add_command(address);
        run(program, &args)
    }

    fn delete_block_rule(&self, address: IpAddr) -> Result<(), FirewallError> {
        let (program, args) = self.delete_command(address);
        run(program, &args)
    }

    fn name(&self) -> &'static str {
        self.backend.as_str()
    }
}
