use std::net::IpAddr;

use chrono::Local;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time in journal/alert format
pub fn current_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Deterministic firewall rule name for an address
pub fn block_rule_name(address: &IpAddr) -> String {
    format!("Block_{}", address)
}
