//! Capture-driven DDoS source detection with an audited firewall response.

pub mod api;
pub mod cli;
pub mod config;
pub mod core;
pub mod models;
pub mod utils;
