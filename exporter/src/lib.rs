//! Prometheus exporter for a host's installed packages and its open and
//! firewall-authorized network ports.

pub mod api;
pub mod collectors;
pub mod config;
pub mod error;
pub mod metrics;
pub mod parse;
