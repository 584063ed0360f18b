#![allow(clippy::redundant_pub_crate)]

//! Fallback values and environment variable names.
//!
//! # Design
//! - Keep every default in one place so the model, loader and docs agree.

use std::net::{IpAddr, Ipv4Addr};

/// Environment variable naming the configuration file.
pub(crate) const CONFIG_PATH_ENV: &str = "NEXUS_CONFIG";
/// Configuration file used when `NEXUS_CONFIG` is unset.
pub(crate) const CONFIG_PATH: &str = "config/down-nexus.json";
/// Override for `server.bind_addr`.
pub(crate) const BIND_ADDR_ENV: &str = "NEXUS_BIND_ADDR";
/// Override for `server.port`.
pub(crate) const PORT_ENV: &str = "NEXUS_PORT";
/// Override for `logging.level`.
pub(crate) const LOG_LEVEL_ENV: &str = "NEXUS_LOG_LEVEL";
/// Override for `logging.format`.
pub(crate) const LOG_FORMAT_ENV: &str = "NEXUS_LOG_FORMAT";

/// Loopback-only listener by default.
pub(crate) const BIND_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
/// Default HTTP port.
pub(crate) const PORT: u16 = 8081;
/// Default log filter.
pub(crate) const LOG_LEVEL: &str = "info";

pub(crate) const fn enabled() -> bool {
    true
}
