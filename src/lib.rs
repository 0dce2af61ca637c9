//! Proxy Probe - live proxy verification
//!
//! Verifies HTTP, HTTPS, SOCKS4 and SOCKS5 proxies by sending traffic through
//! them to an IP-echo endpoint, timing the round trip and geolocating the
//! egress IP the proxy exposes.

pub mod logging;
pub mod proxy;
pub mod server;

pub use proxy::*;

use std::path::PathBuf;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Default port for the API server
pub const DEFAULT_PORT: u16 = 12001;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the API server binds to
    pub host: String,
    /// Port the API server listens on
    pub port: u16,
    /// Directory served for non-API paths
    pub static_dir: Option<PathBuf>,
    /// Proxy checker settings
    pub checker: CheckerConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            static_dir: None,
            checker: CheckerConfig::default(),
        }
    }
}

impl Config {
    /// Defaults, with the port taken from `PORT` when it holds a valid number
    pub fn from_env() -> Self {
        let port = std::env::var("PORT")
            .ok()
            .and_then(|p| p.trim().parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            port,
            ..Self::default()
        }
    }
}
