//! Proxy data models

use crate::proxy::geo::{GeoRecord, UNKNOWN};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Proxy protocol enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProxyType {
    #[default]
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyType {
    /// SOCKS handshake version for SOCKS protocols, `None` for HTTP-style proxies
    pub fn socks_version(&self) -> Option<u8> {
        match self {
            ProxyType::Http | ProxyType::Https => None,
            ProxyType::Socks4 => Some(4),
            ProxyType::Socks5 => Some(5),
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyType::Http => write!(f, "http"),
            ProxyType::Https => write!(f, "https"),
            ProxyType::Socks4 => write!(f, "socks4"),
            ProxyType::Socks5 => write!(f, "socks5"),
        }
    }
}

/// Error returned when a protocol name is not one of the four supported values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid proxy type: {0}. Use: http, https, socks4, socks5")]
pub struct UnsupportedProxyType(pub String);

impl FromStr for ProxyType {
    type Err = UnsupportedProxyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(ProxyType::Http),
            "https" => Ok(ProxyType::Https),
            "socks4" => Ok(ProxyType::Socks4),
            "socks5" => Ok(ProxyType::Socks5),
            _ => Err(UnsupportedProxyType(s.to_string())),
        }
    }
}

/// A proxy endpoint to verify
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProxyTarget {
    pub host: String,
    pub port: u16,
    pub protocol: ProxyType,
}

impl ProxyTarget {
    pub fn new(host: impl Into<String>, port: u16, protocol: ProxyType) -> Self {
        Self {
            host: host.into(),
            port,
            protocol,
        }
    }

    /// Forward-proxy URL for reqwest. HTTPS proxies are reached over plain
    /// HTTP too, TLS only runs inside the CONNECT tunnel.
    pub fn forward_proxy_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Get the proxy string in IP:PORT format
    pub fn to_simple_string(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Outcome of a single proxy verification.
///
/// Verification is binary: a failed check carries no latency, egress IP or
/// geolocation, and its `country` is the `"Unknown"` sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub working: bool,
    pub response_time_millis: u64,
    pub egress_ip: Option<String>,
    pub country: String,
    pub geo: Option<GeoRecord>,
}

impl VerificationResult {
    pub fn working(response_time_millis: u64, egress_ip: String, geo: GeoRecord) -> Self {
        Self {
            working: true,
            response_time_millis: response_time_millis.max(1),
            egress_ip: Some(egress_ip),
            country: geo.country.clone(),
            geo: Some(geo),
        }
    }

    /// The canonical "not working" record
    pub fn not_working() -> Self {
        Self {
            working: false,
            response_time_millis: 0,
            egress_ip: None,
            country: UNKNOWN.to_string(),
            geo: None,
        }
    }

    pub fn is_working(&self) -> bool {
        self.working
    }
}
