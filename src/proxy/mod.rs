//! Proxy module for verifying proxies
//!
//! This module provides functionality for:
//! - Verifying HTTP/HTTPS proxies with a forwarded GET to an IP-echo endpoint
//! - Verifying SOCKS4/SOCKS5 proxies with a raw tunnelled HTTP exchange
//! - Geolocating the egress IP a working proxy exposes
//! - Parsing proxies from IP:PORT and scheme://IP:PORT lines

pub mod checker;
pub mod echo;
pub mod error;
pub mod geo;
pub mod models;
pub mod parser;
pub mod socks;

pub use checker::{CheckerConfig, Probe, ProxyChecker};
pub use error::{FailureKind, ProbeError};
pub use geo::{GeoError, GeoRecord, GeoResolver};
pub use models::{ProxyTarget, ProxyType, UnsupportedProxyType, VerificationResult};
pub use parser::ProxyParser;
pub use socks::{SocksError, SocksVersion};
