//! Proxy parser module for reading proxy targets from strings and files

use crate::proxy::models::{ProxyTarget, ProxyType};
use crate::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::Path;

static URL_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)(https?|socks[45])://([^:/\s]+):(\d{1,5})/?$").expect("Invalid proxy URL regex")
});

/// Proxy parser for parsing proxy targets from strings and files
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single proxy line
    ///
    /// Supports formats:
    /// - IP:PORT
    /// - scheme://IP:PORT (the scheme overrides `default_type`)
    pub fn parse_line(line: &str, default_type: ProxyType) -> Option<ProxyTarget> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        Self::parse_url_format(line).or_else(|| Self::parse_colon_format(line, default_type))
    }

    fn parse_url_format(line: &str) -> Option<ProxyTarget> {
        let caps = URL_FORMAT.captures(line)?;

        let proxy_type = caps[1].parse::<ProxyType>().ok()?;
        let port = Self::parse_port(&caps[3])?;

        Some(ProxyTarget::new(&caps[2], port, proxy_type))
    }

    fn parse_colon_format(line: &str, default_type: ProxyType) -> Option<ProxyTarget> {
        let (host, port) = line.split_once(':')?;
        let host = host.trim();
        if host.is_empty() {
            return None;
        }

        let port = Self::parse_port(port.trim())?;
        Some(ProxyTarget::new(host, port, default_type))
    }

    /// Parse a port, rejecting 0
    pub fn parse_port(s: &str) -> Option<u16> {
        s.parse::<u16>().ok().filter(|port| *port != 0)
    }

    /// Parse proxies from a string (multiple lines)
    pub fn parse_string(content: &str, default_type: ProxyType) -> Vec<ProxyTarget> {
        content
            .lines()
            .filter_map(|line| Self::parse_line(line, default_type))
            .collect()
    }

    /// Parse proxies from a file
    pub fn parse_file<P: AsRef<Path>>(path: P, default_type: ProxyType) -> Result<Vec<ProxyTarget>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse_string(&content, default_type))
    }
}
