//! Parsing of IP-echo responses (`{"origin": "<ip>[, <ip>...]"}`)

use serde::Deserialize;
use std::net::IpAddr;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Deserialize)]
struct EchoBody {
    origin: String,
}

/// Why an echo response could not be turned into an egress IP
#[derive(Debug, thiserror::Error)]
pub enum EchoError {
    #[error("response has no header/body separator")]
    MissingBody,

    #[error("unexpected HTTP status line: {0}")]
    BadStatus(String),

    #[error("invalid echo body: {0}")]
    InvalidBody(#[from] serde_json::Error),

    #[error("echoed origin is not an IP address: {0:?}")]
    InvalidOrigin(String),
}

/// Extract the egress IP from an echo JSON body.
///
/// Chained proxies produce a comma-separated origin; the first entry is the
/// address the echo endpoint attributes the request to.
pub fn parse_origin(body: &str) -> Result<String, EchoError> {
    let echo: EchoBody = serde_json::from_str(body.trim())?;
    let first = echo.origin.split(',').next().unwrap_or_default().trim();

    if first.parse::<IpAddr>().is_err() {
        return Err(EchoError::InvalidOrigin(first.to_string()));
    }

    Ok(first.to_string())
}

/// Split a raw HTTP/1.x response into its status code and body text
pub fn split_response(raw: &str) -> Result<(u16, &str), EchoError> {
    let (head, body) = raw.split_once("\r\n\r\n").ok_or(EchoError::MissingBody)?;
    let status_line = head.lines().next().unwrap_or_default();

    let status = status_line
        .split_whitespace()
        .nth(1)
        .filter(|_| status_line.starts_with("HTTP/"))
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| EchoError::BadStatus(status_line.to_string()))?;

    Ok((status, body))
}

/// Check whether a raw HTTP response buffer holds the complete message.
///
/// Without a `Content-Length` header the message is only complete at EOF.
pub fn is_complete(raw: &[u8]) -> bool {
    let Some(pos) = raw
        .windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
    else {
        return false;
    };

    let head = String::from_utf8_lossy(&raw[..pos]);
    let content_length = head.lines().skip(1).find_map(|line| {
        let (name, value) = line.split_once(':')?;
        name.trim()
            .eq_ignore_ascii_case("content-length")
            .then(|| value.trim().parse::<usize>().ok())
            .flatten()
    });

    match content_length {
        Some(len) => raw.len() - (pos + HEADER_TERMINATOR.len()) >= len,
        None => false,
    }
}
