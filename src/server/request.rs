//! Validation of `/api/check-proxy` payloads.
//!
//! Accepted shapes:
//! - `{"proxy": "ip:port", "type": "socks5"}`
//! - `{"proxy": {"ip": "...", "port": 8080, "type": "http"}}` where the nested
//!   `type` falls back to the top-level one, then to `http`.

use crate::proxy::{ProxyParser, ProxyTarget, ProxyType};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};

/// Client errors, all reported as HTTP 400 before any probe runs
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("No JSON data provided")]
    NoData,

    #[error("No proxy provided")]
    NoProxy,

    #[error("Invalid proxy format")]
    InvalidFormat,

    #[error("Missing ip or port in proxy object")]
    MissingIpOrPort,

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Unsupported proxy type")]
    UnsupportedType,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// JSON truthiness: null, false, 0, "" and empty containers count as missing
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn parse_port(value: &Value) -> Result<u16, RequestError> {
    let port = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f > 0.0).map(|f| f as u64))
            .and_then(|p| u16::try_from(p).ok())
            .filter(|p| *p != 0),
        Value::String(s) => ProxyParser::parse_port(s.trim()),
        _ => None,
    };

    port.ok_or(RequestError::InvalidPort)
}

fn parse_type<'a>(value: Option<&'a Value>, fallback: ProxyTypeName<'a>) -> ProxyTypeName<'a> {
    match value {
        None | Some(Value::Null) => fallback,
        Some(Value::String(s)) => ProxyTypeName::Name(s),
        Some(_) => ProxyTypeName::Invalid,
    }
}

#[derive(Debug, Clone, Copy)]
enum ProxyTypeName<'a> {
    Name(&'a str),
    Invalid,
}

impl ProxyTypeName<'_> {
    fn resolve(self) -> Result<ProxyType, RequestError> {
        match self {
            ProxyTypeName::Name(name) => name
                .parse::<ProxyType>()
                .map_err(|_| RequestError::UnsupportedType),
            ProxyTypeName::Invalid => Err(RequestError::UnsupportedType),
        }
    }
}

/// Turn a raw request body into a validated [`ProxyTarget`]
pub fn parse_check_request(body: &[u8]) -> Result<ProxyTarget, RequestError> {
    let data: Value = serde_json::from_slice(body).map_err(|_| RequestError::NoData)?;
    let payload = data
        .as_object()
        .filter(|o| !o.is_empty())
        .ok_or(RequestError::NoData)?;

    let top_level_type = parse_type(payload.get("type"), ProxyTypeName::Name("http"));

    let proxy = payload
        .get("proxy")
        .filter(|v| is_present(v))
        .ok_or(RequestError::NoProxy)?;

    let (host, port, type_name) = match proxy {
        Value::Object(fields) => {
            let ip = fields
                .get("ip")
                .filter(|v| is_present(v))
                .ok_or(RequestError::MissingIpOrPort)?;
            let port = fields
                .get("port")
                .filter(|v| is_present(v))
                .ok_or(RequestError::MissingIpOrPort)?;
            let host = match ip {
                Value::String(s) => s.trim().to_string(),
                other => other.to_string(),
            };
            if host.is_empty() {
                return Err(RequestError::MissingIpOrPort);
            }

            (host, parse_port(port)?, parse_type(fields.get("type"), top_level_type))
        }
        other => {
            let text = match other {
                Value::String(s) => s.clone(),
                v => v.to_string(),
            };
            let (host, port) = text.split_once(':').ok_or(RequestError::InvalidFormat)?;
            let host = host.trim();
            if host.is_empty() {
                return Err(RequestError::InvalidFormat);
            }
            let port = ProxyParser::parse_port(port.trim()).ok_or(RequestError::InvalidPort)?;

            (host.to_string(), port, top_level_type)
        }
    };

    Ok(ProxyTarget::new(host, port, type_name.resolve()?))
}
