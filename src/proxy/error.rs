//! Typed reasons for a failed proxy probe

use crate::proxy::echo::EchoError;
use crate::proxy::socks::SocksError;
use std::time::Duration;

/// Broad failure class of a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// DNS, refused or timed out connections, SOCKS handshake rejection
    Transport,
    /// The proxy answered, but not with a usable echo response
    Protocol,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("timed out after {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("connect failed: {0}")]
    Connect(#[source] std::io::Error),

    #[error("tunnel I/O failed: {0}")]
    Tunnel(#[source] std::io::Error),

    #[error("SOCKS handshake failed: {0}")]
    Socks(#[from] SocksError),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("echo endpoint returned HTTP {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Echo(#[from] EchoError),
}

impl ProbeError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ProbeError::Timeout(_)
            | ProbeError::Connect(_)
            | ProbeError::Tunnel(_)
            | ProbeError::Socks(_) => FailureKind::Transport,
            ProbeError::Http(e) if e.is_timeout() || e.is_connect() => FailureKind::Transport,
            ProbeError::Http(e) if e.is_decode() || e.is_body() => FailureKind::Protocol,
            ProbeError::Http(_) => FailureKind::Transport,
            ProbeError::Status(_) | ProbeError::MalformedResponse(_) | ProbeError::Echo(_) => {
                FailureKind::Protocol
            }
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            ProbeError::Timeout(_) => true,
            ProbeError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}
