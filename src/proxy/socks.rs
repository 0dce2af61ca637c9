//! SOCKS client handshakes over an already connected stream.
//!
//! SOCKS4 is used for IPv4 destinations and the SOCKS4a extension for
//! hostnames. SOCKS5 only offers the "no authentication" method.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const SOCKS4_VERSION: u8 = 0x04;
const SOCKS4_REPLY_VERSION: u8 = 0x00;
const SOCKS4_GRANTED: u8 = 0x5a;

const SOCKS5_VERSION: u8 = 0x05;
const SOCKS5_NO_AUTH: u8 = 0x00;
const SOCKS5_NO_ACCEPTABLE_METHODS: u8 = 0xff;
const SOCKS5_SUCCEEDED: u8 = 0x00;
const SOCKS5_ATYP_IPV4: u8 = 0x01;
const SOCKS5_ATYP_DOMAIN: u8 = 0x03;
const SOCKS5_ATYP_IPV6: u8 = 0x04;

const CMD_CONNECT: u8 = 0x01;

/// SOCKS protocol version spoken to the proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocksVersion {
    V4,
    V5,
}

impl SocksVersion {
    pub fn from_number(version: u8) -> Option<Self> {
        match version {
            4 => Some(SocksVersion::V4),
            5 => Some(SocksVersion::V5),
            _ => None,
        }
    }
}

impl fmt::Display for SocksVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksVersion::V4 => write!(f, "SOCKS4"),
            SocksVersion::V5 => write!(f, "SOCKS5"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SocksError {
    #[error("invalid reply version {0:#04x}")]
    InvalidVersion(u8),

    #[error("proxy requires authentication")]
    AuthRequired,

    #[error("proxy selected unsupported method {0:#04x}")]
    UnsupportedMethod(u8),

    #[error("request rejected or failed ({0:#04x})")]
    Rejected(u8),

    #[error("SOCKS4 cannot reach IPv6 destination {0}")]
    Ipv6NotSupported(IpAddr),

    #[error("destination hostname too long: {0} bytes")]
    HostnameTooLong(usize),

    #[error("invalid address type {0:#04x}")]
    InvalidAddressType(u8),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Ask the proxy on `stream` to open a tunnel to `host:port`
pub async fn connect<S>(
    stream: &mut S,
    version: SocksVersion,
    host: &str,
    port: u16,
) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match version {
        SocksVersion::V4 => connect_v4(stream, host, port).await,
        SocksVersion::V5 => connect_v5(stream, host, port).await,
    }
}

async fn connect_v4<S>(stream: &mut S, host: &str, port: u16) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut packet = vec![SOCKS4_VERSION, CMD_CONNECT];
    packet.extend_from_slice(&port.to_be_bytes());

    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            packet.extend_from_slice(&ip.octets());
            // empty user id
            packet.push(0);
        }
        Ok(ip @ IpAddr::V6(_)) => return Err(SocksError::Ipv6NotSupported(ip)),
        Err(_) => {
            // SOCKS4a: 0.0.0.x tells the proxy to resolve the trailing hostname
            packet.extend_from_slice(&Ipv4Addr::new(0, 0, 0, 1).octets());
            packet.push(0);
            packet.extend_from_slice(host.as_bytes());
            packet.push(0);
        }
    }

    stream.write_all(&packet).await?;
    stream.flush().await?;

    let mut reply = [0u8; 8];
    stream.read_exact(&mut reply).await?;

    if reply[0] != SOCKS4_REPLY_VERSION {
        return Err(SocksError::InvalidVersion(reply[0]));
    }
    if reply[1] != SOCKS4_GRANTED {
        return Err(SocksError::Rejected(reply[1]));
    }

    Ok(())
}

async fn connect_v5<S>(stream: &mut S, host: &str, port: u16) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS5_VERSION, 1, SOCKS5_NO_AUTH])
        .await?;
    stream.flush().await?;

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;

    if choice[0] != SOCKS5_VERSION {
        return Err(SocksError::InvalidVersion(choice[0]));
    }
    match choice[1] {
        SOCKS5_NO_AUTH => {}
        SOCKS5_NO_ACCEPTABLE_METHODS => return Err(SocksError::AuthRequired),
        other => return Err(SocksError::UnsupportedMethod(other)),
    }

    let mut packet = vec![SOCKS5_VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            packet.push(SOCKS5_ATYP_IPV4);
            packet.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            packet.push(SOCKS5_ATYP_IPV6);
            packet.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let len = u8::try_from(host.len())
                .map_err(|_| SocksError::HostnameTooLong(host.len()))?;
            packet.push(SOCKS5_ATYP_DOMAIN);
            packet.push(len);
            packet.extend_from_slice(host.as_bytes());
        }
    }
    packet.extend_from_slice(&port.to_be_bytes());

    stream.write_all(&packet).await?;
    stream.flush().await?;

    let mut header = [0u8; 4];
    stream.read_exact(&mut header).await?;

    if header[0] != SOCKS5_VERSION {
        return Err(SocksError::InvalidVersion(header[0]));
    }
    if header[1] != SOCKS5_SUCCEEDED {
        return Err(SocksError::Rejected(header[1]));
    }

    // drain the bound address so the tunnel starts clean
    let addr_len = match header[3] {
        SOCKS5_ATYP_IPV4 => 4,
        SOCKS5_ATYP_IPV6 => 16,
        SOCKS5_ATYP_DOMAIN => stream.read_u8().await? as usize,
        other => return Err(SocksError::InvalidAddressType(other)),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}
