//! Shared fixtures: in-process SOCKS proxies and a geolocation mock

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use proxy_probe::CheckerConfig;

/// How the mock SOCKS proxy answers the CONNECT request
#[derive(Debug, Clone)]
pub enum SocksBehavior {
    /// Grant the tunnel and answer the HTTP request with this echo body
    Echo(String),
    /// Grant the tunnel and answer with this raw payload
    Raw(String),
    /// Reject the CONNECT request
    Reject,
}

/// What the mock SOCKS proxy saw on one connection
#[derive(Debug, Clone)]
pub struct SocksSession {
    pub version: u8,
    pub http_request: Vec<u8>,
}

/// Spawn a SOCKS4/4a/5 proxy on localhost; every session is reported on the channel
pub async fn spawn_socks_proxy(
    behavior: SocksBehavior,
) -> (SocketAddr, mpsc::UnboundedReceiver<SocksSession>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let behavior = behavior.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(Some(session)) = handle_socks(socket, behavior).await {
                    let _ = tx.send(session);
                }
            });
        }
    });

    (addr, rx)
}

async fn read_until_nul(socket: &mut TcpStream) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        match socket.read_u8().await? {
            0 => return Ok(out),
            b => out.push(b),
        }
    }
}

async fn handle_socks(
    mut socket: TcpStream,
    behavior: SocksBehavior,
) -> std::io::Result<Option<SocksSession>> {
    let version = socket.read_u8().await?;
    let granted = !matches!(behavior, SocksBehavior::Reject);

    match version {
        5 => {
            let n_methods = socket.read_u8().await? as usize;
            let mut methods = vec![0u8; n_methods];
            socket.read_exact(&mut methods).await?;
            socket.write_all(&[5, 0]).await?;

            let mut head = [0u8; 4];
            socket.read_exact(&mut head).await?;
            let addr_len = match head[3] {
                1 => 4,
                4 => 16,
                3 => socket.read_u8().await? as usize,
                _ => return Ok(None),
            };
            let mut rest = vec![0u8; addr_len + 2];
            socket.read_exact(&mut rest).await?;

            let code = if granted { 0x00 } else { 0x02 };
            socket
                .write_all(&[5, code, 0, 1, 127, 0, 0, 1, 0, 80])
                .await?;
        }
        4 => {
            let mut head = [0u8; 7];
            socket.read_exact(&mut head).await?;
            read_until_nul(&mut socket).await?;
            if head[3..6] == [0, 0, 0] && head[6] != 0 {
                read_until_nul(&mut socket).await?;
            }

            let code = if granted { 0x5a } else { 0x5b };
            socket.write_all(&[0, code, 0, 0, 0, 0, 0, 0]).await?;
        }
        _ => return Ok(None),
    }

    if !granted {
        return Ok(Some(SocksSession {
            version,
            http_request: Vec::new(),
        }));
    }

    let mut http_request = Vec::new();
    while !http_request.ends_with(b"\r\n\r\n") {
        http_request.push(socket.read_u8().await?);
    }

    let payload = match behavior {
        SocksBehavior::Echo(body) => format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        ),
        SocksBehavior::Raw(raw) => raw,
        SocksBehavior::Reject => unreachable!(),
    };
    socket.write_all(payload.as_bytes()).await?;
    socket.shutdown().await?;

    Ok(Some(SocksSession {
        version,
        http_request,
    }))
}

/// Echo body as returned by httpbin
pub fn echo_body(origin: &str) -> String {
    format!("{{\n  \"origin\": \"{}\"\n}}\n", origin)
}

/// Geolocation mock answering `/json/<ip>` with `body`
pub async fn geo_server(ip: &str, body: serde_json::Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/json/{}", ip)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Checker config pointing geolocation at `geo` with a short timeout
pub fn checker_config(geo: &MockServer) -> CheckerConfig {
    CheckerConfig::new()
        .with_timeout(Duration::from_secs(3))
        .with_geo_api_url(format!("{}/json", geo.uri()))
}

/// A localhost port with nothing listening on it
pub fn refused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
