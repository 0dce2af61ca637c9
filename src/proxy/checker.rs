//! Proxy checker module for verifying proxies end to end

use crate::proxy::echo;
use crate::proxy::error::ProbeError;
use crate::proxy::geo::{GeoResolver, DEFAULT_GEO_API_URL};
use crate::proxy::models::{ProxyTarget, VerificationResult};
use crate::proxy::socks::{self, SocksVersion};
use crate::Result;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Proxy as ReqwestProxy};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Default timeout for every network operation in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default URL to test HTTP-style proxies against
const DEFAULT_TEST_URL: &str = "http://httpbin.org/ip";

/// Destination reached through SOCKS proxies
const DEFAULT_SOCKS_TARGET_HOST: &str = "httpbin.org";
const DEFAULT_SOCKS_TARGET_PORT: u16 = 80;
const DEFAULT_SOCKS_TARGET_PATH: &str = "/ip";

/// Default number of proxies checked at the same time by `verify_all`
const DEFAULT_CONCURRENCY: usize = 50;

/// Upper bound on bytes read back through a SOCKS tunnel
const MAX_RESPONSE_BYTES: usize = 4096;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each network operation
    pub timeout: Duration,
    /// IP-echo URL fetched through HTTP/HTTPS proxies
    pub test_url: String,
    /// IP-echo host reached through SOCKS proxies
    pub socks_target_host: String,
    pub socks_target_port: u16,
    pub socks_target_path: String,
    /// Geolocation endpoint, the egress IP is appended as a path segment
    pub geo_api_url: String,
    /// Maximum number of concurrent checks in `verify_all`
    pub concurrency: usize,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            test_url: DEFAULT_TEST_URL.to_string(),
            socks_target_host: DEFAULT_SOCKS_TARGET_HOST.to_string(),
            socks_target_port: DEFAULT_SOCKS_TARGET_PORT,
            socks_target_path: DEFAULT_SOCKS_TARGET_PATH.to_string(),
            geo_api_url: DEFAULT_GEO_API_URL.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_test_url(mut self, url: String) -> Self {
        self.test_url = url;
        self
    }

    pub fn with_socks_target(mut self, host: String, port: u16, path: String) -> Self {
        self.socks_target_host = host;
        self.socks_target_port = port;
        self.socks_target_path = path;
        self
    }

    pub fn with_geo_api_url(mut self, url: String) -> Self {
        self.geo_api_url = url;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }
}

/// A successful round trip through a proxy, before geolocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe {
    pub egress_ip: String,
    pub elapsed: Duration,
}

impl Probe {
    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed.as_millis() as u64
    }
}

/// Proxy checker for validating proxies.
///
/// Stateless between calls; one instance can be shared by concurrent checks.
#[derive(Debug, Clone)]
pub struct ProxyChecker {
    config: CheckerConfig,
    geo: GeoResolver,
}

impl ProxyChecker {
    /// Create a new proxy checker with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    /// Create a new proxy checker with custom configuration
    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let geo = GeoResolver::with_api_url(&config.geo_api_url, config.timeout)?;
        Ok(Self { config, geo })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    pub fn geo(&self) -> &GeoResolver {
        &self.geo
    }

    /// Verify a proxy and geolocate its egress IP. Never fails; any error
    /// yields [`VerificationResult::not_working`].
    pub async fn verify(&self, target: &ProxyTarget) -> VerificationResult {
        match self.probe(target).await {
            Ok(probe) => {
                debug!(
                    proxy = %target,
                    egress_ip = %probe.egress_ip,
                    elapsed_ms = probe.elapsed_millis(),
                    "proxy is working"
                );
                let geo = self.geo.resolve(&probe.egress_ip).await;
                VerificationResult::working(probe.elapsed_millis(), probe.egress_ip, geo)
            }
            Err(e) => {
                match target.protocol.socks_version() {
                    Some(version) => warn!(
                        proxy = %target.to_simple_string(),
                        socks_version = version,
                        kind = ?e.kind(),
                        error = %e,
                        "SOCKS proxy test failed"
                    ),
                    None => warn!(
                        proxy = %target.to_simple_string(),
                        kind = ?e.kind(),
                        error = %e,
                        "HTTP proxy test failed"
                    ),
                }
                VerificationResult::not_working()
            }
        }
    }

    /// Verify several proxies, at most `concurrency` at a time, results in input order
    pub async fn verify_all(&self, targets: &[ProxyTarget]) -> Vec<VerificationResult> {
        stream::iter(targets)
            .map(|target| self.verify(target))
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    /// Round-trip through the proxy and report the echoed egress IP
    pub async fn probe(&self, target: &ProxyTarget) -> std::result::Result<Probe, ProbeError> {
        match target
            .protocol
            .socks_version()
            .and_then(SocksVersion::from_number)
        {
            Some(version) => self.probe_socks(target, version).await,
            None => self.probe_http(target).await,
        }
    }

    async fn probe_http(&self, target: &ProxyTarget) -> std::result::Result<Probe, ProbeError> {
        let client = self.create_client(target)?;

        let start = Instant::now();
        let response = client.get(&self.config.test_url).send().await?;
        let elapsed = start.elapsed();

        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let egress_ip = echo::parse_origin(&body)?;

        Ok(Probe { egress_ip, elapsed })
    }

    async fn probe_socks(
        &self,
        target: &ProxyTarget,
        version: SocksVersion,
    ) -> std::result::Result<Probe, ProbeError> {
        let start = Instant::now();
        let raw = tokio::time::timeout(self.config.timeout, self.socks_exchange(target, version))
            .await
            .map_err(|_| ProbeError::Timeout(self.config.timeout))??;
        let elapsed = start.elapsed();

        if raw.is_empty() {
            return Err(ProbeError::MalformedResponse(
                "tunnel closed without a response".to_string(),
            ));
        }

        let text = String::from_utf8_lossy(&raw);
        let (status, body) = echo::split_response(&text)?;
        if !(200..300).contains(&status) {
            return Err(ProbeError::Status(status));
        }
        let egress_ip = echo::parse_origin(body)?;

        Ok(Probe { egress_ip, elapsed })
    }

    /// Tunnel a bare HTTP/1.1 GET through the SOCKS proxy and return the raw
    /// response bytes. The stream is owned here and dropped on every path.
    async fn socks_exchange(
        &self,
        target: &ProxyTarget,
        version: SocksVersion,
    ) -> std::result::Result<Vec<u8>, ProbeError> {
        let mut stream = TcpStream::connect((target.host.as_str(), target.port))
            .await
            .map_err(ProbeError::Connect)?;

        let host = &self.config.socks_target_host;
        let port = self.config.socks_target_port;
        socks::connect(&mut stream, version, host, port).await?;
        debug!(proxy = %target, %version, "SOCKS tunnel established");

        stream
            .write_all(self.echo_request().as_bytes())
            .await
            .map_err(ProbeError::Tunnel)?;

        let raw = read_bounded(&mut stream, MAX_RESPONSE_BYTES)
            .await
            .map_err(ProbeError::Tunnel)?;

        // best effort, the socket is closed on drop either way
        let _ = stream.shutdown().await;

        Ok(raw)
    }

    fn echo_request(&self) -> String {
        let host = match self.config.socks_target_port {
            80 => self.config.socks_target_host.clone(),
            port => format!("{}:{}", self.config.socks_target_host, port),
        };
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\n\r\n",
            self.config.socks_target_path, host
        )
    }

    /// Create a reqwest client routing both plain and TLS traffic through the proxy
    fn create_client(&self, target: &ProxyTarget) -> std::result::Result<Client, ProbeError> {
        let proxy = ReqwestProxy::all(target.forward_proxy_url())?;

        let client = Client::builder()
            .proxy(proxy)
            .timeout(self.config.timeout)
            .build()?;

        Ok(client)
    }
}

/// Read until EOF, `limit` bytes, or a complete `Content-Length` delimited response
async fn read_bounded<R>(reader: &mut R, limit: usize) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; limit];
    let mut filled = 0;

    while filled < limit {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
        if echo::is_complete(&buf[..filled]) {
            break;
        }
    }

    buf.truncate(filled);
    Ok(buf)
}
