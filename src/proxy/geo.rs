//! Geolocation of egress IP addresses through the ip-api.com JSON service

use crate::Result;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Sentinel used for every geolocation field that could not be resolved
pub const UNKNOWN: &str = "Unknown";

/// Default geolocation endpoint, the IP is appended as a path segment
pub const DEFAULT_GEO_API_URL: &str = "http://ip-api.com/json";

/// Default timeout for geolocation lookups in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// ip-api only returns the AS name and the mobile/proxy/hosting flags when asked for them
const GEO_FIELDS: &str =
    "status,message,country,countryCode,regionName,city,zip,lat,lon,timezone,isp,org,as,asname,mobile,proxy,hosting";

/// Geographic and network information for an IP address.
///
/// Never partially null: anything missing upstream is [`UNKNOWN`] (or `false`
/// for the flags).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoRecord {
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub city: String,
    pub zip: String,
    pub latitude: String,
    pub longitude: String,
    pub timezone: String,
    pub isp: String,
    pub org: String,
    pub as_number: String,
    pub as_name: String,
    pub is_mobile: bool,
    pub is_proxy: bool,
    pub is_hosting: bool,
}

impl GeoRecord {
    /// The all-sentinel record
    pub fn unknown() -> Self {
        Self {
            country: UNKNOWN.to_string(),
            country_code: UNKNOWN.to_string(),
            region: UNKNOWN.to_string(),
            city: UNKNOWN.to_string(),
            zip: UNKNOWN.to_string(),
            latitude: UNKNOWN.to_string(),
            longitude: UNKNOWN.to_string(),
            timezone: UNKNOWN.to_string(),
            isp: UNKNOWN.to_string(),
            org: UNKNOWN.to_string(),
            as_number: UNKNOWN.to_string(),
            as_name: UNKNOWN.to_string(),
            is_mobile: false,
            is_proxy: false,
            is_hosting: false,
        }
    }

    /// Check if every field is at its sentinel
    pub fn is_unknown(&self) -> bool {
        *self == Self::unknown()
    }

    /// Get a short display string for the location
    pub fn short_display(&self) -> String {
        match (self.city.as_str(), self.country_code.as_str()) {
            (UNKNOWN, UNKNOWN) => UNKNOWN.to_string(),
            (UNKNOWN, cc) => cc.to_string(),
            (city, UNKNOWN) => city.to_string(),
            (city, cc) => format!("{}, {}", city, cc),
        }
    }
}

impl Default for GeoRecord {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Raw ip-api payload. Every field is optional, presence is decided per field,
/// and a field of the wrong type counts as absent.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct IpApiResponse {
    #[serde(deserialize_with = "lenient")]
    status: Option<String>,
    #[serde(deserialize_with = "lenient")]
    message: Option<String>,
    #[serde(deserialize_with = "lenient")]
    country: Option<String>,
    #[serde(deserialize_with = "lenient")]
    country_code: Option<String>,
    #[serde(deserialize_with = "lenient")]
    region_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    city: Option<String>,
    #[serde(deserialize_with = "lenient")]
    zip: Option<String>,
    #[serde(deserialize_with = "lenient")]
    lat: Option<serde_json::Number>,
    #[serde(deserialize_with = "lenient")]
    lon: Option<serde_json::Number>,
    #[serde(deserialize_with = "lenient")]
    timezone: Option<String>,
    #[serde(deserialize_with = "lenient")]
    isp: Option<String>,
    #[serde(deserialize_with = "lenient")]
    org: Option<String>,
    #[serde(rename = "as", deserialize_with = "lenient")]
    as_number: Option<String>,
    #[serde(rename = "asname", deserialize_with = "lenient")]
    as_name: Option<String>,
    #[serde(deserialize_with = "lenient")]
    mobile: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    proxy: Option<bool>,
    #[serde(deserialize_with = "lenient")]
    hosting: Option<bool>,
}

fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

impl From<IpApiResponse> for GeoRecord {
    fn from(data: IpApiResponse) -> Self {
        Self {
            country: or_unknown(data.country),
            country_code: or_unknown(data.country_code),
            region: or_unknown(data.region_name),
            city: or_unknown(data.city),
            zip: or_unknown(data.zip),
            latitude: or_unknown(data.lat.map(|n| n.to_string())),
            longitude: or_unknown(data.lon.map(|n| n.to_string())),
            timezone: or_unknown(data.timezone),
            isp: or_unknown(data.isp),
            org: or_unknown(data.org),
            as_number: or_unknown(data.as_number),
            as_name: or_unknown(data.as_name),
            is_mobile: data.mobile.unwrap_or(false),
            is_proxy: data.proxy.unwrap_or(false),
            is_hosting: data.hosting.unwrap_or(false),
        }
    }
}

/// Reasons a geolocation lookup did not produce a record
#[derive(Debug, thiserror::Error)]
pub enum GeoError {
    #[error("geolocation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("geolocation service returned HTTP {0}")]
    Status(StatusCode),

    #[error("geolocation lookup failed: {}", .0.as_deref().unwrap_or("status is not success"))]
    Lookup(Option<String>),
}

/// Resolves IP addresses to [`GeoRecord`]s.
///
/// Holds no cache, every call is a fresh request.
#[derive(Debug, Clone)]
pub struct GeoResolver {
    client: Client,
    api_url: String,
}

impl GeoResolver {
    /// Create a resolver against the public ip-api endpoint
    pub fn new() -> Result<Self> {
        Self::with_api_url(DEFAULT_GEO_API_URL, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Create a resolver against a custom endpoint with the given timeout
    pub fn with_api_url(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().no_proxy().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Resolve an IP, degrading to [`GeoRecord::unknown`] on any failure
    pub async fn resolve(&self, ip: &str) -> GeoRecord {
        match self.lookup(ip).await {
            Ok(record) => record,
            Err(e) => {
                warn!(ip, error = %e, "IP info lookup failed");
                GeoRecord::unknown()
            }
        }
    }

    /// Look up an IP, reporting why the lookup failed
    pub async fn lookup(&self, ip: &str) -> std::result::Result<GeoRecord, GeoError> {
        let url = format!("{}/{}", self.api_url, ip);
        debug!(%url, "looking up IP info");

        let response = self
            .client
            .get(&url)
            .query(&[("fields", GEO_FIELDS)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status()));
        }

        let mut data: IpApiResponse = response.json().await?;
        if data.status.as_deref() != Some("success") {
            return Err(GeoError::Lookup(data.message.take()));
        }

        Ok(GeoRecord::from(data))
    }
}
