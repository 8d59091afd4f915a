use std::sync::Mutex;
use std::time::Duration;

use folio_entities::{GeoInfo, GeoSource};
use rand::seq::SliceRandom;
use serde::Deserialize;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_IPAPI_ENDPOINT: &str = "https://ipapi.co/json/";
pub const GEO_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),
    #[error("Geolocation request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Geolocation provider returned status {0}")]
    Status(u16),
    #[error("Geolocation provider reported an error: {0}")]
    Provider(String),
}

/// Response body of an ipapi-style `json/` endpoint
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct IpapiResponse {
    error: bool,
    reason: Option<String>,
    ip: Option<String>,
    country_name: Option<String>,
    country_code: Option<String>,
    region: Option<String>,
    region_code: Option<String>,
    city: Option<String>,
    postal: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    org: Option<String>,
    asn: Option<String>,
}

impl IpapiResponse {
    fn into_geo(self, host_timezone: &str) -> GeoInfo {
        let org = or_empty(self.org);
        GeoInfo {
            ip: or_empty(self.ip),
            country: self
                .country_name
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| GeoInfo::UNKNOWN_COUNTRY.to_string()),
            country_code: self
                .country_code
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| GeoInfo::UNKNOWN_COUNTRY_CODE.to_string()),
            region: or_empty(self.region),
            region_code: or_empty(self.region_code),
            city: or_empty(self.city),
            postal_code: or_empty(self.postal),
            latitude: self.latitude.unwrap_or(0.0),
            longitude: self.longitude.unwrap_or(0.0),
            timezone: self
                .timezone
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| host_timezone.to_string()),
            isp: org.clone(),
            org,
            asn: or_empty(self.asn),
            source: GeoSource::Ipapi,
        }
    }
}

fn or_empty(value: Option<String>) -> String {
    value.unwrap_or_default()
}

/// Client-side lookup against an ipapi-style JSON endpoint
pub struct IpapiGeolocationService {
    client: reqwest::Client,
    endpoint: String,
}

impl IpapiGeolocationService {
    pub fn new() -> Result<Self, GeoError> {
        Self::with_endpoint(DEFAULT_IPAPI_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, GeoError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("Folio-Analytics/1.0")
            .build()
            .map_err(|e| GeoError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn lookup(&self, host_timezone: &str) -> Result<GeoInfo, GeoError> {
        debug!("Requesting geolocation from {}", self.endpoint);
        let response = self
            .client
            .get(&self.endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeoError::Status(response.status().as_u16()));
        }

        let body: IpapiResponse = response.json().await?;
        if body.error {
            return Err(GeoError::Provider(
                body.reason.unwrap_or_else(|| "unspecified".to_string()),
            ));
        }

        Ok(body.into_geo(host_timezone))
    }
}

/// Sample cities for mock geolocation data
struct MockCity {
    city: &'static str,
    region: &'static str,
    region_code: &'static str,
    country: &'static str,
    country_code: &'static str,
    latitude: f64,
    longitude: f64,
    timezone: &'static str,
}

const MOCK_CITIES: &[MockCity] = &[
    MockCity {
        city: "Madrid",
        region: "Madrid",
        region_code: "MD",
        country: "Spain",
        country_code: "ES",
        latitude: 40.4168,
        longitude: -3.7038,
        timezone: "Europe/Madrid",
    },
    MockCity {
        city: "New York",
        region: "New York",
        region_code: "NY",
        country: "United States",
        country_code: "US",
        latitude: 40.7128,
        longitude: -74.0060,
        timezone: "America/New_York",
    },
    MockCity {
        city: "London",
        region: "England",
        region_code: "ENG",
        country: "United Kingdom",
        country_code: "GB",
        latitude: 51.5074,
        longitude: -0.1278,
        timezone: "Europe/London",
    },
    MockCity {
        city: "Buenos Aires",
        region: "Buenos Aires F.D.",
        region_code: "C",
        country: "Argentina",
        country_code: "AR",
        latitude: -34.6037,
        longitude: -58.3816,
        timezone: "America/Argentina/Buenos_Aires",
    },
    MockCity {
        city: "Tokyo",
        region: "Tokyo",
        region_code: "13",
        country: "Japan",
        country_code: "JP",
        latitude: 35.6762,
        longitude: 139.6503,
        timezone: "Asia/Tokyo",
    },
];

/// Mock geolocation service for local development
pub struct MockGeolocationService {
    city_index: Option<usize>,
}

impl MockGeolocationService {
    /// Always answers with the same city
    pub fn new() -> Self {
        Self {
            city_index: Some(0),
        }
    }

    /// Answers with a random sample city on every lookup
    pub fn random() -> Self {
        Self { city_index: None }
    }

    pub async fn lookup(&self) -> Result<GeoInfo, GeoError> {
        let city = match self.city_index {
            Some(index) => MOCK_CITIES.get(index % MOCK_CITIES.len()),
            None => MOCK_CITIES.choose(&mut rand::thread_rng()),
        }
        .ok_or_else(|| GeoError::Provider("Failed to select mock city".to_string()))?;

        info!("Mock geolocation resolved to {}", city.city);
        Ok(GeoInfo {
            ip: "127.0.0.1".to_string(),
            country: city.country.to_string(),
            country_code: city.country_code.to_string(),
            region: city.region.to_string(),
            region_code: city.region_code.to_string(),
            city: city.city.to_string(),
            postal_code: String::new(),
            latitude: city.latitude,
            longitude: city.longitude,
            timezone: city.timezone.to_string(),
            isp: "Mock ISP".to_string(),
            org: "Mock ISP".to_string(),
            asn: "AS0".to_string(),
            source: GeoSource::Ipapi,
        })
    }
}

impl Default for MockGeolocationService {
    fn default() -> Self {
        Self::new()
    }
}

pub enum GeolocationService {
    Ipapi(IpapiGeolocationService),
    Mock(MockGeolocationService),
}

impl GeolocationService {
    pub fn new() -> Result<Self, GeoError> {
        // Check if we should use mock service for local development
        let use_mock = std::env::var("FOLIO_GEO_MOCK")
            .unwrap_or_else(|_| "false".to_string())
            .to_lowercase()
            == "true";

        if use_mock {
            info!("Using mock geolocation service for local development");
            Ok(Self::Mock(MockGeolocationService::new()))
        } else {
            Ok(Self::Ipapi(IpapiGeolocationService::new()?))
        }
    }

    pub async fn lookup(&self, host_timezone: &str) -> Result<GeoInfo, GeoError> {
        match self {
            Self::Ipapi(service) => service.lookup(host_timezone).await,
            Self::Mock(service) => service.lookup().await,
        }
    }
}

struct CacheEntry {
    geo: GeoInfo,
    stored_at: Instant,
}

/// Geolocation with a time-bounded cache. Never fails: every error path
/// resolves to the unknown sentinel, which is not cached.
pub struct CachedGeolocation {
    service: GeolocationService,
    host_timezone: String,
    ttl: Duration,
    cache: Mutex<Option<CacheEntry>>,
}

impl CachedGeolocation {
    pub fn new(service: GeolocationService, host_timezone: impl Into<String>) -> Self {
        Self {
            service,
            host_timezone: host_timezone.into(),
            ttl: GEO_CACHE_TTL,
            cache: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn unknown(&self) -> GeoInfo {
        GeoInfo::unknown(self.host_timezone.clone())
    }

    /// The cached record, if one is present and younger than the TTL
    pub fn cached(&self) -> Option<GeoInfo> {
        let cache = self.cache.lock().ok()?;
        cache
            .as_ref()
            .filter(|entry| entry.stored_at.elapsed() < self.ttl)
            .map(|entry| entry.geo.clone())
    }

    pub async fn resolve(&self) -> GeoInfo {
        if let Some(geo) = self.cached() {
            return geo;
        }

        match self.service.lookup(&self.host_timezone).await {
            Ok(geo) => {
                if let Ok(mut cache) = self.cache.lock() {
                    *cache = Some(CacheEntry {
                        geo: geo.clone(),
                        stored_at: Instant::now(),
                    });
                }
                geo
            }
            Err(e) => {
                warn!("Geolocation lookup failed, using unknown location: {}", e);
                self.unknown()
            }
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.take();
        }
    }
}
