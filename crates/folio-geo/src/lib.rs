pub mod cloudflare;
pub mod geolocation_service;

pub use cloudflare::{from_cloudflare_headers, has_cloudflare_geo};
pub use geolocation_service::{
    CachedGeolocation, GeoError, GeolocationService, IpapiGeolocationService,
    MockGeolocationService, DEFAULT_IPAPI_ENDPOINT, GEO_CACHE_TTL,
};
