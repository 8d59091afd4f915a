//! Geolocation from Cloudflare request headers, for server-side contexts

use folio_entities::{GeoInfo, GeoSource};
use reqwest::header::HeaderMap;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Whether the request carries enough Cloudflare headers to locate the client
pub fn has_cloudflare_geo(headers: &HeaderMap) -> bool {
    header(headers, "cf-connecting-ip").is_some() && header(headers, "cf-ipcountry").is_some()
}

/// Build a location record from `cf-*` headers. Fields Cloudflare does not
/// provide are left empty.
pub fn from_cloudflare_headers(headers: &HeaderMap) -> GeoInfo {
    let ip = header(headers, "cf-connecting-ip")
        .map(str::to_string)
        .or_else(|| {
            header(headers, "x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(|v| v.trim().to_string())
        })
        .unwrap_or_default();
    let country = header(headers, "cf-ipcountry").unwrap_or_default().to_string();
    let coordinate = |name: &str| {
        header(headers, name)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(0.0)
    };

    GeoInfo {
        ip,
        country: country.clone(),
        country_code: country,
        region: header(headers, "cf-region").unwrap_or_default().to_string(),
        region_code: header(headers, "cf-region-code").unwrap_or_default().to_string(),
        city: header(headers, "cf-ipcity").unwrap_or_default().to_string(),
        postal_code: header(headers, "cf-postal-code").unwrap_or_default().to_string(),
        latitude: coordinate("cf-iplat"),
        longitude: coordinate("cf-iplon"),
        timezone: header(headers, "cf-timezone").unwrap_or_default().to_string(),
        isp: String::new(),
        org: String::new(),
        asn: String::new(),
        source: GeoSource::Cloudflare,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_cloudflare_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("cf-connecting-ip", HeaderValue::from_static("203.0.113.9"));
        headers.insert("cf-ipcountry", HeaderValue::from_static("AR"));
        headers.insert("cf-ipcity", HeaderValue::from_static("Rosario"));
        headers.insert("cf-iplat", HeaderValue::from_static("-32.95"));
        headers.insert("cf-iplon", HeaderValue::from_static("not-a-number"));

        assert!(has_cloudflare_geo(&headers));
        let geo = from_cloudflare_headers(&headers);
        assert_eq!(geo.ip, "203.0.113.9");
        assert_eq!(geo.country_code, "AR");
        assert_eq!(geo.city, "Rosario");
        assert_eq!(geo.latitude, -32.95);
        assert_eq!(geo.longitude, 0.0);
        assert_eq!(geo.source, GeoSource::Cloudflare);
    }

    #[test]
    fn test_forwarded_for_fallback() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("198.51.100.4, 10.0.0.1"),
        );

        assert!(!has_cloudflare_geo(&headers));
        assert_eq!(from_cloudflare_headers(&headers).ip, "198.51.100.4");
    }
}
