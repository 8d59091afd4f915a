use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeoSource {
    Cloudflare,
    Ipapi,
    #[default]
    Unknown,
}

/// Approximate location of the visitor, derived from their IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoInfo {
    pub ip: String,
    pub country: String,
    pub country_code: String,
    pub region: String,
    pub region_code: String,
    pub city: String,
    pub postal_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    pub isp: String,
    pub org: String,
    pub asn: String,
    pub source: GeoSource,
}

impl GeoInfo {
    pub const UNKNOWN_COUNTRY: &'static str = "Unknown";
    pub const UNKNOWN_COUNTRY_CODE: &'static str = "XX";

    /// Sentinel record returned whenever a lookup cannot be completed
    pub fn unknown(timezone: impl Into<String>) -> Self {
        let timezone = timezone.into();
        Self {
            ip: String::new(),
            country: Self::UNKNOWN_COUNTRY.to_string(),
            country_code: Self::UNKNOWN_COUNTRY_CODE.to_string(),
            region: String::new(),
            region_code: String::new(),
            city: String::new(),
            postal_code: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            timezone: if timezone.is_empty() { "UTC".to_string() } else { timezone },
            isp: String::new(),
            org: String::new(),
            asn: String::new(),
            source: GeoSource::Unknown,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.source == GeoSource::Unknown
    }
}

impl Default for GeoInfo {
    fn default() -> Self {
        Self::unknown("UTC")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        let geo = GeoInfo::unknown("");
        assert_eq!(geo.country, "Unknown");
        assert_eq!(geo.country_code, "XX");
        assert_eq!(geo.timezone, "UTC");
        assert_eq!(geo.latitude, 0.0);
        assert!(geo.is_unknown());

        let json = serde_json::to_value(&geo).unwrap();
        assert_eq!(json["countryCode"], "XX");
        assert_eq!(json["source"], "unknown");
    }
}
