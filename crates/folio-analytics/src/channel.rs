//! Referrer and UTM attribution
//!
//! This module provides functions to:
//! - Parse UTM parameters from query strings
//! - Extract hostname from referrer URLs
//! - Classify a referrer into the traffic source stored on the session

use std::collections::HashMap;

use folio_core::strip_www;
use folio_entities::{ReferrerInfo, ReferrerType, UtmParams};

/// Social network referrer domains
pub const SOCIAL_DOMAINS: &[(&str, &str)] = &[
    ("facebook.com", "Facebook"),
    ("fb.com", "Facebook"),
    ("fb.me", "Facebook"),
    ("twitter.com", "Twitter"),
    ("t.co", "Twitter"),
    ("x.com", "Twitter"),
    ("linkedin.com", "LinkedIn"),
    ("lnkd.in", "LinkedIn"),
    ("instagram.com", "Instagram"),
    ("youtube.com", "YouTube"),
    ("youtu.be", "YouTube"),
    ("tiktok.com", "TikTok"),
    ("pinterest.com", "Pinterest"),
    ("reddit.com", "Reddit"),
    ("github.com", "GitHub"),
];

/// Search engine referrer domains. `google.co` also covers country
/// domains such as `google.co.uk`.
pub const SEARCH_ENGINES: &[(&str, &str)] = &[
    ("google.com", "Google"),
    ("google.co", "Google"),
    ("bing.com", "Bing"),
    ("yahoo.com", "Yahoo"),
    ("duckduckgo.com", "DuckDuckGo"),
    ("baidu.com", "Baidu"),
    ("yandex.com", "Yandex"),
    ("ecosia.org", "Ecosia"),
];

const PAID_MEDIUMS: &[&str] = &["cpc", "paid", "ppc"];

/// Parse UTM parameters from a query string
///
/// # Arguments
/// * `query_string` - The query string (with or without leading `?`)
///
/// # Example
/// ```
/// use folio_analytics::channel::parse_utm_params;
///
/// let params = parse_utm_params("utm_source=google&utm_medium=cpc&utm_campaign=spring_sale");
/// assert_eq!(params.source, Some("google".to_string()));
/// assert_eq!(params.medium, Some("cpc".to_string()));
/// ```
pub fn parse_utm_params(query_string: &str) -> UtmParams {
    let query = query_string.trim_start_matches('?');

    let mut params: HashMap<String, String> = query
        .split('&')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.to_lowercase();
            let value = parts.next().unwrap_or("").replace('+', " ");
            // URL decode the value
            let decoded = urlencoding::decode(&value).ok()?.into_owned();
            if decoded.is_empty() {
                None
            } else {
                Some((key, decoded))
            }
        })
        .collect();

    UtmParams {
        source: params.remove("utm_source"),
        medium: params.remove("utm_medium"),
        campaign: params.remove("utm_campaign"),
        term: params.remove("utm_term"),
        content: params.remove("utm_content"),
    }
}

/// Extract hostname from a referrer URL
///
/// # Example
/// ```
/// use folio_analytics::channel::extract_referrer_hostname;
///
/// let hostname = extract_referrer_hostname("https://www.google.com/search?q=test");
/// assert_eq!(hostname, Some("www.google.com".to_string()));
/// ```
pub fn extract_referrer_hostname(referrer: &str) -> Option<String> {
    let referrer = referrer.trim();
    if referrer.is_empty() {
        return None;
    }

    url::Url::parse(referrer)
        .ok()?
        .host_str()
        .filter(|host| !host.is_empty())
        .map(|host| host.to_lowercase())
}

/// Whether `pattern` occurs in `domain` on label boundaries, so `x.com`
/// matches `x.com` and `mobile.x.com` but not `dropbox.com`
fn matches_domain(domain: &str, pattern: &str) -> bool {
    domain.match_indices(pattern).any(|(start, _)| {
        let end = start + pattern.len();
        let left_ok = start == 0 || domain.as_bytes()[start - 1] == b'.';
        let right_ok = end == domain.len() || domain.as_bytes()[end] == b'.';
        left_ok && right_ok
    })
}

fn lookup<'a>(table: &'a [(&'a str, &'a str)], domain: &str) -> Option<&'a str> {
    table
        .iter()
        .find(|(pattern, _)| matches_domain(domain, pattern))
        .map(|(_, name)| *name)
}

/// Classify the document referrer. First match wins:
/// same site, social network, search engine, paid medium, email medium,
/// then referral when a domain is known and direct otherwise.
///
/// # Arguments
/// * `referrer` - The raw `document.referrer`
/// * `current_hostname` - Hostname of the tracked site (to detect self-referrals)
/// * `utm` - UTM parameters of the landing URL
pub fn classify_referrer(referrer: &str, current_hostname: &str, utm: &UtmParams) -> ReferrerInfo {
    let domain = extract_referrer_hostname(referrer)
        .map(|host| strip_www(&host).to_string())
        .unwrap_or_default();
    let info = |referrer_type: ReferrerType| ReferrerInfo {
        raw: referrer.to_string(),
        domain: domain.clone(),
        referrer_type,
        search_engine: None,
        social_network: None,
    };

    let current = strip_www(&current_hostname.to_lowercase()).to_string();
    if !domain.is_empty() && domain == current {
        return info(ReferrerType::Direct);
    }

    if let Some(network) = lookup(SOCIAL_DOMAINS, &domain) {
        return ReferrerInfo {
            social_network: Some(network.to_string()),
            ..info(ReferrerType::Social)
        };
    }

    if let Some(engine) = lookup(SEARCH_ENGINES, &domain) {
        return ReferrerInfo {
            search_engine: Some(engine.to_string()),
            ..info(ReferrerType::Organic)
        };
    }

    let medium = utm.medium.as_deref().map(str::to_lowercase);
    match medium.as_deref() {
        Some(m) if PAID_MEDIUMS.contains(&m) => info(ReferrerType::Paid),
        Some("email") => info(ReferrerType::Email),
        _ if !domain.is_empty() => info(ReferrerType::Referral),
        _ => info(ReferrerType::Direct),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_utm_params_basic() {
        let params = parse_utm_params("utm_source=google&utm_medium=cpc&utm_campaign=spring_sale");

        assert_eq!(params.source, Some("google".to_string()));
        assert_eq!(params.medium, Some("cpc".to_string()));
        assert_eq!(params.campaign, Some("spring_sale".to_string()));
        assert_eq!(params.content, None);
        assert_eq!(params.term, None);
    }

    #[test]
    fn test_parse_utm_params_with_question_mark() {
        let params = parse_utm_params("?utm_source=newsletter&utm_medium=email");

        assert_eq!(params.source, Some("newsletter".to_string()));
        assert_eq!(params.medium, Some("email".to_string()));
    }

    #[test]
    fn test_parse_utm_params_url_encoded() {
        let params = parse_utm_params("utm_campaign=spring%20sale%202024&utm_term=rust+async");

        assert_eq!(params.campaign, Some("spring sale 2024".to_string()));
        assert_eq!(params.term, Some("rust async".to_string()));
    }

    #[test]
    fn test_parse_utm_params_drops_empty_values() {
        let params = parse_utm_params("utm_source=&utm_medium=social");
        assert_eq!(params.source, None);
        assert_eq!(params.medium, Some("social".to_string()));
        assert!(parse_utm_params("").is_empty());
    }

    #[test]
    fn test_extract_referrer_hostname() {
        assert_eq!(
            extract_referrer_hostname("https://www.google.com/search?q=test"),
            Some("www.google.com".to_string())
        );

        assert_eq!(
            extract_referrer_hostname("http://facebook.com/share"),
            Some("facebook.com".to_string())
        );

        assert_eq!(extract_referrer_hostname(""), None);
        assert_eq!(extract_referrer_hostname("not a url"), None);
    }

    #[test]
    fn test_referrer_direct() {
        let info = classify_referrer("", "example.com", &UtmParams::default());
        assert_eq!(info.referrer_type, ReferrerType::Direct);
        assert_eq!(info.domain, "");
    }

    #[test]
    fn test_referrer_self_is_direct() {
        let info = classify_referrer("https://www.example.com/blog", "example.com", &UtmParams::default());
        assert_eq!(info.referrer_type, ReferrerType::Direct);
        assert_eq!(info.domain, "example.com");
    }

    #[test]
    fn test_referrer_social_wins_over_utm() {
        let utm = UtmParams {
            medium: Some("cpc".to_string()),
            ..Default::default()
        };
        let info = classify_referrer("https://t.co/abc", "example.com", &utm);
        assert_eq!(info.referrer_type, ReferrerType::Social);
        assert_eq!(info.social_network.as_deref(), Some("Twitter"));
    }

    #[test]
    fn test_referrer_organic_search() {
        let info = classify_referrer("https://www.google.co.uk/", "example.com", &UtmParams::default());
        assert_eq!(info.referrer_type, ReferrerType::Organic);
        assert_eq!(info.search_engine.as_deref(), Some("Google"));
        assert_eq!(info.domain, "google.co.uk");
    }

    #[test]
    fn test_referrer_paid_and_email_mediums() {
        let paid = UtmParams {
            medium: Some("PPC".to_string()),
            ..Default::default()
        };
        assert_eq!(
            classify_referrer("https://ads.example.net/", "example.com", &paid).referrer_type,
            ReferrerType::Paid
        );

        let email = UtmParams {
            medium: Some("email".to_string()),
            ..Default::default()
        };
        assert_eq!(
            classify_referrer("", "example.com", &email).referrer_type,
            ReferrerType::Email
        );
    }

    #[test]
    fn test_referrer_referral() {
        let info = classify_referrer("https://dropbox.com/s/file", "example.com", &UtmParams::default());
        // x.com must not match inside dropbox.com
        assert_eq!(info.referrer_type, ReferrerType::Referral);
        assert_eq!(info.social_network, None);
    }
}
