//! Device, operating system and browser classification from the user agent

use std::sync::Mutex;

use folio_entities::{DeviceInfo, DeviceType};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::environment::BrowserEnvironment;

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("device detection patterns are valid")
}

fn table(entries: &[(&str, &'static str)]) -> Vec<(Regex, &'static str)> {
    entries
        .iter()
        .map(|(pattern, name)| (compile(pattern), *name))
        .collect()
}

static MOBILE: Lazy<Regex> = Lazy::new(|| {
    compile(r"(?i)mobile|iphone|ipod|android.*mobile|blackberry|opera mini|opera mobi|iemobile|wpdesktop|windows phone")
});

// Specific platforms first: Windows Phone UAs mention Android, Android UAs
// mention Linux, iOS UAs say "like Mac OS X"
static OS_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    table(&[
        (r"(?i)windows phone", "Windows Phone"),
        (r"(?i)windows nt", "Windows"),
        (r"(?i)android", "Android"),
        (r"(?i)iphone|ipad|ipod", "iOS"),
        (r"(?i)cros", "Chrome OS"),
        (r"(?i)macintosh|mac os x", "macOS"),
        (r"(?i)ubuntu", "Ubuntu"),
        (r"(?i)fedora", "Fedora"),
        (r"(?i)linux", "Linux"),
    ])
});

// Edge and Opera UAs also contain "Chrome", and Chrome UAs contain "Safari"
static BROWSER_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    table(&[
        (r"(?i)edg(?:e|a|ios)?/", "Edge"),
        (r"(?i)opr/", "Opera"),
        (r"(?i)firefox/", "Firefox"),
        (r"(?i)brave", "Brave"),
        (r"(?i)vivaldi", "Vivaldi"),
        (r"(?i)samsung", "Samsung Internet"),
        (r"(?i)chrome/", "Chrome"),
        (r"(?i)safari/", "Safari"),
        (r"(?i)msie|trident", "Internet Explorer"),
    ])
});

static BROWSER_VERSIONS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("Edge", r"(?i)edg(?:e|a|ios)?/(\d+)"),
        ("Opera", r"(?i)opr/(\d+)"),
        ("Firefox", r"(?i)firefox/(\d+)"),
        ("Vivaldi", r"(?i)vivaldi/(\d+)"),
        ("Samsung Internet", r"(?i)samsungbrowser/(\d+)"),
        ("Brave", r"(?i)chrome/(\d+)"),
        ("Chrome", r"(?i)chrome/(\d+)"),
        ("Safari", r"(?i)version/(\d+)"),
        ("Internet Explorer", r"(?i)(?:msie |rv:)(\d+)"),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, compile(pattern)))
    .collect()
});

static WINDOWS_VERSION: Lazy<Regex> = Lazy::new(|| compile(r"Windows NT (\d+\.\d+)"));
static WINDOWS_PHONE_VERSION: Lazy<Regex> = Lazy::new(|| compile(r"Windows Phone(?: OS)? (\d+\.\d+)"));
static MACOS_VERSION: Lazy<Regex> = Lazy::new(|| compile(r"Mac OS X (\d+[._]\d+)"));
static IOS_VERSION: Lazy<Regex> = Lazy::new(|| compile(r"OS (\d+[._]\d+)"));
static ANDROID_VERSION: Lazy<Regex> = Lazy::new(|| compile(r"Android (\d+(?:\.\d+)?)"));

pub const UNKNOWN: &str = "Unknown";

/// Tablets are checked before phones: Android tablets omit "Mobile"
pub fn detect_device_type(ua: &str) -> DeviceType {
    if ua.trim().is_empty() {
        return DeviceType::Unknown;
    }

    let lower = ua.to_lowercase();
    let is_tablet = lower.contains("ipad")
        || (lower.contains("tablet") && !lower.contains("tablet pc"))
        || lower.contains("playbook")
        || (lower.contains("android") && !lower.contains("mobile"));
    if is_tablet {
        return DeviceType::Tablet;
    }

    if MOBILE.is_match(ua) {
        return DeviceType::Mobile;
    }

    DeviceType::Desktop
}

fn first_match(patterns: &[(Regex, &'static str)], ua: &str) -> &'static str {
    patterns
        .iter()
        .find(|(pattern, _)| pattern.is_match(ua))
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN)
}

pub fn detect_os(ua: &str) -> &'static str {
    first_match(&OS_PATTERNS, ua)
}

fn capture(pattern: &Regex, ua: &str) -> Option<String> {
    pattern
        .captures(ua)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().replace('_', "."))
}

fn windows_marketing_name(nt_version: &str) -> String {
    match nt_version {
        "10.0" => "10/11",
        "6.3" => "8.1",
        "6.2" => "8",
        "6.1" => "7",
        "6.0" => "Vista",
        other => other,
    }
    .to_string()
}

/// Version of the detected OS, or empty when the UA does not carry one
pub fn detect_os_version(ua: &str, os: &str) -> String {
    let version = match os {
        "Windows" => capture(&WINDOWS_VERSION, ua).map(|v| windows_marketing_name(&v)),
        "Windows Phone" => capture(&WINDOWS_PHONE_VERSION, ua),
        "macOS" => capture(&MACOS_VERSION, ua),
        "iOS" => capture(&IOS_VERSION, ua),
        "Android" => capture(&ANDROID_VERSION, ua),
        _ => None,
    };
    version.unwrap_or_default()
}

pub fn detect_browser(ua: &str) -> &'static str {
    first_match(&BROWSER_PATTERNS, ua)
}

/// Major version of the detected browser, or empty
pub fn detect_browser_version(ua: &str, browser: &str) -> String {
    BROWSER_VERSIONS
        .iter()
        .find(|(name, _)| *name == browser)
        .and_then(|(_, pattern)| capture(pattern, ua))
        .unwrap_or_default()
}

/// Full device snapshot of an environment, without caching
pub fn device_info(env: &BrowserEnvironment) -> DeviceInfo {
    let ua = env.user_agent.as_str();
    let os = detect_os(ua);
    let browser = detect_browser(ua);

    DeviceInfo {
        device_type: detect_device_type(ua),
        os: os.to_string(),
        os_version: detect_os_version(ua, os),
        browser: browser.to_string(),
        browser_version: detect_browser_version(ua, browser),
        screen_width: env.screen_width,
        screen_height: env.screen_height,
        viewport_width: env.viewport_width,
        viewport_height: env.viewport_height,
        pixel_ratio: if env.pixel_ratio > 0.0 { env.pixel_ratio } else { 1.0 },
        color_depth: env.color_depth,
        touch_support: env.touch_support(),
        language: env.language.clone(),
        languages: env.languages.clone(),
        timezone: env.timezone.clone(),
        cookies_enabled: env.cookies_enabled,
        do_not_track: env.do_not_track,
        user_agent: env.user_agent.clone(),
    }
}

/// Device detection cached for the detector's lifetime
#[derive(Debug, Default)]
pub struct DeviceDetector {
    cache: Mutex<Option<DeviceInfo>>,
}

impl DeviceDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detect(&self, env: &BrowserEnvironment) -> DeviceInfo {
        let Ok(mut cache) = self.cache.lock() else {
            return device_info(env);
        };
        cache.get_or_insert_with(|| device_info(env)).clone()
    }

    /// Refresh the viewport of the cached snapshot after a resize
    pub fn update_viewport(&self, width: u32, height: u32) {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(device) = cache.as_mut() {
                device.viewport_width = width;
                device.viewport_height = height;
            }
        }
    }

    pub fn clear_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHROME_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";
    const EDGE_WINDOWS: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91";
    const SAFARI_IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1";
    const SAFARI_IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 16_6 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.6 Mobile/15E148 Safari/604.1";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 13; SM-X700) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/118.0.0.0 Safari/537.36";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.6099.43 Mobile Safari/537.36";
    const FIREFOX_MAC: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:121.0) Gecko/20100101 Firefox/121.0";
    const FIREFOX_UBUNTU: &str = "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0";
    const CHROMEBOOK: &str = "Mozilla/5.0 (X11; CrOS x86_64 14541.0.0) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
    const WINDOWS_PHONE: &str = "Mozilla/5.0 (Windows Phone 10.0; Android 6.0.1; Microsoft; Lumia 950) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/52.0.2743.116 Mobile Safari/537.36 Edge/15.15063";

    #[test]
    fn test_device_type() {
        assert_eq!(detect_device_type(CHROME_WINDOWS), DeviceType::Desktop);
        assert_eq!(detect_device_type(SAFARI_IPHONE), DeviceType::Mobile);
        assert_eq!(detect_device_type(SAFARI_IPAD), DeviceType::Tablet);
        assert_eq!(detect_device_type(ANDROID_TABLET), DeviceType::Tablet);
        assert_eq!(detect_device_type(ANDROID_PHONE), DeviceType::Mobile);
        assert_eq!(detect_device_type(""), DeviceType::Unknown);
    }

    #[test]
    fn test_os_priority() {
        assert_eq!(detect_os(ANDROID_PHONE), "Android");
        assert_eq!(detect_os(SAFARI_IPHONE), "iOS");
        assert_eq!(detect_os(CHROMEBOOK), "Chrome OS");
        assert_eq!(detect_os(WINDOWS_PHONE), "Windows Phone");
        assert_eq!(detect_os(FIREFOX_UBUNTU), "Ubuntu");
        assert_eq!(detect_os(FIREFOX_MAC), "macOS");
        assert_eq!(detect_os("curl/8.0"), UNKNOWN);
    }

    #[test]
    fn test_os_version() {
        assert_eq!(detect_os_version(CHROME_WINDOWS, "Windows"), "10/11");
        assert_eq!(detect_os_version(SAFARI_IPHONE, "iOS"), "17.1");
        assert_eq!(detect_os_version(FIREFOX_MAC, "macOS"), "10.15");
        assert_eq!(detect_os_version(ANDROID_PHONE, "Android"), "14");
        assert_eq!(detect_os_version(WINDOWS_PHONE, "Windows Phone"), "10.0");
        assert_eq!(detect_os_version(FIREFOX_UBUNTU, "Ubuntu"), "");
    }

    #[test]
    fn test_browser_priority_and_version() {
        assert_eq!(detect_browser(EDGE_WINDOWS), "Edge");
        assert_eq!(detect_browser_version(EDGE_WINDOWS, "Edge"), "120");
        assert_eq!(detect_browser(CHROME_WINDOWS), "Chrome");
        assert_eq!(detect_browser_version(CHROME_WINDOWS, "Chrome"), "119");
        assert_eq!(detect_browser(SAFARI_IPHONE), "Safari");
        assert_eq!(detect_browser_version(SAFARI_IPHONE, "Safari"), "17");
        assert_eq!(detect_browser(FIREFOX_MAC), "Firefox");
        assert_eq!(detect_browser(WINDOWS_PHONE), "Edge");
    }

    #[test]
    fn test_detector_caches_until_cleared() {
        let detector = DeviceDetector::new();
        let env = BrowserEnvironment::default().with_user_agent(FIREFOX_MAC);
        let first = detector.detect(&env);
        assert_eq!(first.browser, "Firefox");

        let other = BrowserEnvironment::default().with_user_agent(SAFARI_IPHONE);
        assert_eq!(detector.detect(&other), first);

        detector.update_viewport(800, 600);
        assert_eq!(detector.detect(&other).viewport_width, 800);

        detector.clear_cache();
        assert_eq!(detector.detect(&other).os, "iOS");
    }
}
