//! Automated client detection

use woothee::parser::Parser;

/// Lowercase signatures; a user agent containing any of them is a bot
pub const BOT_PATTERNS: [&str; 15] = [
    "bot",
    "crawl",
    "spider",
    "slurp",
    "mediapartners",
    "lighthouse",
    "pagespeed",
    "gtmetrix",
    "pingdom",
    "uptimerobot",
    "headless",
    "phantom",
    "selenium",
    "puppeteer",
    "playwright",
];

pub fn is_bot(user_agent: &str) -> bool {
    matched_signature(user_agent).is_some()
}

fn matched_signature(user_agent: &str) -> Option<&'static str> {
    let ua = user_agent.to_lowercase();
    BOT_PATTERNS.iter().copied().find(|pattern| ua.contains(pattern))
}

/// Name of the crawler behind a bot user agent.
///
/// Known crawlers are named by the woothee dataset; other bots fall back to
/// the signature they matched. Returns `None` for regular browsers.
pub fn crawler_name(user_agent: &str) -> Option<String> {
    let signature = matched_signature(user_agent)?;

    let parser = Parser::new();
    match parser.parse(user_agent) {
        Some(result) if result.category == "crawler" && result.name != "UNKNOWN" => {
            Some(result.name.to_string())
        }
        _ => Some(signature.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOGLEBOT: &str =
        "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";
    const HEADLESS: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) HeadlessChrome/120.0.0.0 Safari/537.36";
    const CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

    #[test]
    fn test_is_bot() {
        assert!(is_bot(GOOGLEBOT));
        assert!(is_bot(HEADLESS));
        assert!(is_bot("Chrome-Lighthouse"));
        assert!(is_bot("UptimeRobot/2.0"));
        assert!(!is_bot(CHROME));
        assert!(!is_bot(""));
    }

    #[test]
    fn test_crawler_name() {
        assert!(crawler_name(GOOGLEBOT).is_some());
        assert_eq!(crawler_name("ExampleSpider/1.0").as_deref(), Some("spider"));
        assert_eq!(crawler_name(CHROME), None);
    }
}
