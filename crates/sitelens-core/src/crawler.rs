//! Crawler and bot detection.
//!
//! Events from crawlers are dropped before any storage write. Detection is a
//! single compiled alternation over well-known crawler signatures plus the
//! generic bot/crawler/spider markers most automated agents carry.

use std::sync::LazyLock;

use regex::Regex;

static CRAWLER_SIGNATURES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)(",
        r"\bbot\b|bot/|bot;|-bot|robot|crawl|spider|slurp|archiver|scraper",
        r"|googlebot|bingbot|yandex|baiduspider|duckduckbot|applebot",
        r"|facebookexternalhit|twitterbot|linkedinbot|telegrambot|slackbot",
        r"|discordbot|whatsapp|pinterest|semrush|ahrefs|mj12bot|dotbot",
        r"|petalbot|bytespider|gptbot|ccbot|claudebot",
        r"|headlesschrome|phantomjs|lighthouse|pagespeed|pingdom|uptimerobot",
        r"|statuscake|site24x7|newrelicpinger",
        r"|curl/|wget/|python-requests|python-urllib|go-http-client|okhttp",
        r"|libwww-perl|java/|httpclient|axios/|node-fetch",
        r")",
    ))
    .expect("static regex")
});

/// Whether a user-agent string belongs to a known crawler or automated agent.
pub fn is_crawler(user_agent: &str) -> bool {
    CRAWLER_SIGNATURES.is_match(user_agent)
}
