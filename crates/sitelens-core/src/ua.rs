//! User-agent classification.
//!
//! The sessionizer needs browser and OS families with up to three version
//! levels each; the drill-down queries group on those columns. The parser is
//! a trait so deployments can plug in a full signature database, with a
//! compiled-regex default that covers the mainstream browser and OS families.

use std::sync::LazyLock;

use regex::Regex;

/// Parsed user-agent fields. Empty strings mean "unknown at this level".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UaInfo {
    pub browser: String,
    pub browser_major: String,
    pub browser_minor: String,
    pub browser_patch: String,
    pub os: String,
    pub os_major: String,
    pub os_minor: String,
    pub os_patch: String,
}

/// Classification seam: maps a raw user-agent string to [`UaInfo`].
pub trait UserAgentParser: Send + Sync {
    fn parse(&self, user_agent: &str) -> UaInfo;
}

struct BrowserRule {
    family: &'static str,
    pattern: LazyLock<Regex>,
}

macro_rules! rule {
    ($family:expr, $pattern:expr) => {
        BrowserRule {
            family: $family,
            pattern: LazyLock::new(|| Regex::new($pattern).expect("static regex")),
        }
    };
}

// Order matters: Chrome-derived browsers advertise Chrome/ and Safari/, so
// the more specific tokens must win first.
static BROWSER_RULES: [BrowserRule; 8] = [
    rule!("Edge", r"Edge?/(\d+)(?:\.(\d+))?(?:\.(\d+))?"),
    rule!("Opera", r"(?:OPR|Opera)/(\d+)(?:\.(\d+))?(?:\.(\d+))?"),
    rule!(
        "Samsung Internet",
        r"SamsungBrowser/(\d+)(?:\.(\d+))?(?:\.(\d+))?"
    ),
    rule!("Chrome", r"(?:Chrome|CriOS)/(\d+)(?:\.(\d+))?(?:\.(\d+))?"),
    rule!("Firefox", r"(?:Firefox|FxiOS)/(\d+)(?:\.(\d+))?(?:\.(\d+))?"),
    rule!("Safari", r"Version/(\d+)(?:\.(\d+))?(?:\.(\d+))? .*Safari"),
    rule!("IE", r"MSIE (\d+)(?:\.(\d+))?"),
    rule!("IE", r"Trident/.*rv:(\d+)(?:\.(\d+))?"),
];

static OS_WINDOWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Windows NT (\d+)\.(\d+)").expect("static regex"));
static OS_IOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:iPhone|iPad|iPod).*OS (\d+)(?:[_.](\d+))?(?:[_.](\d+))?").expect("static regex")
});
static OS_MAC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Mac OS X (\d+)(?:[_.](\d+))?(?:[_.](\d+))?").expect("static regex")
});
static OS_ANDROID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Android (\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("static regex"));
static OS_CHROMEOS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"CrOS \S+ (\d+)(?:\.(\d+))?(?:\.(\d+))?").expect("static regex"));

/// Regex-backed default classifier.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexUaParser;

impl UserAgentParser for RegexUaParser {
    fn parse(&self, user_agent: &str) -> UaInfo {
        let mut info = UaInfo::default();

        for rule in &BROWSER_RULES {
            if let Some(caps) = rule.pattern.captures(user_agent) {
                info.browser = rule.family.to_string();
                (info.browser_major, info.browser_minor, info.browser_patch) = levels(&caps);
                break;
            }
        }

        if let Some(caps) = OS_WINDOWS.captures(user_agent) {
            info.os = "Windows".to_string();
            info.os_major = windows_release(&caps[1], &caps[2]).to_string();
        } else if let Some(caps) = OS_IOS.captures(user_agent) {
            info.os = "iOS".to_string();
            (info.os_major, info.os_minor, info.os_patch) = levels(&caps);
        } else if let Some(caps) = OS_ANDROID.captures(user_agent) {
            info.os = "Android".to_string();
            (info.os_major, info.os_minor, info.os_patch) = levels(&caps);
        } else if let Some(caps) = OS_CHROMEOS.captures(user_agent) {
            info.os = "Chrome OS".to_string();
            (info.os_major, info.os_minor, info.os_patch) = levels(&caps);
        } else if let Some(caps) = OS_MAC.captures(user_agent) {
            info.os = "Mac OS X".to_string();
            (info.os_major, info.os_minor, info.os_patch) = levels(&caps);
        } else if user_agent.contains("Linux") {
            info.os = "Linux".to_string();
        }

        info
    }
}

fn levels(caps: &regex::Captures<'_>) -> (String, String, String) {
    let at = |i: usize| {
        caps.get(i)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    };
    (at(1), at(2), at(3))
}

/// Marketing release name for a Windows NT kernel version.
fn windows_release(major: &str, minor: &str) -> &'static str {
    match (major, minor) {
        ("10", "0") => "10",
        ("6", "3") => "8.1",
        ("6", "2") => "8",
        ("6", "1") => "7",
        ("6", "0") => "Vista",
        ("5", _) => "XP",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(ua: &str) -> UaInfo {
        RegexUaParser.parse(ua)
    }

    #[test]
    fn chrome_on_windows() {
        let info = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.6099.130 Safari/537.36",
        );
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.browser_major, "120");
        assert_eq!(info.browser_minor, "0");
        assert_eq!(info.browser_patch, "6099");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.os_major, "10");
    }

    #[test]
    fn firefox_on_linux() {
        let info = parse("Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0");
        assert_eq!(info.browser, "Firefox");
        assert_eq!(info.browser_major, "121");
        assert_eq!(info.browser_minor, "0");
        assert_eq!(info.browser_patch, "");
        assert_eq!(info.os, "Linux");
        assert_eq!(info.os_major, "");
    }

    #[test]
    fn safari_on_mac() {
        let info = parse(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
        );
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.browser_major, "17");
        assert_eq!(info.os, "Mac OS X");
        assert_eq!(info.os_major, "10");
        assert_eq!(info.os_minor, "15");
        assert_eq!(info.os_patch, "7");
    }

    #[test]
    fn safari_on_ios() {
        let info = parse(
            "Mozilla/5.0 (iPhone; CPU iPhone OS 17_1_2 like Mac OS X) AppleWebKit/605.1.15 \
             (KHTML, like Gecko) Version/17.1 Mobile/15E148 Safari/604.1",
        );
        assert_eq!(info.browser, "Safari");
        assert_eq!(info.os, "iOS");
        assert_eq!(info.os_major, "17");
        assert_eq!(info.os_minor, "1");
        assert_eq!(info.os_patch, "2");
    }

    #[test]
    fn edge_wins_over_chrome() {
        let info = parse(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.2210.91",
        );
        assert_eq!(info.browser, "Edge");
        assert_eq!(info.browser_major, "120");
    }

    #[test]
    fn chrome_on_android() {
        let info = parse(
            "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 \
             (KHTML, like Gecko) Chrome/120.0.6099.144 Mobile Safari/537.36",
        );
        assert_eq!(info.browser, "Chrome");
        assert_eq!(info.os, "Android");
        assert_eq!(info.os_major, "14");
    }

    #[test]
    fn ie11_via_trident_token() {
        let info = parse("Mozilla/5.0 (Windows NT 6.1; Trident/7.0; rv:11.0) like Gecko");
        assert_eq!(info.browser, "IE");
        assert_eq!(info.browser_major, "11");
        assert_eq!(info.os, "Windows");
        assert_eq!(info.os_major, "7");
    }

    #[test]
    fn unknown_agent_yields_empty_fields() {
        let info = parse("some unidentifiable client");
        assert_eq!(info, UaInfo::default());
    }
}
