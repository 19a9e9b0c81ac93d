//! Request-header extraction for event ingestion.
//!
//! Proxy-aware client IP resolution, `Referer` normalization, and the
//! user-agent client hint set. All of these degrade to empty strings rather
//! than failing the request: a tracking beacon should never bounce on a
//! missing header.

use axum::http::HeaderMap;

/// Headers consulted for the client IP, in priority order. The CGI-style
/// names show up behind some reverse-proxy setups.
const IP_HEADERS: [&str; 7] = [
    "CF-Connecting-IP",
    "X-Real-IP",
    "X-Forwarded-For",
    "HTTP_CF_CONNECTING_IP",
    "HTTP_X_REAL_IP",
    "HTTP_X_FORWARDED_FOR",
    "REMOTE_ADDR",
];

/// Headers consulted for the referrer, in priority order.
const REFERER_HEADERS: [&str; 2] = ["Referer", "HTTP_REFERER"];

/// Value advertised via `Accept-CH` when a request arrives without client
/// hints.
pub const ACCEPT_CH_VALUE: &str = "sec-ch-ua,sec-ch-ua-platform,sec-ch-ua-mobile,\
    sec-ch-ua-full-version,Sec-CH-UA-Platform-Version,sec-ch-width,width,\
    sec-ch-viewport-width,viewport-width";

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Best-guess client IP from proxy headers. Comma-separated lists keep the
/// first (origin) entry. Empty when no header is present.
pub fn client_ip(headers: &HeaderMap) -> String {
    for name in IP_HEADERS {
        let value = header_str(headers, name);
        if !value.is_empty() {
            return value
                .split(',')
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
        }
    }
    String::new()
}

/// Raw referrer header, skipping the literal `"null"` some browsers send.
pub fn referer(headers: &HeaderMap) -> String {
    for name in REFERER_HEADERS {
        let value = header_str(headers, name);
        if !value.is_empty() && value != "null" {
            return value.to_string();
        }
    }
    String::new()
}

/// The `Sec-CH-UA-*` client hint set, captured verbatim for the queue item.
#[derive(Debug, Default)]
pub struct ClientHints {
    pub ua: String,
    pub mobile: String,
    pub platform: String,
    pub full_version: String,
    pub platform_version: String,
}

impl ClientHints {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        Self {
            ua: header_str(headers, "Sec-CH-UA").to_string(),
            mobile: header_str(headers, "Sec-CH-UA-Mobile").to_string(),
            platform: header_str(headers, "Sec-CH-UA-Platform").to_string(),
            full_version: header_str(headers, "Sec-CH-UA-Full-Version").to_string(),
            platform_version: header_str(headers, "Sec-CH-UA-Platform-Version").to_string(),
        }
    }

    /// True when the browser sent no hints at all; the response then
    /// advertises `Accept-CH` so the next beacon carries them.
    pub fn is_empty(&self) -> bool {
        self.ua.is_empty()
            && self.mobile.is_empty()
            && self.platform.is_empty()
            && self.full_version.is_empty()
            && self.platform_version.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            let _ = map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn client_ip_prefers_cf_connecting_ip() {
        let map = headers(&[
            ("X-Forwarded-For", "198.51.100.7"),
            ("CF-Connecting-IP", "203.0.113.9"),
        ]);
        assert_eq!(client_ip(&map), "203.0.113.9");
    }

    #[test]
    fn forwarded_for_list_keeps_the_first_entry() {
        let map = headers(&[("X-Forwarded-For", "203.0.113.9, 198.51.100.7, 10.0.0.1")]);
        assert_eq!(client_ip(&map), "203.0.113.9");
    }

    #[test]
    fn missing_ip_headers_yield_empty() {
        assert_eq!(client_ip(&HeaderMap::new()), "");
    }

    #[test]
    fn referer_skips_the_null_literal() {
        let map = headers(&[("Referer", "null")]);
        assert_eq!(referer(&map), "");
        let map = headers(&[("Referer", "https://external.com/a")]);
        assert_eq!(referer(&map), "https://external.com/a");
    }

    #[test]
    fn hints_absence_is_detected() {
        assert!(ClientHints::from_headers(&HeaderMap::new()).is_empty());
        let map = headers(&[("Sec-CH-UA-Platform", "\"Linux\"")]);
        let hints = ClientHints::from_headers(&map);
        assert!(!hints.is_empty());
        assert_eq!(hints.platform, "\"Linux\"");
    }
}
