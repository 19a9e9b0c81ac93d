//! Referrer classification and URL normalization.
//!
//! A referrer is stored as a bare domain plus a normalized full path, or the
//! `"(none)"` sentinel when it is empty, the literal `"null"`, a relative or
//! fragment link, or a same-site link back to the tracked domain.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Sentinel recorded when no external referrer applies.
pub const NO_REFERRER: &str = "(none)";

static WWW_PREFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^www\.").expect("static regex"));
static TRAILING_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/+$").expect("static regex"));
static PRECEDING_SLASHES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/+").expect("static regex"));

/// Strip a leading `www.` label.
pub fn remove_www(input: &str) -> String {
    WWW_PREFIX.replace(input, "").into_owned()
}

/// Strip all trailing slashes.
pub fn remove_trailing_slash(input: &str) -> String {
    TRAILING_SLASHES.replace(input, "").into_owned()
}

/// Strip all leading slashes.
pub fn remove_preceding_slash(input: &str) -> String {
    PRECEDING_SLASHES.replace(input, "").into_owned()
}

/// Prefix a non-empty query string with `?` if it lacks one.
pub fn with_query_prefix(query: &str) -> String {
    if query.is_empty() || query.starts_with('?') {
        query.to_string()
    } else {
        format!("?{query}")
    }
}

/// Decompose an absolute http(s) URL into `(bare domain, full path)`.
///
/// The bare domain is lowercased with `www.` and trailing slashes removed;
/// the full path is `domain/path?query` with redundant slashes trimmed, or
/// empty when the URL has neither path nor query. Anything that is not an
/// absolute http(s) URL collapses to `("(none)", "")`.
pub fn cleanup_url(input: &str) -> (String, String) {
    let Ok(parsed) = Url::parse(input) else {
        return (NO_REFERRER.to_string(), String::new());
    };

    if !parsed.scheme().starts_with("http") {
        return (NO_REFERRER.to_string(), String::new());
    }

    let Some(host) = parsed.host_str() else {
        return (NO_REFERRER.to_string(), String::new());
    };

    let domain = remove_www(&remove_trailing_slash(host));
    let path = remove_trailing_slash(&remove_preceding_slash(parsed.path()));
    let query = with_query_prefix(&remove_trailing_slash(&remove_preceding_slash(
        parsed.query().unwrap_or(""),
    )));

    let mut full = String::new();
    if !path.is_empty() {
        full = format!("{domain}/{path}");
    }
    if !query.is_empty() {
        if full.is_empty() {
            full = domain.clone();
        }
        full.push_str(&query);
    }

    (domain, full)
}

/// A referrer is valid only if it is non-empty, not the literal `"null"`,
/// not a relative or fragment link, and not a link from the tracked domain
/// itself (including subdomains).
fn is_valid_referrer(referrer: &str, website_domain: &str) -> bool {
    if referrer.is_empty()
        || referrer == "null"
        || referrer.starts_with('/')
        || referrer.starts_with('#')
    {
        return false;
    }

    let escaped = regex::escape(website_domain);
    let pattern = format!(r"^https?://([a-z0-9-]+\.)*{escaped}");
    match Regex::new(&pattern) {
        Ok(same_site) => !same_site.is_match(referrer),
        // A domain that breaks the pattern cannot match it either.
        Err(_) => true,
    }
}

/// Classify a raw `Referer` header against the tracked domain.
///
/// Returns `(referrer domain, referrer full path)`, or `("(none)", "")` for
/// invalid and same-site referrers.
pub fn filter_referrer(raw: &str, website_domain: &str) -> (String, String) {
    let referrer = raw.trim().to_lowercase();
    if !is_valid_referrer(&referrer, website_domain) {
        return (NO_REFERRER.to_string(), String::new());
    }
    cleanup_url(&referrer)
}

/// Canonical page key: tracked domain plus the trimmed URL path.
///
/// The incoming page value may be an absolute URL or a bare path; either
/// way the stored key is `domain/path` with surrounding slashes trimmed.
pub fn normalize_page(domain: &str, page: &str) -> String {
    let path = match Url::parse(page) {
        Ok(url) => url.path().to_string(),
        // Bare paths ("/a") are not absolute URLs; strip query/fragment.
        Err(_) => page
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    format!(
        "{}/{}",
        domain.trim_matches('/'),
        path.trim_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remove_www_cases() {
        for (input, expected) in [
            ("www.oldavista.com", "oldavista.com"),
            ("oldavista.com", "oldavista.com"),
            ("dash.oldavista.com", "dash.oldavista.com"),
            ("http://www.ericexperiment.com", "http://www.ericexperiment.com"),
        ] {
            assert_eq!(remove_www(input), expected, "input: {input}");
        }
    }

    #[test]
    fn remove_trailing_slash_cases() {
        for (input, expected) in [
            ("/search.php?hello=1/", "/search.php?hello=1"),
            ("search.php?hello=1/", "search.php?hello=1"),
            ("www.google.com/", "www.google.com"),
            ("www.google.com/////", "www.google.com"),
            ("www.google.com", "www.google.com"),
        ] {
            assert_eq!(remove_trailing_slash(input), expected, "input: {input}");
        }
    }

    #[test]
    fn remove_preceding_slash_cases() {
        for (input, expected) in [
            ("/search.php?hello=1/", "search.php?hello=1/"),
            ("/search.php?hello=1", "search.php?hello=1"),
            ("/www.google.com", "www.google.com"),
            ("//////www.google.com", "www.google.com"),
            ("www.google.com", "www.google.com"),
        ] {
            assert_eq!(remove_preceding_slash(input), expected, "input: {input}");
        }
    }

    #[test]
    fn with_query_prefix_cases() {
        assert_eq!(with_query_prefix(""), "");
        assert_eq!(with_query_prefix("?hello=1"), "?hello=1");
        assert_eq!(with_query_prefix("hello=1"), "?hello=1");
    }

    #[test]
    fn cleanup_url_cases() {
        for (input, domain, full) in [
            ("blaurus", "(none)", ""),
            ("search.php?hello=1", "(none)", ""),
            ("www.oldavista.com", "(none)", ""),
            ("ftp://www.oldavista.com", "(none)", ""),
            ("http://www.oldavista.com", "oldavista.com", ""),
            ("https://www.oldavista.com", "oldavista.com", ""),
            (
                "http://www.oldavista.com/search.php",
                "oldavista.com",
                "oldavista.com/search.php",
            ),
            (
                "https://www.oldavista.com/sub/search.php",
                "oldavista.com",
                "oldavista.com/sub/search.php",
            ),
            (
                "http://www.oldavista.com/search.php?s=Potato&search=Search",
                "oldavista.com",
                "oldavista.com/search.php?s=Potato&search=Search",
            ),
            (
                "https://www.oldavista.com/sub/search.php?s=Potato&search=Search",
                "oldavista.com",
                "oldavista.com/sub/search.php?s=Potato&search=Search",
            ),
            (
                "http://www.oldavista.com/search.php?",
                "oldavista.com",
                "oldavista.com/search.php",
            ),
        ] {
            let (got_domain, got_full) = cleanup_url(input);
            assert_eq!(got_domain, domain, "input: {input}");
            assert_eq!(got_full, full, "input: {input}");
        }
    }

    #[test]
    fn empty_referrer_maps_to_none() {
        assert_eq!(
            filter_referrer("", "own.com"),
            (NO_REFERRER.to_string(), String::new())
        );
    }

    #[test]
    fn null_literal_maps_to_none() {
        assert_eq!(
            filter_referrer("null", "own.com"),
            (NO_REFERRER.to_string(), String::new())
        );
    }

    #[test]
    fn relative_and_fragment_referrers_map_to_none() {
        assert_eq!(filter_referrer("/search.php", "own.com").0, NO_REFERRER);
        assert_eq!(filter_referrer("#section", "own.com").0, NO_REFERRER);
    }

    #[test]
    fn same_site_referrer_maps_to_none() {
        assert_eq!(
            filter_referrer("http://www.own.com/page", "own.com"),
            (NO_REFERRER.to_string(), String::new())
        );
        assert_eq!(
            filter_referrer("https://dash.own.com", "own.com").0,
            NO_REFERRER
        );
    }

    #[test]
    fn external_referrer_is_decomposed() {
        assert_eq!(
            filter_referrer("http://www.external.com/path?x=1", "own.com"),
            ("external.com".to_string(), "external.com/path?x=1".to_string())
        );
    }

    #[test]
    fn referrer_input_is_trimmed_and_lowercased() {
        assert_eq!(
            filter_referrer("   HTTP://WWW.External.COM/Path   ", "own.com").0,
            "external.com"
        );
    }

    #[test]
    fn normalize_page_joins_domain_and_path() {
        assert_eq!(normalize_page("example.com", "/a"), "example.com/a");
        assert_eq!(
            normalize_page("example.com/", "https://example.com/a/b/"),
            "example.com/a/b"
        );
        assert_eq!(normalize_page("example.com", "/"), "example.com/");
        assert_eq!(normalize_page("example.com", "/a?x=1"), "example.com/a");
    }
}
