//! Per-request filter parsing.
//!
//! A [`FilterSpec`] is the transient parse of the recognized aggregate-query
//! parameters. Presence of a primary dimension value (`b`, `os`, `r`) pins
//! that dimension and advances the drill-down one level; the secondary value
//! (`bv`, `osv`, `rfp`) only applies when its primary is present. Clients may
//! send the literal string `"null"` to mean "the empty value" — that mapping
//! happens here, once, so the query layer only ever sees effective values.

use std::collections::HashMap;

use crate::period::DEFAULT_PERIOD;

/// Parsed aggregate-query filters. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub period: String,
    pub browser: Option<String>,
    pub browser_version: Option<String>,
    pub os: Option<String>,
    pub os_version: Option<String>,
    pub country: Option<String>,
    pub referrer: Option<String>,
    pub referrer_path: Option<String>,
    pub page: Option<String>,
}

/// Map the `"null"` client sentinel to the empty value.
pub fn effective(value: &str) -> &str {
    if value == "null" {
        ""
    } else {
        value
    }
}

/// Split a "/"-joined secondary value into its drill levels (major, minor,
/// patch), each with the `"null"` sentinel applied. At most three levels are
/// meaningful; extras are ignored by the caller.
pub fn split_levels(value: &str) -> Vec<String> {
    value.split('/').map(|v| effective(v).to_string()).collect()
}

impl FilterSpec {
    /// Parse the recognized parameters out of a request query map. Unknown
    /// parameters are ignored; a missing `p` defaults to the 24-hour window.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| params.get(key).cloned();
        Self {
            period: get("p").unwrap_or_else(|| DEFAULT_PERIOD.to_string()),
            browser: get("b"),
            browser_version: get("bv"),
            os: get("os"),
            os_version: get("osv"),
            country: get("c"),
            referrer: get("r"),
            referrer_path: get("rfp"),
            page: get("pg"),
        }
    }

    /// The filter values already applied on the browser drill chain, in
    /// order: browser, then each version level. Echoed back to the client so
    /// it can render the drill path.
    pub fn browser_trail(&self) -> Vec<String> {
        trail(self.browser.as_deref(), self.browser_version.as_deref())
    }

    /// As [`browser_trail`](Self::browser_trail), for the OS drill chain.
    pub fn os_trail(&self) -> Vec<String> {
        trail(self.os.as_deref(), self.os_version.as_deref())
    }

    /// As [`browser_trail`](Self::browser_trail), for the referrer chain.
    pub fn referrer_trail(&self) -> Vec<String> {
        trail(self.referrer.as_deref(), self.referrer_path.as_deref())
    }

    /// Single-level trail for the flat country dimension.
    pub fn country_trail(&self) -> Vec<String> {
        self.country.iter().cloned().collect()
    }

    /// Single-level trail for the flat page dimension.
    pub fn page_trail(&self) -> Vec<String> {
        self.page.iter().cloned().collect()
    }
}

fn trail(primary: Option<&str>, secondary: Option<&str>) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(primary) = primary {
        out.push(primary.to_string());
        if let Some(secondary) = secondary {
            out.extend(secondary.split('/').map(str::to_string));
        }
    }
    out
}
