//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and implement
//! [`Default`] with production default values. Types marked with
//! `#[serde(default)]` allow partial JSON — missing fields get their
//! default value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the Sitelens engine.
///
/// Loaded from `sitelens.json` with defaults applied for missing fields.
/// Environment variables (`SITELENS_*`) can override specific values.
///
/// # JSON Format
///
/// ```json
/// {
///   "server": { "host": "0.0.0.0", "port": 3000 },
///   "storage": { "dataDir": "data" },
///   "analytics": { "timezone": "UTC" },
///   "websites": [{ "domain": "example.com", "title": "Example" }]
/// }
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SitelensSettings {
    /// HTTP server settings.
    pub server: ServerSettings,
    /// Storage locations.
    pub storage: StorageSettings,
    /// Analytics query behavior.
    pub analytics: AnalyticsSettings,
    /// The tracked websites. Events for domains not listed here are
    /// rejected at ingress.
    pub websites: Vec<WebsiteConfig>,
}

impl SitelensSettings {
    /// Look up a tracked website by domain.
    pub fn website(&self, domain: &str) -> Option<&WebsiteConfig> {
        self.websites.iter().find(|w| w.domain == domain)
    }
}

/// HTTP server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Listen port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Storage locations. All per-domain database files and the durable event
/// queue live under `data_dir`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Root directory for databases and the event queue.
    pub data_dir: String,
    /// Queue subdirectory name under `data_dir`.
    pub queue_dir: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            data_dir: "data".to_string(),
            queue_dir: "events-queue".to_string(),
        }
    }
}

/// Analytics query behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsSettings {
    /// IANA timezone that anchors named period ranges (`today`, `week`, ...).
    pub timezone: String,
}

impl Default for AnalyticsSettings {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

/// One tracked website.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebsiteConfig {
    /// Tracked domain, e.g. `example.com`.
    pub domain: String,
    /// Display title.
    pub title: String,
}
