//! # sitelens-settings
//!
//! Configuration management with layered sources for the Sitelens engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults** — [`SitelensSettings::default()`]
//! 2. **Settings file** — `sitelens.json` (deep-merged over defaults)
//! 3. **Environment variables** — `SITELENS_*` overrides (highest priority)
//!
//! The global singleton is initialized once at startup (the binary passes
//! the path from its CLI flag) and read everywhere else via [`get_settings`].

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::path::Path;
use std::sync::{Arc, RwLock};

/// Global settings singleton.
///
/// Uses `RwLock<Option<Arc<SitelensSettings>>>` so the cached value can be
/// initialized explicitly at startup and swapped in tests. Reads are cheap
/// (shared lock + `Arc::clone`).
static SETTINGS: RwLock<Option<Arc<SitelensSettings>>> = RwLock::new(None);

/// Get the global settings instance.
///
/// On first call, loads settings from the default path with env var
/// overrides. On subsequent calls, returns the cached value. If loading
/// fails, returns compiled defaults.
///
/// Returns an `Arc` so callers can hold a consistent snapshot even if
/// another thread replaces settings concurrently.
pub fn get_settings() -> Arc<SitelensSettings> {
    {
        let guard = SETTINGS.read().expect("settings lock poisoned");
        if let Some(ref s) = *guard {
            return Arc::clone(s);
        }
    }

    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    // Double-check after acquiring write lock (another thread may have initialized)
    if let Some(ref s) = *guard {
        return Arc::clone(s);
    }

    let settings = Arc::new(match load_settings() {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load settings, using defaults");
            SitelensSettings::default()
        }
    });
    *guard = Some(Arc::clone(&settings));
    settings
}

/// Initialize the global settings with a specific value.
///
/// Replaces any previously cached settings. Used by the binary after it
/// resolves the settings path from its CLI flag, and by tests.
pub fn init_settings(settings: SitelensSettings) {
    let mut guard = SETTINGS.write().expect("settings lock poisoned");
    *guard = Some(Arc::new(settings));
}

/// Load settings from a specific file path and install them globally.
pub fn init_settings_from_path(path: &Path) -> Result<()> {
    let settings = load_settings_from_path(path)?;
    init_settings(settings);
    Ok(())
}
