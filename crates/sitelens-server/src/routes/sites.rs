//! `GET /api/sites` — the configured websites.

use axum::response::Json;

use sitelens_settings::WebsiteConfig;

/// List the tracked websites from settings.
pub async fn get_sites() -> Json<Vec<WebsiteConfig>> {
    Json(sitelens_settings::get_settings().websites.clone())
}
