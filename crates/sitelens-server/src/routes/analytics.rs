//! `GET /api/{domain}/...` — the analytics query API.
//!
//! Every endpoint takes the same filter query parameters (`p`, `b`, `bv`,
//! `os`, `osv`, `c`, `r`, `rfp`, `pg`) and answers from the tenant's
//! analytical store. Aggregate responses echo the already-applied drill
//! filters back as `previousFilters` so the dashboard can render the path.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Json;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Serialize;

use sitelens_core::period::parse_timezone;
use sitelens_core::FilterSpec;
use sitelens_store::{aggregate, summary, AggregateRow, Dimension, Summary, TenantStore};

use crate::errors::{Result, ServerError};
use crate::server::AppState;

/// Aggregate endpoint response body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    pub previous_filters: Vec<String>,
    pub items: Vec<AggregateRow>,
}

fn tenant(state: &AppState, domain: &str) -> Result<Arc<TenantStore>> {
    if sitelens_settings::get_settings().website(domain).is_none() {
        return Err(ServerError::BadRequest(format!(
            "domain '{domain}' is not tracked"
        )));
    }
    Ok(state.registry.get_or_open(domain)?)
}

fn query_timezone() -> Tz {
    let name = sitelens_settings::get_settings().analytics.timezone.clone();
    parse_timezone(&name).unwrap_or(Tz::UTC)
}

/// Run one aggregate query off the async runtime.
async fn run_aggregate(
    store: Arc<TenantStore>,
    dimension: Dimension,
    filters: FilterSpec,
) -> Result<Vec<AggregateRow>> {
    let tz = query_timezone();
    let rows = tokio::task::spawn_blocking(move || {
        aggregate(store.analytic(), dimension, &filters, tz, Utc::now())
    })
    .await
    .map_err(|e| ServerError::QueryTask(e.to_string()))??;
    Ok(rows)
}

/// GET /api/{domain}/summaries
pub async fn get_summaries(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Summary>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    let tz = query_timezone();
    let result =
        tokio::task::spawn_blocking(move || summary(store.analytic(), &filters, tz, Utc::now()))
            .await
            .map_err(|e| ServerError::QueryTask(e.to_string()))??;
    Ok(Json(result))
}

/// GET /api/{domain}/browsers
pub async fn get_browsers(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    let previous_filters = filters.browser_trail();
    let items = run_aggregate(store, Dimension::Browser, filters).await?;
    Ok(Json(ListResponse {
        previous_filters,
        items,
    }))
}

/// GET /api/{domain}/os
pub async fn get_os(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    let previous_filters = filters.os_trail();
    let items = run_aggregate(store, Dimension::Os, filters).await?;
    Ok(Json(ListResponse {
        previous_filters,
        items,
    }))
}

/// GET /api/{domain}/countries
pub async fn get_countries(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    let previous_filters = filters.country_trail();
    let items = run_aggregate(store, Dimension::Country, filters).await?;
    Ok(Json(ListResponse {
        previous_filters,
        items,
    }))
}

/// GET /api/{domain}/referrers
pub async fn get_referrers(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    // Only the domain level is echoed; the full-path level is already
    // visible in the listed values.
    let previous_filters = filters.referrer.iter().cloned().collect();
    let items = run_aggregate(store, Dimension::Referrer, filters).await?;
    Ok(Json(ListResponse {
        previous_filters,
        items,
    }))
}

/// GET /api/{domain}/pages
pub async fn get_pages(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ListResponse>> {
    let store = tenant(&state, &domain)?;
    let filters = FilterSpec::from_query(&params);
    let previous_filters = filters.page_trail();
    let items = run_aggregate(store, Dimension::Page, filters).await?;
    Ok(Json(ListResponse {
        previous_filters,
        items,
    }))
}
