//! `POST /api/event` — the tracking beacon.

use std::net::SocketAddr;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use uuid::Uuid;

use sitelens_core::{EventPayload, QueuedEvent};

use crate::errors::{Result, ServerError};
use crate::extract::{client_ip, referer, ClientHints, ACCEPT_CH_VALUE};
use crate::server::AppState;

/// Accept one tracking event. Validates the payload, captures the client
/// signals from headers, and enqueues — persistence happens on the worker
/// thread, so this handler stays fast under load.
pub async fn post_event(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let hints = ClientHints::from_headers(&headers);

    let payload: EventPayload = serde_json::from_slice(&body)
        .map_err(|_| ServerError::BadRequest("there's an issue with the event data".to_string()))?;

    if payload.name != QueuedEvent::PAGEVIEW {
        return Err(ServerError::BadRequest(
            "only the 'pageview' event is supported at the moment".to_string(),
        ));
    }
    if payload.domain.is_empty() {
        return Err(ServerError::BadRequest("no domain was set".to_string()));
    }
    if payload.page.is_empty() {
        return Err(ServerError::BadRequest("no page was set".to_string()));
    }
    if sitelens_settings::get_settings()
        .website(&payload.domain)
        .is_none()
    {
        return Err(ServerError::BadRequest(format!(
            "domain '{}' is not tracked",
            payload.domain
        )));
    }

    let event = QueuedEvent {
        event_id: Uuid::now_v7(),
        name: payload.name,
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string(),
        host_name: headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string(),
        domain: payload.domain,
        page: payload.page,
        client_hint_ua: hints.ua.clone(),
        client_hint_mobile: hints.mobile.clone(),
        client_hint_platform: hints.platform.clone(),
        client_hint_full_version: hints.full_version.clone(),
        client_hint_platform_version: hints.platform_version.clone(),
        ip: {
            let from_headers = client_ip(&headers);
            if from_headers.is_empty() {
                // No proxy header: fall back to the socket peer address.
                peer.ip().to_string()
            } else {
                from_headers
            }
        },
        referrer: referer(&headers),
        time: Utc::now(),
        screen_width: payload.screen_width,
    };

    state.queue.push(&event)?;
    metrics::counter!("sitelens_events_accepted_total").increment(1);

    let mut response = "ok".into_response();
    if hints.is_empty() {
        // Ask the browser to include client hints on its next beacon.
        let _ = response
            .headers_mut()
            .insert("Accept-CH", HeaderValue::from_static(ACCEPT_CH_VALUE));
    }
    Ok(response)
}
