// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Feed routes: `/rss`, `/feed.json` and `/feeds/validate`.

use super::{AppState, ErrorResponse, NO_STORE};
use crate::client::client_ip;
use crate::error::AppError;
use crate::feed::{FeedKind, FeedParams, FeedQuery};
use axum::{
    extract::{Query, RawQuery, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Content type, caching and identification headers for a feed response.
fn feed_headers(kind: FeedKind, cache_control: String) -> [(HeaderName, String); 5] {
    let (marker, version_header, version) = match kind {
        FeedKind::Rss => ("x-rss-feed", "x-rss-version", "2.0"),
        FeedKind::Json => ("x-json-feed", "x-json-feed-version", "1.1"),
    };
    [
        (header::CONTENT_TYPE, kind.content_type().to_string()),
        (header::CACHE_CONTROL, cache_control),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
        (HeaderName::from_static(marker), "true".to_string()),
        (HeaderName::from_static(version_header), version.to_string()),
    ]
}

fn public_cache(ttl_secs: u64) -> String {
    format!("public, max-age={ttl_secs}")
}

pub async fn get_rss(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
    params: Option<Query<FeedParams>>,
    headers: HeaderMap,
) -> Response {
    serve(&state, FeedKind::Rss, raw, params, &headers).await
}

pub async fn get_json_feed(
    State(state): State<Arc<AppState>>,
    RawQuery(raw): RawQuery,
    params: Option<Query<FeedParams>>,
    headers: HeaderMap,
) -> Response {
    serve(&state, FeedKind::Json, raw, params, &headers).await
}

pub async fn head_rss(State(state): State<Arc<AppState>>) -> Response {
    head(&state, FeedKind::Rss).await
}

pub async fn head_json_feed(State(state): State<Arc<AppState>>) -> Response {
    head(&state, FeedKind::Json).await
}

/// CORS preflight for feed readers running in a browser.
pub async fn preflight() -> impl IntoResponse {
    (
        StatusCode::OK,
        [
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, HEAD, OPTIONS"),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
            (header::ACCESS_CONTROL_MAX_AGE, "86400"),
        ],
    )
}

async fn serve(
    state: &AppState,
    kind: FeedKind,
    raw_query: Option<String>,
    params: Option<Query<FeedParams>>,
    headers: &HeaderMap,
) -> Response {
    state
        .feeds
        .record_access(kind, raw_query, client_ip(headers));

    let params = params.map(|Query(p)| p).unwrap_or_default();
    let query = FeedQuery::from_params(kind, params);

    let rendered = match state.feeds.generate(&query).await {
        Ok(doc) => doc.render().map(|body| (doc.cache_ttl_secs, body)),
        Err(err) => Err(err),
    };

    match rendered {
        Ok((ttl, body)) => {
            if let Some(metrics) = &state.metrics {
                metrics.record_feed(kind.as_str(), "ok");
            }
            (StatusCode::OK, feed_headers(kind, public_cache(ttl)), body).into_response()
        }
        Err(err) => {
            let outcome = match &err {
                AppError::FeedDisabled => {
                    info!(kind = %kind, "Feed requested while disabled");
                    "disabled"
                }
                other => {
                    error!(kind = %kind, code = other.code(), error = %other, "Feed generation failed");
                    "error"
                }
            };
            if let Some(metrics) = &state.metrics {
                metrics.record_feed(kind.as_str(), outcome);
            }
            let body = state.feeds.error_document(kind, &err).await;
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                feed_headers(kind, NO_STORE.to_string()),
                body,
            )
                .into_response()
        }
    }
}

async fn head(state: &AppState, kind: FeedKind) -> Response {
    match state.feeds.config().await {
        Ok(settings) if settings.enabled => (
            StatusCode::OK,
            feed_headers(kind, public_cache(settings.cache_ttl_secs)),
        )
            .into_response(),
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            warn!(kind = %kind, error = %err, "Feed settings unavailable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `type` parameter of `/feeds/validate`.
#[derive(Debug, Default, Deserialize)]
pub struct ValidateParams {
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Generate the default feed and report structural problems.
pub async fn validate(
    State(state): State<Arc<AppState>>,
    params: Option<Query<ValidateParams>>,
) -> Response {
    let requested = params.and_then(|Query(p)| p.kind).unwrap_or_default();
    let kind = match requested.trim().to_ascii_lowercase().as_str() {
        "" | "rss" => FeedKind::Rss,
        "json" => FeedKind::Json,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: format!("unknown feed type: {other}"),
                    code: "UNKNOWN_FEED_TYPE",
                }),
            )
                .into_response();
        }
    };

    Json(state.feeds.validate_feed(kind).await).into_response()
}
