// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate limiting at the HTTP edge.
//!
//! [`guard`] wraps a router so every matched request is counted against an
//! action's policy before the handler runs. `/check` answers the same
//! question for a reverse proxy acting as an external authorizer.

use super::{AppState, ErrorResponse};
use crate::client::client_ip;
use crate::limiter::{Action, RateLimitDecision};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

const LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Middleware state: which action a guarded router counts against.
#[derive(Clone)]
pub struct LimitGuard {
    pub state: Arc<AppState>,
    pub action: Action,
}

/// Body of a 429 response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitExceeded {
    pub error: String,
    /// Unix seconds at which the window resets
    pub retry_after: i64,
}

/// Apply `action`'s rate limit to every route currently in `router`.
///
/// Routes added after this call are not guarded. The router must already
/// contain at least one route.
pub fn guard<S>(router: Router<S>, state: Arc<AppState>, action: Action) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        LimitGuard { state, action },
        enforce,
    ))
}

/// Count the request and short-circuit with 429 when over the limit.
pub async fn enforce(State(guard): State<LimitGuard>, request: Request, next: Next) -> Response {
    let client = client_ip(request.headers());
    let decision = guard.state.limiter.check(guard.action, &client).await;

    if !decision.allowed {
        return too_many_requests(&decision, guard.state.limiter.now());
    }

    let mut response = next.run(request).await;
    rate_limit_headers(response.headers_mut(), &decision);
    response
}

fn rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert(LIMIT, HeaderValue::from(decision.limit));
    headers.insert(REMAINING, HeaderValue::from(decision.remaining));
    headers.insert(RESET, HeaderValue::from(decision.reset_at.timestamp()));
}

fn too_many_requests(decision: &RateLimitDecision, now: DateTime<Utc>) -> Response {
    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(LimitExceeded {
            error: "Too many requests, please try again later".to_string(),
            retry_after: decision.reset_at.timestamp(),
        }),
    )
        .into_response();

    let headers = response.headers_mut();
    headers.insert(
        header::RETRY_AFTER,
        HeaderValue::from(decision.retry_after_secs(now)),
    );
    rate_limit_headers(headers, decision);
    response
}

/// Rate limit check request (for external authorization).
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub action: String,
    /// Client address; taken from proxy headers when absent
    #[serde(default)]
    pub ip: Option<String>,
}

/// Rate limit check response.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    /// Unix seconds at which the window resets
    pub reset_time: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub retry_after: Option<i64>,
}

/// Count one request for `{action, ip}` and report the decision.
pub async fn check(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> Response {
    let action = match req.action.parse::<Action>() {
        Ok(action) => action,
        Err(msg) => {
            warn!(action = %req.action, "Unknown rate limit action");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: msg,
                    code: "UNKNOWN_ACTION",
                }),
            )
                .into_response();
        }
    };

    let client = match req.ip.as_deref().map(str::trim).filter(|ip| !ip.is_empty()) {
        Some(ip) => match ip.parse::<IpAddr>() {
            Ok(ip) => ip.to_string(),
            Err(_) => {
                warn!(ip = %ip, "Invalid IP address format");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(ErrorResponse {
                        error: "Invalid IP address format".to_string(),
                        code: "INVALID_IP",
                    }),
                )
                    .into_response();
            }
        },
        None => client_ip(&headers),
    };

    debug!(action = %action, client = %client, "Processing rate limit check");
    let decision = state.limiter.check(action, &client).await;

    Json(CheckResponse {
        allowed: decision.allowed,
        remaining: decision.remaining,
        reset_time: decision.reset_at.timestamp(),
        retry_after: (!decision.allowed).then(|| decision.reset_at.timestamp()),
    })
    .into_response()
}
