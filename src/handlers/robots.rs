// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! `/robots.txt` route.

use super::{AppState, NO_STORE};
use crate::feed::rss::rfc2822;
use crate::robots;
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

const PRODUCTION_CACHE: &str = "public, max-age=86400";

#[derive(Debug, Default, Deserialize)]
pub struct RobotsParams {
    pub format: Option<String>,
    pub bot: Option<String>,
}

fn cache_control(state: &AppState) -> &'static str {
    if state.config.environment.is_development() {
        NO_STORE
    } else {
        PRODUCTION_CACHE
    }
}

/// robots.txt as text, or its parsed form with `format=json`.
pub async fn get_robots(
    State(state): State<Arc<AppState>>,
    params: Option<Query<RobotsParams>>,
) -> Response {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let env = state.config.environment;
    let rules = robots::generate(env, state.config.site.base(), params.bot.as_deref());
    let text = rules.render();

    if let Some(metrics) = &state.metrics {
        metrics.record_sitemap("robots");
    }

    let headers = [
        (header::CACHE_CONTROL, cache_control(&state).to_string()),
        (header::LAST_MODIFIED, rfc2822(state.started_at)),
        (
            HeaderName::from_static("x-robots-environment"),
            env.as_str().to_string(),
        ),
    ];

    let wants_json = params
        .format
        .as_deref()
        .is_some_and(|f| f.trim().eq_ignore_ascii_case("json"));
    if wants_json {
        (StatusCode::OK, headers, Json(robots::parse(&text))).into_response()
    } else {
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            headers,
            text,
        )
            .into_response()
    }
}

/// Existence and last-modified check. The response itself is not indexable.
pub async fn head_robots(State(state): State<Arc<AppState>>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CACHE_CONTROL, cache_control(&state).to_string()),
            (header::LAST_MODIFIED, rfc2822(state.started_at)),
            (
                HeaderName::from_static("x-robots-tag"),
                "noindex, nofollow".to_string(),
            ),
        ],
    )
        .into_response()
}
