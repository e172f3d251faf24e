// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! `/sitemap.xml` route.

use super::{AppState, NO_STORE};
use crate::error::Result;
use crate::sitemap::{SitemapPage, SitemapPlan};
use axum::{
    extract::{Query, State},
    http::{header, HeaderName, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

const XML: &str = "application/xml; charset=utf-8";
const JSON: &str = "application/json; charset=utf-8";
const PUBLIC_CACHE: &str = "public, max-age=3600";

#[derive(Debug, Default, Deserialize)]
pub struct SitemapParams {
    pub page: Option<String>,
    pub limit: Option<String>,
    pub format: Option<String>,
}

impl SitemapParams {
    fn number(raw: &Option<String>) -> Option<usize> {
        raw.as_deref().and_then(|v| v.trim().parse().ok())
    }

    fn wants_json(&self) -> bool {
        self.format
            .as_deref()
            .is_some_and(|f| f.trim().eq_ignore_ascii_case("json"))
    }
}

/// Serve the sitemap, an index, or one shard.
pub async fn get_sitemap(
    State(state): State<Arc<AppState>>,
    params: Option<Query<SitemapParams>>,
) -> Response {
    let params = params.map(|Query(p)| p).unwrap_or_default();
    let json = params.wants_json();
    let content_type = if json { JSON } else { XML };

    match build(&state, &params, json).await {
        Ok((kind, body)) => {
            if let Some(metrics) = &state.metrics {
                metrics.record_sitemap(kind);
            }
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, PUBLIC_CACHE),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => {
            error!(code = err.code(), error = %err, "Sitemap generation failed");
            if let Some(metrics) = &state.metrics {
                metrics.record_sitemap("fallback");
            }
            let body = if json {
                fallback_json(&state)
            } else {
                state.sitemaps.fallback_sitemap()
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CACHE_CONTROL, NO_STORE),
                ],
                body,
            )
                .into_response()
        }
    }
}

async fn build(state: &AppState, params: &SitemapParams, json: bool) -> Result<(&'static str, String)> {
    let sitemaps = &state.sitemaps;
    let base = sitemaps.base_url().to_string();
    let plan = sitemaps
        .plan(
            SitemapParams::number(&params.page),
            SitemapParams::number(&params.limit),
        )
        .await?;
    debug!(?plan, json, "Serving sitemap");

    match plan {
        SitemapPlan::Index { .. } if json => {
            let locations = sitemaps.index_locations(&base).await?;
            let body = serde_json::to_string(&json!({ "index": true, "sitemaps": locations }))?;
            Ok(("sitemap_index", body))
        }
        SitemapPlan::Index { .. } => Ok(("sitemap_index", sitemaps.generate_sitemap_index(&base).await?)),
        SitemapPlan::Shard { page, limit } if json => {
            let page = sitemaps.page(&base, page, limit).await?;
            Ok(("sitemap", serde_json::to_string(&page)?))
        }
        SitemapPlan::Shard { page, limit } => Ok((
            "sitemap",
            sitemaps.generate_paginated_sitemap(&base, page, limit).await?,
        )),
    }
}

fn fallback_json(state: &AppState) -> String {
    let page = SitemapPage {
        page: 1,
        limit: 1,
        total: 1,
        urls: vec![state.sitemaps.fallback_entry()],
    };
    serde_json::to_string(&page).unwrap_or_else(|_| "{\"page\":1,\"limit\":1,\"total\":0,\"urls\":[]}".to_string())
}

/// Existence check carrying the URL estimate.
pub async fn head_sitemap(State(state): State<Arc<AppState>>) -> Response {
    match state.sitemaps.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, XML.to_string()),
                (header::CACHE_CONTROL, PUBLIC_CACHE.to_string()),
                (
                    HeaderName::from_static("x-sitemap-urls"),
                    stats.estimated_urls.to_string(),
                ),
                (
                    HeaderName::from_static("x-sitemap-index"),
                    stats.needs_index.to_string(),
                ),
            ],
        )
            .into_response(),
        Err(err) => {
            warn!(error = %err, "Sitemap stats unavailable");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
