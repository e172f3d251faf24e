// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the syndication service.
//!
//! Feeds, sitemaps and robots.txt are always answered with a document of
//! the requested content type, including on failure. Interactive routes are
//! protected by the rate-limit guard in [`limit`].

pub mod feed;
pub mod limit;
pub mod robots;
pub mod sitemap;

use crate::config::Config;
use crate::content::ContentSource;
use crate::feed::access::MemoryAccessLog;
use crate::feed::FeedService;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::sitemap::SitemapService;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

/// Cache-Control for responses that must never be stored.
pub const NO_STORE: &str = "no-cache, no-store, must-revalidate";

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub limiter: RateLimiter,
    pub feeds: FeedService,
    pub sitemaps: SitemapService,
    pub metrics: Option<Metrics>,
    /// Process start, reported as robots.txt `Last-Modified`
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Wire services over a content source.
    pub fn new(config: Config, content: Arc<dyn ContentSource>) -> prometheus::Result<Self> {
        let metrics = if config.metrics.enabled {
            Some(Metrics::new()?)
        } else {
            None
        };

        let mut limiter = RateLimiter::new(config.rate_limit.clone());
        if let Some(metrics) = &metrics {
            limiter = limiter.with_metrics(metrics.clone());
        }

        let feeds = FeedService::new(
            config.site.clone(),
            Arc::clone(&content),
            Arc::new(MemoryAccessLog::default()),
            config.content_timeout(),
        );
        let sitemaps = SitemapService::new(
            config.site.clone(),
            config.sitemap.clone(),
            content,
            config.content_timeout(),
        );

        Ok(Self {
            config,
            limiter,
            feeds,
            sitemaps,
            metrics,
            started_at: Utc::now(),
        })
    }

    /// Replace the rate limiter.
    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn with_feeds(mut self, feeds: FeedService) -> Self {
        self.feeds = feeds;
        self
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub environment: &'static str,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "blog-syndication",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.as_str(),
    })
}

/// Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    let Some(metrics) = &state.metrics else {
        return StatusCode::NOT_FOUND.into_response();
    };
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Build the service router.
pub fn router(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(
            "/rss",
            get(feed::get_rss)
                .head(feed::head_rss)
                .options(feed::preflight),
        )
        .route(
            "/feed.json",
            get(feed::get_json_feed)
                .head(feed::head_json_feed)
                .options(feed::preflight),
        )
        .route("/feeds/validate", get(feed::validate))
        .route(
            "/sitemap.xml",
            get(sitemap::get_sitemap).head(sitemap::head_sitemap),
        )
        .route(
            "/robots.txt",
            get(robots::get_robots).head(robots::head_robots),
        )
        .route("/check", post(limit::check));

    if state.config.metrics.enabled {
        app = app.route(&state.config.metrics.path, get(metrics));
    }

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
