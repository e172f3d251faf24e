// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Blog Syndication Edge
//!
//! Serves the machine-facing surface of a personal blog and rate limits
//! its interactive actions.
//!
//! ## Routes
//!
//! - `GET|HEAD|OPTIONS /rss`, `/feed.json`: RSS 2.0 and JSON Feed 1.1
//! - `GET /feeds/validate?type=rss|json`: structural feed check
//! - `GET|HEAD /sitemap.xml`: sitemap, shard (`?page=N`) or index
//! - `GET|HEAD /robots.txt`: per-environment robots rules
//! - `POST /check`: rate limit decision for an external proxy
//! - `GET /health`, `GET /metrics`
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (and `.env`):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `APP_ENV`: `development` or `production` (default: production)
//! - `SITE_URL`: Absolute base URL of the blog
//! - `CONTENT_FILE`: JSON snapshot of posts, categories and tags
//! - `RATE_LIMIT_<ACTION>_MAX` / `RATE_LIMIT_<ACTION>_WINDOW`: per-action policy

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use blog_syndication::{
    config::Config,
    content::{ContentSource, MemoryContent},
    handlers::{router, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        environment = config.environment.as_str(),
        site = %config.site.base(),
        failure_mode = ?config.rate_limit.failure_mode,
        "Starting blog syndication service"
    );

    let content: Arc<dyn ContentSource> = match &config.content_file {
        Some(path) => Arc::new(MemoryContent::load_json(path, config.feed.clone())?),
        None => {
            info!("No CONTENT_FILE set, serving an empty content store");
            Arc::new(MemoryContent::new(config.feed.clone()))
        }
    };

    let state = Arc::new(AppState::new(config.clone(), content)?);

    // Spawn sweep task
    let sweep_state = state.clone();
    let sweep_every = config.rate_limit.sweep_interval();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            sweep_state.limiter.sweep().await;
        }
    });

    let app = router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
