// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Blog Syndication Edge
//!
//! This crate serves the machine-facing surface of a personal blog:
//!
//! - RSS 2.0 and JSON Feed 1.1 documents built from published posts
//! - Sitemap XML (flat, paginated, or as a sitemap index past 50,000 URLs)
//! - robots.txt generation per environment and crawler, with a parser for
//!   the JSON debug view
//! - Fixed-window rate limiting keyed by (action, client) for the
//!   interactive endpoints (auth, comment, like, search, upload)
//!
//! Consumers of feeds and sitemaps always receive a parseable document of
//! the expected MIME type, even when generation fails.

pub mod client;
pub mod clock;
pub mod config;
pub mod content;
pub mod error;
pub mod feed;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod robots;
pub mod sitemap;
pub mod xml;

pub use config::{Config, Environment};
pub use error::{AppError, Result};
pub use feed::{FeedDocument, FeedKind, FeedQuery, FeedService};
pub use limiter::{Action, RateLimitDecision, RateLimitPolicy, RateLimiter};
pub use robots::{ParsedRobots, RobotsRuleSet};
pub use sitemap::{SitemapEntry, SitemapService};
