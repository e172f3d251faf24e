// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the syndication service.
//!
//! Every section deserializes with per-field defaults so a partial config
//! (or none at all) yields a working service. [`Config::from_env`] layers
//! environment variables over those defaults.

use crate::limiter::Action;
use crate::sitemap::ChangeFreq;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Deployment environment. Drives robots.txt strictness and cache headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
        }
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" | "local" | "preview" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment: {other}")),
        }
    }
}

/// Configuration for the syndication service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default)]
    pub environment: Environment,

    #[serde(default)]
    pub site: SiteConfig,

    /// Optional JSON file seeding the in-memory content store
    #[serde(default)]
    pub content_file: Option<String>,

    /// Upper bound on any single content query (default: 5000ms)
    #[serde(default = "default_content_timeout_ms")]
    pub content_timeout_ms: u64,

    #[serde(default)]
    pub feed: FeedConfig,

    #[serde(default)]
    pub sitemap: SitemapConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Public identity of the site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Absolute base URL, no trailing slash required
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_site_title")]
    pub title: String,

    #[serde(default = "default_site_description")]
    pub description: String,

    #[serde(default = "default_language")]
    pub language: String,
}

/// Feed settings. Stored alongside content in the CMS; these values seed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Hard cap on items per feed (default: 20)
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Items returned when no limit is requested (default: 20)
    #[serde(default = "default_max_items")]
    pub default_limit: usize,

    /// Include post bodies rather than excerpts (default: false)
    #[serde(default)]
    pub include_content: bool,

    /// Plain-text length bodies are truncated to (default: 500)
    #[serde(default = "default_content_length")]
    pub content_length: usize,

    /// Cache-Control max-age for successful feed responses (default: 1800)
    #[serde(default = "default_feed_cache_ttl")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_error_title")]
    pub error_title: String,

    #[serde(default = "default_error_description")]
    pub error_description: String,
}

/// Priority/change-frequency pair applied to one class of page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRule {
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

/// A fixed page that always appears in the sitemap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticPage {
    pub path: String,
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

/// Sitemap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SitemapConfig {
    /// URLs per sitemap file, also the protocol ceiling (default: 50000)
    #[serde(default = "default_urls_per_sitemap")]
    pub urls_per_sitemap: usize,

    #[serde(default = "default_static_pages")]
    pub static_pages: Vec<StaticPage>,

    #[serde(default = "default_post_rule")]
    pub posts: PageRule,

    #[serde(default = "default_category_rule")]
    pub categories: PageRule,

    #[serde(default = "default_tag_rule")]
    pub tags: PageRule,

    /// Alternate languages emitted as hreflang links (default: none)
    #[serde(default)]
    pub languages: Vec<String>,
}

/// Behaviour when the counter store itself fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Allow the request
    Open,
    /// Deny the request
    #[default]
    Closed,
}

impl FromStr for FailureMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("unknown failure mode: {other}")),
        }
    }
}

/// Fixed-window policy: at most `max` requests per `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPolicy {
    pub max: u32,
    pub window_secs: u64,
}

impl RateLimitPolicy {
    /// Longest accepted window: one year.
    pub const MAX_WINDOW_SECS: u64 = 366 * 24 * 60 * 60;

    pub const fn new(max: u32, window_secs: u64) -> Self {
        Self { max, window_secs }
    }
}

/// Per-action rate limiting configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub failure_mode: FailureMode,

    /// Interval between expired-bucket sweeps (default: 60)
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default = "default_auth_policy")]
    pub auth: RateLimitPolicy,

    #[serde(default = "default_comment_policy")]
    pub comment: RateLimitPolicy,

    #[serde(default = "default_like_policy")]
    pub like: RateLimitPolicy,

    #[serde(default = "default_search_policy")]
    pub search: RateLimitPolicy,

    #[serde(default = "default_upload_policy")]
    pub upload: RateLimitPolicy,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_site_title() -> String {
    "My Blog".to_string()
}

fn default_site_description() -> String {
    "Personal blog".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_content_timeout_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

fn default_max_items() -> usize {
    20
}

fn default_content_length() -> usize {
    500
}

fn default_feed_cache_ttl() -> u64 {
    1800
}

fn default_error_title() -> String {
    "Feed Unavailable".to_string()
}

fn default_error_description() -> String {
    "This feed is temporarily unavailable. Please try again later.".to_string()
}

fn default_urls_per_sitemap() -> usize {
    50_000
}

fn default_static_pages() -> Vec<StaticPage> {
    [
        ("/", ChangeFreq::Daily, 1.0),
        ("/posts", ChangeFreq::Daily, 0.9),
        ("/about", ChangeFreq::Monthly, 0.7),
        ("/categories", ChangeFreq::Weekly, 0.6),
        ("/tags", ChangeFreq::Weekly, 0.5),
    ]
    .into_iter()
    .map(|(path, changefreq, priority)| StaticPage {
        path: path.to_string(),
        changefreq,
        priority,
    })
    .collect()
}

fn default_post_rule() -> PageRule {
    PageRule {
        changefreq: ChangeFreq::Weekly,
        priority: 0.8,
    }
}

fn default_category_rule() -> PageRule {
    PageRule {
        changefreq: ChangeFreq::Weekly,
        priority: 0.6,
    }
}

fn default_tag_rule() -> PageRule {
    PageRule {
        changefreq: ChangeFreq::Monthly,
        priority: 0.4,
    }
}

fn default_sweep_secs() -> u64 {
    60
}

fn default_auth_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(5, 900)
}

fn default_comment_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(5, 60)
}

fn default_like_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(30, 60)
}

fn default_search_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(30, 60)
}

fn default_upload_policy() -> RateLimitPolicy {
    RateLimitPolicy::new(10, 3600)
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            environment: Environment::default(),
            site: SiteConfig::default(),
            content_file: None,
            content_timeout_ms: default_content_timeout_ms(),
            feed: FeedConfig::default(),
            sitemap: SitemapConfig::default(),
            rate_limit: RateLimitConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            title: default_site_title(),
            description: default_site_description(),
            language: default_language(),
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_items: default_max_items(),
            default_limit: default_max_items(),
            include_content: false,
            content_length: default_content_length(),
            cache_ttl_secs: default_feed_cache_ttl(),
            error_title: default_error_title(),
            error_description: default_error_description(),
        }
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            urls_per_sitemap: default_urls_per_sitemap(),
            static_pages: default_static_pages(),
            posts: default_post_rule(),
            categories: default_category_rule(),
            tags: default_tag_rule(),
            languages: Vec::new(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            failure_mode: FailureMode::default(),
            sweep_interval_secs: default_sweep_secs(),
            auth: default_auth_policy(),
            comment: default_comment_policy(),
            like: default_like_policy(),
            search: default_search_policy(),
            upload: default_upload_policy(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl RateLimitConfig {
    /// Policy configured for an action class.
    pub fn policy(&self, action: Action) -> RateLimitPolicy {
        match action {
            Action::Auth => self.auth,
            Action::Comment => self.comment,
            Action::Like => self.like,
            Action::Search => self.search,
            Action::Upload => self.upload,
        }
    }

    fn policy_mut(&mut self, action: Action) -> &mut RateLimitPolicy {
        match action {
            Action::Auth => &mut self.auth,
            Action::Comment => &mut self.comment,
            Action::Like => &mut self.like,
            Action::Search => &mut self.search,
            Action::Upload => &mut self.upload,
        }
    }

    /// Sweep period, at least one second.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl SiteConfig {
    /// Base URL without a trailing slash.
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Absolute URL for a site-relative path.
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base(), path)
        } else {
            format!("{}/{}", self.base(), path)
        }
    }
}

impl Config {
    pub fn content_timeout(&self) -> Duration {
        Duration::from_millis(self.content_timeout_ms)
    }

    /// Load configuration from environment variables over defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(v) = lookup("BIND_ADDR") {
            config.bind_addr = v;
        }
        if let Some(env) = parse_var(&lookup, "APP_ENV") {
            config.environment = env;
        }
        if let Some(v) = lookup("SITE_URL") {
            config.site.base_url = v;
        }
        if let Some(v) = lookup("SITE_TITLE") {
            config.site.title = v;
        }
        if let Some(v) = lookup("SITE_DESCRIPTION") {
            config.site.description = v;
        }
        if let Some(v) = lookup("SITE_LANGUAGE") {
            config.site.language = v;
        }
        config.content_file = lookup("CONTENT_FILE").filter(|v| !v.trim().is_empty());
        if let Some(v) = parse_var(&lookup, "CONTENT_TIMEOUT_MS") {
            config.content_timeout_ms = v;
        }

        if let Some(v) = parse_var(&lookup, "FEED_ENABLED") {
            config.feed.enabled = v;
        }
        if let Some(v) = parse_var(&lookup, "FEED_MAX_ITEMS") {
            config.feed.max_items = v;
            config.feed.default_limit = config.feed.default_limit.min(v);
        }
        if let Some(v) = parse_var(&lookup, "FEED_INCLUDE_CONTENT") {
            config.feed.include_content = v;
        }
        if let Some(v) = parse_var(&lookup, "FEED_CONTENT_LENGTH") {
            config.feed.content_length = v;
        }
        if let Some(v) = parse_var(&lookup, "FEED_CACHE_TTL") {
            config.feed.cache_ttl_secs = v;
        }

        if let Some(v) = lookup("SITEMAP_LANGUAGES") {
            config.sitemap.languages = v
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
        }

        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_FAILURE_MODE") {
            config.rate_limit.failure_mode = v;
        }
        if let Some(v) = parse_var(&lookup, "RATE_LIMIT_SWEEP_SECS") {
            config.rate_limit.sweep_interval_secs = v;
        }
        for action in Action::ALL {
            let prefix = format!("RATE_LIMIT_{}", action.as_str().to_ascii_uppercase());
            let policy = config.rate_limit.policy_mut(action);
            if let Some(max) = parse_var(&lookup, &format!("{prefix}_MAX")) {
                policy.max = max;
            }
            let key = format!("{prefix}_WINDOW");
            if let Some(window) = parse_var::<_, u64>(&lookup, &key) {
                if (1..=RateLimitPolicy::MAX_WINDOW_SECS).contains(&window) {
                    policy.window_secs = window;
                } else {
                    warn!(
                        key = %key,
                        value = window,
                        max = RateLimitPolicy::MAX_WINDOW_SECS,
                        "Ignoring out-of-range rate limit window"
                    );
                }
            }
        }

        if let Some(v) = parse_var(&lookup, "METRICS_ENABLED") {
            config.metrics.enabled = v;
        }

        config
    }
}

/// Parse a variable, warning and falling back to the default on bad input.
fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable configuration value");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Production);
        assert!(config.feed.enabled);
        assert_eq!(config.feed.max_items, 20);
        assert_eq!(config.feed.content_length, 500);
        assert_eq!(config.sitemap.urls_per_sitemap, 50_000);
        assert_eq!(config.rate_limit.failure_mode, FailureMode::Closed);
        assert_eq!(config.rate_limit.policy(Action::Auth), RateLimitPolicy::new(5, 900));
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("APP_ENV", "development"),
            ("SITE_URL", "https://blog.example.com/"),
            ("FEED_ENABLED", "false"),
            ("FEED_MAX_ITEMS", "10"),
            ("RATE_LIMIT_COMMENT_MAX", "3"),
            ("RATE_LIMIT_COMMENT_WINDOW", "120"),
            ("RATE_LIMIT_FAILURE_MODE", "open"),
            ("SITEMAP_LANGUAGES", "en, fr,,de"),
        ]));

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.site.base(), "https://blog.example.com");
        assert!(!config.feed.enabled);
        assert_eq!(config.feed.max_items, 10);
        assert_eq!(config.feed.default_limit, 10);
        assert_eq!(config.rate_limit.policy(Action::Comment), RateLimitPolicy::new(3, 120));
        assert_eq!(config.rate_limit.failure_mode, FailureMode::Open);
        assert_eq!(config.sitemap.languages, vec!["en", "fr", "de"]);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = Config::from_lookup(lookup_from(&[
            ("FEED_MAX_ITEMS", "lots"),
            ("APP_ENV", "staging-ish"),
        ]));
        assert_eq!(config.feed.max_items, 20);
        assert_eq!(config.environment, Environment::Production);
    }

    #[test]
    fn test_out_of_range_window_keeps_default() {
        let config = Config::from_lookup(lookup_from(&[
            ("RATE_LIMIT_COMMENT_WINDOW", "1000000000000000"),
            ("RATE_LIMIT_AUTH_WINDOW", "0"),
            ("RATE_LIMIT_UPLOAD_WINDOW", "31622400"),
        ]));
        assert_eq!(config.rate_limit.comment.window_secs, 60);
        assert_eq!(config.rate_limit.auth.window_secs, 900);
        assert_eq!(
            config.rate_limit.upload.window_secs,
            RateLimitPolicy::MAX_WINDOW_SECS
        );
    }

    #[test]
    fn test_url_for() {
        let site = SiteConfig {
            base_url: "https://example.com/".to_string(),
            ..Default::default()
        };
        assert_eq!(site.url_for("/posts/a"), "https://example.com/posts/a");
        assert_eq!(site.url_for("rss"), "https://example.com/rss");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"environment":"development","feed":{"max_items":5}}"#)
                .unwrap();
        assert!(config.environment.is_development());
        assert_eq!(config.feed.max_items, 5);
        assert_eq!(config.feed.content_length, 500);
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
    }
}
