// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Feed generation.
//!
//! [`FeedService`] selects published posts through the content source,
//! projects them into [`FeedItem`]s and renders RSS 2.0 or JSON Feed 1.1.
//! Failures are reported as [`AppError`] and turned into feed-shaped error
//! documents by [`FeedService::error_document`], so readers always get a
//! parseable body.

pub mod access;
pub mod excerpt;
pub mod json;
pub mod rss;

use crate::clock::{Clock, SystemClock};
use crate::config::{FeedConfig, SiteConfig};
use crate::content::{with_timeout, Author, ContentSource, Post, PostFilter};
use crate::error::{AppError, Result};
use access::{AccessSink, FeedAccess};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Syndication format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    Rss,
    Json,
}

impl FeedKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rss => "rss",
            Self::Json => "json",
        }
    }

    /// Site-relative path the feed is served from.
    pub fn path(self) -> &'static str {
        match self {
            Self::Rss => "/rss",
            Self::Json => "/feed.json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Rss => "application/rss+xml; charset=utf-8",
            Self::Json => "application/feed+json; charset=utf-8",
        }
    }
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw query parameters as received on the feed routes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedParams {
    pub limit: Option<String>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub featured: Option<String>,
}

/// Immutable per-request feed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedQuery {
    pub kind: FeedKind,
    pub limit: Option<usize>,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub featured: bool,
}

impl FeedQuery {
    pub fn new(kind: FeedKind) -> Self {
        Self {
            kind,
            limit: None,
            category: None,
            tag: None,
            author: None,
            featured: false,
        }
    }

    /// Build from raw parameters. Unparseable values are ignored.
    pub fn from_params(kind: FeedKind, params: FeedParams) -> Self {
        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            kind,
            limit: params.limit.and_then(|l| l.trim().parse().ok()),
            category: non_empty(params.category),
            tag: non_empty(params.tag),
            author: non_empty(params.author),
            featured: params
                .featured
                .is_some_and(|f| matches!(f.trim(), "true" | "1" | "yes")),
        }
    }

    /// Effective item count: default when unset, clamped to `1..=max_items`.
    pub fn effective_limit(&self, settings: &FeedConfig) -> usize {
        let max = settings.max_items.max(1);
        self.limit.unwrap_or(settings.default_limit).clamp(1, max)
    }
}

/// Body carried by a feed item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemBody {
    Html(String),
    Text(String),
}

/// Read-only projection of a post for syndication.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedItem {
    pub id: String,
    pub url: String,
    pub title: String,
    pub body: ItemBody,
    pub summary: Option<String>,
    pub published_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub author: Option<Author>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

/// Channel-level metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub home_page_url: String,
    pub feed_url: String,
    pub language: String,
}

impl FeedMeta {
    pub fn for_site(site: &SiteConfig, kind: FeedKind) -> Self {
        Self {
            title: site.title.clone(),
            description: site.description.clone(),
            home_page_url: site.url_for("/"),
            feed_url: site.url_for(kind.path()),
            language: site.language.clone(),
        }
    }
}

/// A generated feed, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedDocument {
    pub kind: FeedKind,
    pub meta: FeedMeta,
    pub items: Vec<FeedItem>,
    /// Cache-Control max-age for this document
    pub cache_ttl_secs: u64,
    pub generated_at: DateTime<Utc>,
}

impl FeedDocument {
    /// RSS `<ttl>`, in whole minutes.
    pub fn ttl_minutes(&self) -> u64 {
        self.cache_ttl_secs / 60
    }

    pub fn render(&self) -> Result<String> {
        match self.kind {
            FeedKind::Rss => Ok(rss::render(self)),
            FeedKind::Json => json::render(self),
        }
    }
}

/// Outcome of [`FeedService::validate_feed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedValidation {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Feed generation service.
pub struct FeedService {
    site: SiteConfig,
    content: Arc<dyn ContentSource>,
    access: Arc<dyn AccessSink>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl FeedService {
    pub fn new(
        site: SiteConfig,
        content: Arc<dyn ContentSource>,
        access: Arc<dyn AccessSink>,
        timeout: Duration,
    ) -> Self {
        Self {
            site,
            content,
            access,
            clock: Arc::new(SystemClock),
            timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Current feed settings.
    pub async fn config(&self) -> Result<FeedConfig> {
        self.bounded(self.content.feed_settings())
            .await
            .map_err(|e| match e {
                AppError::Timeout(_) => e,
                other => AppError::ConfigUnavailable(other.to_string()),
            })
    }

    /// Select and project the posts for `query`.
    pub async fn generate(&self, query: &FeedQuery) -> Result<FeedDocument> {
        let settings = self.config().await?;
        if !settings.enabled {
            return Err(AppError::FeedDisabled);
        }

        let limit = query.effective_limit(&settings);
        let filter = PostFilter {
            limit,
            category: query.category.clone(),
            tag: query.tag.clone(),
            author: query.author.clone(),
            featured_only: query.featured,
        };

        let mut posts = self.bounded(self.content.published_posts(&filter)).await?;
        posts.retain(|p| p.published_at.is_some());
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts.truncate(limit);

        let items: Vec<FeedItem> = posts
            .iter()
            .filter_map(|p| self.item(p, &settings))
            .collect();

        debug!(kind = %query.kind, items = items.len(), limit, "Feed generated");

        Ok(FeedDocument {
            kind: query.kind,
            meta: FeedMeta::for_site(&self.site, query.kind),
            items,
            cache_ttl_secs: settings.cache_ttl_secs,
            generated_at: self.clock.now(),
        })
    }

    /// Render the error document for `err` in the requested format.
    pub async fn error_document(&self, kind: FeedKind, err: &AppError) -> String {
        let settings = match self.config().await {
            Ok(settings) => settings,
            Err(_) => FeedConfig::default(),
        };
        let description = match err {
            AppError::FeedDisabled => settings.error_description.clone(),
            other => format!("{} ({other})", settings.error_description),
        };
        let meta = FeedMeta::for_site(&self.site, kind);
        match kind {
            FeedKind::Rss => rss::render_error(&meta, &settings.error_title, &description, self.clock.now()),
            FeedKind::Json => json::render_error(&meta, &settings.error_title, &description),
        }
    }

    /// Record a feed fetch without waiting for it.
    pub fn record_access(&self, kind: FeedKind, raw_query: Option<String>, client_ip: String) {
        let access = FeedAccess {
            kind,
            query: raw_query.filter(|q| !q.is_empty()),
            client_ip,
            at: self.clock.now(),
        };
        let sink = Arc::clone(&self.access);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(err) = sink.record(access).await {
                        warn!(error = %err, "Failed to record feed access");
                    }
                });
            }
            Err(_) => debug!("No runtime available, feed access not recorded"),
        }
    }

    /// Generate the default feed of `kind` and check its structure.
    pub async fn validate_feed(&self, kind: FeedKind) -> FeedValidation {
        let errors = match self.generate(&FeedQuery::new(kind)).await {
            Ok(doc) => match kind {
                FeedKind::Rss => rss::validate(&doc),
                FeedKind::Json => json::validate(&doc),
            },
            Err(err) => vec![err.to_string()],
        };
        FeedValidation {
            valid: errors.is_empty(),
            errors,
        }
    }

    fn item(&self, post: &Post, settings: &FeedConfig) -> Option<FeedItem> {
        let published_at = post.published_at?;
        let summary = post
            .excerpt
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(str::to_string);

        let plain = excerpt::plain_text(&post.content);
        let body = if settings.include_content {
            if excerpt::char_len(&plain) <= settings.content_length {
                ItemBody::Html(post.content.clone())
            } else {
                ItemBody::Text(excerpt::truncate(&plain, settings.content_length))
            }
        } else {
            match &summary {
                Some(summary) => ItemBody::Text(summary.clone()),
                None => ItemBody::Text(excerpt::truncate(&plain, settings.content_length)),
            }
        };

        Some(FeedItem {
            id: post.id.clone(),
            url: self.site.url_for(&post.path()),
            title: post.title.clone(),
            body,
            summary,
            published_at,
            updated_at: post.updated_at,
            author: post.author.clone(),
            category: post.category.as_ref().map(|c| c.name.clone()),
            tags: post.tags.iter().map(|t| t.name.clone()).collect(),
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(self.timeout, fut).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{Category, ContentSnapshot, MemoryContent, Tag};
    use access::MemoryAccessLog;
    use chrono::TimeZone;

    fn post(id: &str, day: u32, content: &str) -> Post {
        Post {
            id: id.to_string(),
            slug: format!("post-{id}"),
            title: format!("Post <{id}> & more"),
            excerpt: None,
            content: content.to_string(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 2, day, 8, 30, 0).unwrap()),
            updated_at: None,
            author: Some(Author {
                name: "Ada".to_string(),
                email: Some("ada@example.com".to_string()),
                url: None,
            }),
            category: Some(Category {
                slug: "tech".to_string(),
                name: "Tech".to_string(),
                updated_at: None,
            }),
            tags: vec![Tag {
                slug: "rust".to_string(),
                name: "Rust".to_string(),
            }],
            featured: day % 2 == 0,
        }
    }

    fn service(posts: Vec<Post>, settings: FeedConfig) -> (FeedService, Arc<MemoryAccessLog>) {
        let content = Arc::new(MemoryContent::from_snapshot(
            ContentSnapshot {
                posts,
                ..Default::default()
            },
            settings,
        ));
        let log = Arc::new(MemoryAccessLog::new(10));
        let site = SiteConfig {
            base_url: "https://blog.example.com".to_string(),
            ..Default::default()
        };
        let svc = FeedService::new(site, content, log.clone(), Duration::from_secs(1));
        (svc, log)
    }

    #[test]
    fn test_query_from_params() {
        let query = FeedQuery::from_params(
            FeedKind::Rss,
            FeedParams {
                limit: Some("abc".to_string()),
                category: Some("  ".to_string()),
                tag: Some("rust".to_string()),
                author: None,
                featured: Some("1".to_string()),
            },
        );
        assert_eq!(query.limit, None);
        assert_eq!(query.category, None);
        assert_eq!(query.tag.as_deref(), Some("rust"));
        assert!(query.featured);
    }

    #[test]
    fn test_effective_limit_clamps() {
        let settings = FeedConfig::default();
        let mut query = FeedQuery::new(FeedKind::Json);
        assert_eq!(query.effective_limit(&settings), 20);
        query.limit = Some(1000);
        assert_eq!(query.effective_limit(&settings), 20);
        query.limit = Some(0);
        assert_eq!(query.effective_limit(&settings), 1);
    }

    #[tokio::test]
    async fn test_disabled_feed_errors() {
        let settings = FeedConfig {
            enabled: false,
            ..Default::default()
        };
        let (svc, _) = service(vec![post("1", 1, "<p>x</p>")], settings);
        let err = svc.generate(&FeedQuery::new(FeedKind::Rss)).await.unwrap_err();
        assert!(matches!(err, AppError::FeedDisabled));

        let body = svc.error_document(FeedKind::Rss, &err).await;
        assert!(body.contains("<title>Feed Unavailable</title>"));
    }

    #[tokio::test]
    async fn test_excerpt_vs_content() {
        let long = format!("<p>{}</p>", "word ".repeat(200));
        let mut with_excerpt = post("1", 1, &long);
        with_excerpt.excerpt = Some("Short summary".to_string());
        let short = post("2", 2, "<p>tiny <em>body</em></p>");

        let (svc, _) = service(vec![with_excerpt.clone(), short.clone()], FeedConfig::default());
        let doc = svc.generate(&FeedQuery::new(FeedKind::Json)).await.unwrap();
        let by_id = |id: &str| doc.items.iter().find(|i| i.id == id).unwrap().body.clone();
        assert_eq!(by_id("1"), ItemBody::Text("Short summary".to_string()));
        assert_eq!(by_id("2"), ItemBody::Text("tiny body".to_string()));

        let settings = FeedConfig {
            include_content: true,
            content_length: 50,
            ..Default::default()
        };
        let (svc, _) = service(vec![with_excerpt, short], settings);
        let doc = svc.generate(&FeedQuery::new(FeedKind::Json)).await.unwrap();
        let by_id = |id: &str| doc.items.iter().find(|i| i.id == id).unwrap().body.clone();
        match by_id("1") {
            ItemBody::Text(text) => {
                assert!(text.ends_with("..."));
                assert!(excerpt::char_len(&text) <= 53);
            }
            other => panic!("expected truncated text, got {other:?}"),
        }
        assert_eq!(by_id("2"), ItemBody::Html("<p>tiny <em>body</em></p>".to_string()));
    }

    #[tokio::test]
    async fn test_rss_escapes_and_parses() {
        let (svc, _) = service(vec![post("1", 1, "<p>a</p>"), post("2", 3, "<p>b</p>")], FeedConfig::default());
        let doc = svc.generate(&FeedQuery::new(FeedKind::Rss)).await.unwrap();
        let xml = doc.render().unwrap();
        assert!(xml.contains("Post &lt;2&gt; &amp; more"));

        let channel = ::rss::Channel::read_from(xml.as_bytes()).unwrap();
        let titles: Vec<_> = channel.items().iter().filter_map(|i| i.title()).collect();
        assert_eq!(titles, vec!["Post <2> & more", "Post <1> & more"]);
        let first = &channel.items()[0];
        assert_eq!(first.link(), Some("https://blog.example.com/posts/post-2"));
        assert_eq!(first.author(), Some("ada@example.com (Ada)"));
        assert_eq!(first.pub_date(), Some("Mon, 03 Feb 2025 08:30:00 GMT"));
        let cats: Vec<_> = first.categories().iter().map(|c| c.name()).collect();
        assert_eq!(cats, vec!["Tech", "Rust"]);
    }

    #[tokio::test]
    async fn test_json_feed_shape() {
        let (svc, _) = service(vec![post("1", 1, "<p>a</p>")], FeedConfig::default());
        let doc = svc.generate(&FeedQuery::new(FeedKind::Json)).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&doc.render().unwrap()).unwrap();

        assert_eq!(value["version"], json::VERSION);
        assert_eq!(value["feed_url"], "https://blog.example.com/feed.json");
        assert_eq!(value["home_page_url"], "https://blog.example.com/");
        let item = &value["items"][0];
        assert_eq!(item["id"], "1");
        assert_eq!(item["date_published"], "2025-02-01T08:30:00Z");
        assert_eq!(item["content_text"], "a");
        assert!(item.get("content_html").is_none());
        assert_eq!(item["tags"][0], "Rust");
        assert_eq!(item["authors"][0]["name"], "Ada");
        assert!(value.get("expired").is_none());
    }

    #[tokio::test]
    async fn test_validate_feed() {
        let (svc, _) = service(vec![post("1", 1, "<p>a</p>")], FeedConfig::default());
        let rss = svc.validate_feed(FeedKind::Rss).await;
        assert!(rss.valid, "{:?}", rss.errors);
        let json = svc.validate_feed(FeedKind::Json).await;
        assert!(json.valid, "{:?}", json.errors);

        let (svc, _) = service(vec![], FeedConfig { enabled: false, ..Default::default() });
        let result = svc.validate_feed(FeedKind::Rss).await;
        assert!(!result.valid);
        assert_eq!(result.errors, vec!["Feeds are currently disabled".to_string()]);
    }

    #[tokio::test]
    async fn test_record_access_is_detached() {
        let (svc, log) = service(vec![], FeedConfig::default());
        svc.record_access(FeedKind::Json, Some("limit=5".to_string()), "10.0.0.1".to_string());
        svc.record_access(FeedKind::Rss, Some(String::new()), "10.0.0.2".to_string());

        for _ in 0..50 {
            if log.recent().await.len() == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        let recent = log.recent().await;
        assert_eq!(recent.len(), 2);
        assert!(recent.iter().any(|a| a.query.as_deref() == Some("limit=5")));
        assert!(recent.iter().any(|a| a.kind == FeedKind::Rss && a.query.is_none()));
    }
}
