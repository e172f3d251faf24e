// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Content source port.
//!
//! Posts, categories and tags are owned by the blog's persistence layer.
//! Feeds and sitemaps only read projections of them through
//! [`ContentSource`]. [`MemoryContent`] is the in-process implementation,
//! seeded from a JSON snapshot.

use crate::config::FeedConfig;
use crate::error::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub slug: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    /// Rendered HTML body
    #[serde(default)]
    pub content: String,
    /// Unset for drafts
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub featured: bool,
}

impl Post {
    /// Site-relative path of the post page.
    pub fn path(&self) -> String {
        format!("/posts/{}", self.slug)
    }

    /// Most recent modification, falling back to the publish date.
    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.updated_at.or(self.published_at)
    }

    fn in_category(&self, wanted: &str) -> bool {
        self.category.as_ref().is_some_and(|c| {
            c.slug.eq_ignore_ascii_case(wanted) || c.name.eq_ignore_ascii_case(wanted)
        })
    }

    fn has_tag(&self, wanted: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.slug.eq_ignore_ascii_case(wanted) || t.name.eq_ignore_ascii_case(wanted))
    }

    fn by_author(&self, wanted: &str) -> bool {
        self.author.as_ref().is_some_and(|a| {
            a.name.eq_ignore_ascii_case(wanted)
                || a.email.as_deref().is_some_and(|e| e.eq_ignore_ascii_case(wanted))
        })
    }
}

impl Category {
    pub fn path(&self) -> String {
        format!("/categories/{}", self.slug)
    }
}

impl Tag {
    pub fn path(&self) -> String {
        format!("/tags/{}", self.slug)
    }
}

/// Selection of published posts, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub limit: usize,
    pub category: Option<String>,
    pub tag: Option<String>,
    pub author: Option<String>,
    pub featured_only: bool,
}

impl PostFilter {
    pub fn matches(&self, post: &Post) -> bool {
        post.published_at.is_some()
            && self.category.as_deref().map_or(true, |c| post.in_category(c))
            && self.tag.as_deref().map_or(true, |t| post.has_tag(t))
            && self.author.as_deref().map_or(true, |a| post.by_author(a))
            && (!self.featured_only || post.featured)
    }
}

/// Sizes used to estimate the sitemap URL count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ContentCounts {
    pub posts: usize,
    pub categories: usize,
    pub tags: usize,
}

/// Read access to blog content.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Feed settings as currently stored.
    async fn feed_settings(&self) -> Result<FeedConfig>;

    /// Published posts matching `filter`, newest first, at most `filter.limit`.
    async fn published_posts(&self, filter: &PostFilter) -> Result<Vec<Post>>;

    /// Every published post, newest first.
    async fn all_published(&self) -> Result<Vec<Post>>;

    async fn categories(&self) -> Result<Vec<Category>>;

    async fn tags(&self) -> Result<Vec<Tag>>;

    async fn counts(&self) -> Result<ContentCounts>;
}

/// Run a content query under `timeout`, mapping expiry to [`AppError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(?timeout, "Content query timed out");
            Err(AppError::Timeout(timeout))
        }
    }
}

/// JSON layout accepted by [`MemoryContent::load_json`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentSnapshot {
    #[serde(default)]
    pub posts: Vec<Post>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// In-memory content store.
pub struct MemoryContent {
    snapshot: RwLock<ContentSnapshot>,
    settings: RwLock<FeedConfig>,
}

impl MemoryContent {
    pub fn new(settings: FeedConfig) -> Self {
        Self::from_snapshot(ContentSnapshot::default(), settings)
    }

    pub fn from_snapshot(snapshot: ContentSnapshot, settings: FeedConfig) -> Self {
        Self {
            snapshot: RwLock::new(snapshot),
            settings: RwLock::new(settings),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn load_json(path: impl AsRef<Path>, settings: FeedConfig) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Content(format!("{}: {e}", path.display())))?;
        let snapshot: ContentSnapshot = serde_json::from_str(&raw)?;
        info!(
            path = %path.display(),
            posts = snapshot.posts.len(),
            "Loaded content snapshot"
        );
        Ok(Self::from_snapshot(snapshot, settings))
    }

    pub async fn insert_post(&self, post: Post) {
        self.snapshot.write().await.posts.push(post);
    }

    pub async fn set_feed_settings(&self, settings: FeedConfig) {
        *self.settings.write().await = settings;
    }

    async fn published_sorted(&self) -> Vec<Post> {
        let snapshot = self.snapshot.read().await;
        let mut posts: Vec<Post> = snapshot
            .posts
            .iter()
            .filter(|p| p.published_at.is_some())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        posts
    }
}

#[async_trait]
impl ContentSource for MemoryContent {
    async fn feed_settings(&self) -> Result<FeedConfig> {
        Ok(self.settings.read().await.clone())
    }

    async fn published_posts(&self, filter: &PostFilter) -> Result<Vec<Post>> {
        Ok(self
            .published_sorted()
            .await
            .into_iter()
            .filter(|p| filter.matches(p))
            .take(filter.limit)
            .collect())
    }

    async fn all_published(&self) -> Result<Vec<Post>> {
        Ok(self.published_sorted().await)
    }

    async fn categories(&self) -> Result<Vec<Category>> {
        let snapshot = self.snapshot.read().await;
        let mut seen = HashSet::new();
        let declared = snapshot.categories.iter();
        let referenced = snapshot
            .posts
            .iter()
            .filter(|p| p.published_at.is_some())
            .filter_map(|p| p.category.as_ref());
        Ok(declared
            .chain(referenced)
            .filter(|c| seen.insert(c.slug.clone()))
            .cloned()
            .collect())
    }

    async fn tags(&self) -> Result<Vec<Tag>> {
        let snapshot = self.snapshot.read().await;
        let mut seen = HashSet::new();
        let declared = snapshot.tags.iter();
        let referenced = snapshot
            .posts
            .iter()
            .filter(|p| p.published_at.is_some())
            .flat_map(|p| p.tags.iter());
        Ok(declared
            .chain(referenced)
            .filter(|t| seen.insert(t.slug.clone()))
            .cloned()
            .collect())
    }

    async fn counts(&self) -> Result<ContentCounts> {
        Ok(ContentCounts {
            posts: self.published_sorted().await.len(),
            categories: self.categories().await?.len(),
            tags: self.tags().await?.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn post(id: &str, day: u32, category: &str) -> Post {
        Post {
            id: id.to_string(),
            slug: id.to_string(),
            title: format!("Post {id}"),
            excerpt: None,
            content: String::new(),
            published_at: Some(Utc.with_ymd_and_hms(2025, 1, day, 9, 0, 0).unwrap()),
            updated_at: None,
            author: None,
            category: Some(Category {
                slug: category.to_string(),
                name: category.to_uppercase(),
                updated_at: None,
            }),
            tags: vec![],
            featured: false,
        }
    }

    #[tokio::test]
    async fn test_filter_orders_newest_first() {
        let mut draft = post("draft", 9, "tech");
        draft.published_at = None;
        let store = MemoryContent::from_snapshot(
            ContentSnapshot {
                posts: vec![post("a", 1, "tech"), post("b", 3, "life"), post("c", 2, "tech"), draft],
                ..Default::default()
            },
            FeedConfig::default(),
        );

        let filter = PostFilter {
            limit: 10,
            category: Some("TECH".to_string()),
            ..Default::default()
        };
        let ids: Vec<String> = store
            .published_posts(&filter)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_categories_are_deduplicated() {
        let store = MemoryContent::from_snapshot(
            ContentSnapshot {
                posts: vec![post("a", 1, "tech"), post("b", 2, "tech"), post("c", 3, "life")],
                ..Default::default()
            },
            FeedConfig::default(),
        );
        let counts = store.counts().await.unwrap();
        assert_eq!(counts, ContentCounts { posts: 3, categories: 2, tags: 0 });
    }

    #[test]
    fn test_snapshot_json() {
        let snapshot: ContentSnapshot = serde_json::from_str(
            r#"{"posts":[{"id":"1","slug":"hello","title":"Hello","published_at":"2025-01-01T00:00:00Z"}]}"#,
        )
        .unwrap();
        assert_eq!(snapshot.posts[0].path(), "/posts/hello");
        assert!(snapshot.posts[0].published_at.is_some());
    }
}
