// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sitemap generation.
//!
//! The URL set is assembled from configured static pages and published
//! content, de-duplicated by `loc`. Sites estimated above the per-file
//! ceiling (50,000 URLs by default) are served as a sitemap index whose
//! entries point at `?page=N` shards.

pub mod render;

use crate::clock::{Clock, SystemClock};
use crate::config::{PageRule, SiteConfig, SitemapConfig};
use crate::content::{with_timeout, ContentSource};
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// `<changefreq>` values defined by the sitemap protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alternate-language version of a URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternate {
    pub hreflang: String,
    pub href: String,
}

/// One `<url>` of a sitemap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapEntry {
    pub loc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lastmod: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changefreq: Option<ChangeFreq>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<Alternate>,
}

impl SitemapEntry {
    pub fn new(loc: impl Into<String>) -> Self {
        Self {
            loc: loc.into(),
            lastmod: None,
            changefreq: None,
            priority: None,
            alternates: Vec::new(),
        }
    }

    /// Set `lastmod` as an ISO date.
    pub fn lastmod(mut self, at: Option<DateTime<Utc>>) -> Self {
        self.lastmod = at.map(|t| t.format("%Y-%m-%d").to_string());
        self
    }

    pub fn changefreq(mut self, changefreq: ChangeFreq) -> Self {
        self.changefreq = Some(changefreq);
        self
    }

    /// Set the priority, clamped to `[0.0, 1.0]`. NaN clears it.
    pub fn priority(mut self, priority: f32) -> Self {
        self.priority = if priority.is_nan() {
            None
        } else {
            Some(priority.clamp(0.0, 1.0))
        };
        self
    }

    fn rule(self, rule: &PageRule) -> Self {
        self.changefreq(rule.changefreq).priority(rule.priority)
    }
}

/// Options for [`SitemapService::generate_sitemap`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SitemapOptions {
    /// Overrides the configured site URL
    pub base_url: Option<String>,
    /// 1-based shard number
    pub page: usize,
    /// URLs per shard; capped at the configured ceiling
    pub limit: Option<usize>,
}

/// URL count estimate and derived layout.
///
/// Counts are taken before de-duplication, so `estimated_urls` (and
/// `shards`) are an upper bound: a static page that shares a path with a
/// content page is counted twice. A shard past the real end renders as an
/// empty `<urlset>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SitemapStats {
    pub estimated_urls: usize,
    pub static_pages: usize,
    pub posts: usize,
    pub categories: usize,
    pub tags: usize,
    pub urls_per_sitemap: usize,
    pub shards: usize,
    pub needs_index: bool,
}

/// What a `/sitemap.xml` request resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapPlan {
    Index { shards: usize },
    Shard { page: usize, limit: usize },
}

/// One shard of entries plus the total they were cut from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapPage {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub urls: Vec<SitemapEntry>,
}

/// Sitemap generation service.
pub struct SitemapService {
    site: SiteConfig,
    config: SitemapConfig,
    content: Arc<dyn ContentSource>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
}

impl SitemapService {
    pub fn new(
        site: SiteConfig,
        config: SitemapConfig,
        content: Arc<dyn ContentSource>,
        timeout: Duration,
    ) -> Self {
        Self {
            site,
            config,
            content,
            clock: Arc::new(SystemClock),
            timeout,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn base_url(&self) -> &str {
        self.site.base()
    }

    fn ceiling(&self) -> usize {
        self.config.urls_per_sitemap.max(1)
    }

    /// Estimate the URL count without building entries.
    pub async fn stats(&self) -> Result<SitemapStats> {
        let counts = with_timeout(self.timeout, self.content.counts()).await?;
        let static_pages = self.config.static_pages.len();
        let estimated_urls = static_pages + counts.posts + counts.categories + counts.tags;
        let per = self.ceiling();

        Ok(SitemapStats {
            estimated_urls,
            static_pages,
            posts: counts.posts,
            categories: counts.categories,
            tags: counts.tags,
            urls_per_sitemap: per,
            shards: estimated_urls.div_ceil(per).max(1),
            needs_index: estimated_urls > per,
        })
    }

    /// Decide between an index and a shard.
    ///
    /// Only a request without an explicit `page` can become an index.
    pub async fn plan(&self, page: Option<usize>, limit: Option<usize>) -> Result<SitemapPlan> {
        let limit = limit.unwrap_or(self.ceiling()).clamp(1, self.ceiling());
        match page {
            Some(page) => Ok(SitemapPlan::Shard {
                page: page.max(1),
                limit,
            }),
            None => {
                let stats = self.stats().await?;
                if stats.needs_index {
                    Ok(SitemapPlan::Index {
                        shards: stats.shards,
                    })
                } else {
                    Ok(SitemapPlan::Shard { page: 1, limit })
                }
            }
        }
    }

    /// Every URL of the site, de-duplicated by `loc`, first occurrence kept.
    pub async fn entries(&self, base_url: &str) -> Result<Vec<SitemapEntry>> {
        let base = base_url.trim_end_matches('/');
        let posts = with_timeout(self.timeout, self.content.all_published()).await?;
        let categories = with_timeout(self.timeout, self.content.categories()).await?;
        let tags = with_timeout(self.timeout, self.content.tags()).await?;

        let newest = posts.iter().filter_map(|p| p.last_modified()).max();

        let statics = self.config.static_pages.iter().map(|page| {
            let entry = SitemapEntry::new(join(base, &page.path))
                .lastmod(newest)
                .changefreq(page.changefreq)
                .priority(page.priority);
            (entry, page.path.clone())
        });
        let posts = posts.iter().map(|post| {
            let path = post.path();
            let entry = SitemapEntry::new(join(base, &path))
                .lastmod(post.last_modified())
                .rule(&self.config.posts);
            (entry, path)
        });
        let categories = categories.iter().map(|category| {
            let path = category.path();
            let entry = SitemapEntry::new(join(base, &path))
                .lastmod(category.updated_at)
                .rule(&self.config.categories);
            (entry, path)
        });
        let tags = tags.iter().map(|tag| {
            let path = tag.path();
            (SitemapEntry::new(join(base, &path)).rule(&self.config.tags), path)
        });

        let mut seen = HashSet::new();
        let entries: Vec<SitemapEntry> = statics
            .chain(posts)
            .chain(categories)
            .chain(tags)
            .map(|(entry, path)| self.with_alternates(entry, base, &path))
            .filter(|entry| seen.insert(entry.loc.clone()))
            .collect();

        debug!(urls = entries.len(), "Sitemap entries built");
        Ok(entries)
    }

    /// One shard of the URL set.
    pub async fn page(&self, base_url: &str, page: usize, limit: usize) -> Result<SitemapPage> {
        let page = page.max(1);
        let limit = limit.clamp(1, self.ceiling());
        let all = self.entries(base_url).await?;
        let total = all.len();
        let urls = all
            .into_iter()
            .skip((page - 1).saturating_mul(limit))
            .take(limit)
            .collect();
        Ok(SitemapPage {
            page,
            limit,
            total,
            urls,
        })
    }

    /// Flat `<urlset>` for the given options.
    pub async fn generate_sitemap(&self, options: &SitemapOptions) -> Result<String> {
        let base = options
            .base_url
            .clone()
            .unwrap_or_else(|| self.base_url().to_string());
        let limit = options.limit.unwrap_or(self.ceiling());
        let page = self.page(&base, options.page, limit).await?;
        Ok(render::urlset(&page.urls))
    }

    /// `<urlset>` shard `page` of `limit` URLs.
    pub async fn generate_paginated_sitemap(
        &self,
        base_url: &str,
        page: usize,
        limit: usize,
    ) -> Result<String> {
        self.generate_sitemap(&SitemapOptions {
            base_url: Some(base_url.to_string()),
            page,
            limit: Some(limit),
        })
        .await
    }

    /// Shard locations listed by the index, one per estimated shard.
    pub async fn index_locations(&self, base_url: &str) -> Result<Vec<String>> {
        let stats = self.stats().await?;
        let base = base_url.trim_end_matches('/');
        Ok((1..=stats.shards)
            .map(|n| format!("{base}/sitemap.xml?page={n}"))
            .collect())
    }

    /// `<sitemapindex>` pointing at every shard.
    pub async fn generate_sitemap_index(&self, base_url: &str) -> Result<String> {
        let locations = self.index_locations(base_url).await?;
        Ok(render::index(&locations, Some(self.clock.now())))
    }

    /// Home page entry used when generation fails.
    pub fn fallback_entry(&self) -> SitemapEntry {
        SitemapEntry::new(join(self.base_url(), "/"))
            .changefreq(ChangeFreq::Daily)
            .priority(1.0)
    }

    /// One-URL document served when generation fails.
    pub fn fallback_sitemap(&self) -> String {
        render::urlset(&[self.fallback_entry()])
    }

    fn with_alternates(&self, mut entry: SitemapEntry, base: &str, path: &str) -> SitemapEntry {
        if self.config.languages.is_empty() {
            return entry;
        }
        let suffix = if path == "/" { "/" } else { path };
        entry.alternates = self
            .config
            .languages
            .iter()
            .map(|lang| Alternate {
                hreflang: lang.clone(),
                href: format!("{base}/{lang}{suffix}"),
            })
            .collect();
        entry.alternates.push(Alternate {
            hreflang: "x-default".to_string(),
            href: entry.loc.clone(),
        });
        entry
    }
}

fn join(base: &str, path: &str) -> String {
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_clamped() {
        assert_eq!(SitemapEntry::new("a").priority(1.7).priority, Some(1.0));
        assert_eq!(SitemapEntry::new("a").priority(-0.2).priority, Some(0.0));
        assert_eq!(SitemapEntry::new("a").priority(f32::NAN).priority, None);
        assert_eq!(SitemapEntry::new("a").priority(0.5).priority, Some(0.5));
    }

    #[test]
    fn test_join() {
        assert_eq!(join("https://x.dev", "/"), "https://x.dev/");
        assert_eq!(join("https://x.dev", "about"), "https://x.dev/about");
    }

    #[test]
    fn test_changefreq_serde() {
        let json = serde_json::to_string(&ChangeFreq::Weekly).unwrap();
        assert_eq!(json, "\"weekly\"");
        assert_eq!(ChangeFreq::Monthly.to_string(), "monthly");
    }
}
