// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON Feed 1.1 rendering.

use super::{FeedDocument, FeedItem, FeedMeta, ItemBody};
use crate::error::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

pub const VERSION: &str = "https://jsonfeed.org/version/1.1";

/// Served when even the error document cannot be serialized.
const FALLBACK_ERROR: &str =
    r#"{"version":"https://jsonfeed.org/version/1.1","title":"Feed Unavailable","items":[],"expired":true}"#;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFeed {
    pub version: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default)]
    pub items: Vec<JsonFeedItem>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonFeedItem {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_published: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<JsonAuthor>,
    /// JSON Feed 1.0 field, kept for older readers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<JsonAuthor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonAuthor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

pub fn iso8601(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn render(doc: &FeedDocument) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_json_feed(doc))?)
}

/// Feed-shaped error document with `expired: true`.
pub fn render_error(meta: &FeedMeta, title: &str, description: &str) -> String {
    let feed = JsonFeed {
        version: VERSION.to_string(),
        title: title.to_string(),
        home_page_url: Some(meta.home_page_url.clone()),
        feed_url: Some(meta.feed_url.clone()),
        description: Some(description.to_string()),
        language: Some(meta.language.clone()),
        items: Vec::new(),
        expired: true,
    };
    serde_json::to_string_pretty(&feed).unwrap_or_else(|_| FALLBACK_ERROR.to_string())
}

pub fn to_json_feed(doc: &FeedDocument) -> JsonFeed {
    JsonFeed {
        version: VERSION.to_string(),
        title: doc.meta.title.clone(),
        home_page_url: Some(doc.meta.home_page_url.clone()),
        feed_url: Some(doc.meta.feed_url.clone()),
        description: Some(doc.meta.description.clone()),
        language: Some(doc.meta.language.clone()),
        items: doc.items.iter().map(item).collect(),
        expired: false,
    }
}

/// Structural problems in the rendered feed.
pub fn validate(doc: &FeedDocument) -> Vec<String> {
    let feed = to_json_feed(doc);
    let mut errors = Vec::new();

    if feed.version != VERSION {
        errors.push(format!("unexpected version {}", feed.version));
    }
    if feed.title.trim().is_empty() {
        errors.push("feed title is empty".to_string());
    }
    for (field, value) in [("home_page_url", &feed.home_page_url), ("feed_url", &feed.feed_url)] {
        if let Some(value) = value {
            if Url::parse(value).is_err() {
                errors.push(format!("{field} is not an absolute URL: {value}"));
            }
        }
    }

    let mut ids = HashSet::new();
    for item in &feed.items {
        if item.id.is_empty() {
            errors.push("item with empty id".to_string());
        } else if !ids.insert(item.id.as_str()) {
            errors.push(format!("duplicate item id {}", item.id));
        }
        if item.content_html.is_none() && item.content_text.is_none() {
            errors.push(format!("item {} has no content", item.id));
        }
        if let Some(url) = &item.url {
            if Url::parse(url).is_err() {
                errors.push(format!("item {} url is not absolute: {url}", item.id));
            }
        }
    }

    errors
}

fn item(item: &FeedItem) -> JsonFeedItem {
    let (content_html, content_text) = match &item.body {
        ItemBody::Html(html) => (Some(html.clone()), None),
        ItemBody::Text(text) => (None, Some(text.clone())),
    };
    let author = item.author.as_ref().map(|a| JsonAuthor {
        name: a.name.clone(),
        url: a.url.clone(),
    });

    JsonFeedItem {
        id: item.id.clone(),
        url: Some(item.url.clone()),
        title: Some(item.title.clone()),
        content_html,
        content_text,
        summary: item.summary.clone(),
        date_published: Some(iso8601(item.published_at)),
        date_modified: item.updated_at.map(iso8601),
        authors: author.iter().cloned().collect(),
        author,
        tags: item.tags.clone(),
    }
}
