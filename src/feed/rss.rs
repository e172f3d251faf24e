// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! RSS 2.0 rendering.

use super::{FeedDocument, FeedItem, FeedMeta, ItemBody};
use ::rss::validation::Validate;
use ::rss::{Category, CategoryBuilder, Channel, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use chrono::{DateTime, Utc};

const GENERATOR: &str = "blog-syndication";

/// Format a timestamp the way RSS readers expect (`Tue, 07 Jan 2025 09:00:00 GMT`).
pub fn rfc2822(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

pub fn render(doc: &FeedDocument) -> String {
    channel(doc).to_string()
}

/// Minimal, well-formed channel describing why the feed is unavailable.
pub fn render_error(meta: &FeedMeta, title: &str, description: &str, at: DateTime<Utc>) -> String {
    ChannelBuilder::default()
        .title(title.to_string())
        .link(meta.home_page_url.clone())
        .description(description.to_string())
        .language(meta.language.clone())
        .last_build_date(rfc2822(at))
        .generator(GENERATOR.to_string())
        .build()
        .to_string()
}

/// Structural problems in the rendered channel.
pub fn validate(doc: &FeedDocument) -> Vec<String> {
    let channel = channel(doc);
    let mut errors = Vec::new();

    if let Err(e) = channel.validate() {
        errors.push(format!("RSS validation failed: {e}"));
    }
    if channel.title().trim().is_empty() {
        errors.push("channel title is empty".to_string());
    }
    if channel.description().trim().is_empty() {
        errors.push("channel description is empty".to_string());
    }
    for (idx, item) in channel.items().iter().enumerate() {
        if item.title().is_none() && item.description().is_none() {
            errors.push(format!("item {idx} has neither title nor description"));
        }
        if item.link().is_none() {
            errors.push(format!("item {idx} has no link"));
        }
    }

    errors
}

fn channel(doc: &FeedDocument) -> Channel {
    let items: Vec<Item> = doc.items.iter().map(item).collect();

    ChannelBuilder::default()
        .title(doc.meta.title.clone())
        .link(doc.meta.home_page_url.clone())
        .description(doc.meta.description.clone())
        .language(doc.meta.language.clone())
        .last_build_date(rfc2822(doc.generated_at))
        .generator(GENERATOR.to_string())
        .ttl(doc.ttl_minutes().to_string())
        .items(items)
        .build()
}

fn item(item: &FeedItem) -> Item {
    let description = match &item.body {
        ItemBody::Html(html) => html.clone(),
        ItemBody::Text(text) => text.clone(),
    };

    let categories: Vec<Category> = item
        .category
        .iter()
        .chain(item.tags.iter())
        .map(|name| CategoryBuilder::default().name(name.clone()).build())
        .collect();

    ItemBuilder::default()
        .title(item.title.clone())
        .link(item.url.clone())
        .guid(
            GuidBuilder::default()
                .permalink(true)
                .value(item.url.clone())
                .build(),
        )
        .description(description)
        .pub_date(rfc2822(item.published_at))
        .author(item.author.as_ref().map(|a| match &a.email {
            Some(email) => format!("{email} ({})", a.name),
            None => a.name.clone(),
        }))
        .categories(categories)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_rfc2822_matches_utc_string() {
        let at = Utc.with_ymd_and_hms(2025, 1, 7, 9, 0, 0).unwrap();
        assert_eq!(rfc2822(at), "Tue, 07 Jan 2025 09:00:00 GMT");
    }

    #[test]
    fn test_error_channel_is_parseable() {
        let meta = FeedMeta {
            title: "Blog".to_string(),
            description: "desc".to_string(),
            home_page_url: "https://example.com".to_string(),
            feed_url: "https://example.com/rss".to_string(),
            language: "en".to_string(),
        };
        let at = Utc.with_ymd_and_hms(2025, 1, 7, 9, 0, 0).unwrap();
        let xml = render_error(&meta, "Feed Unavailable", "Feeds <disabled> & off", at);

        let channel = Channel::read_from(xml.as_bytes()).unwrap();
        assert_eq!(channel.title(), "Feed Unavailable");
        assert_eq!(channel.description(), "Feeds <disabled> & off");
        assert!(channel.items().is_empty());
        assert!(xml.contains("<title>Feed Unavailable</title>"));
    }
}
