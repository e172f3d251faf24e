// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! robots.txt generation and parsing.
//!
//! Development deployments block everything except a narrow allow-list for
//! a couple of crawlers used in testing. Production emits a generic rule
//! set, or a crawler-specific one when a known bot is requested.
//!
//! [`parse`] reads the rendered text back into [`ParsedRobots`] for the
//! JSON debug view. Every directive [`RobotsRuleSet::render`] writes is
//! recovered exactly.

use crate::config::Environment;
use serde::{Deserialize, Serialize};
use url::Url;

/// Directives for one user agent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RobotsGroup {
    pub user_agent: String,
    #[serde(default)]
    pub allow: Vec<String>,
    #[serde(default)]
    pub disallow: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crawl_delay: Option<u32>,
}

impl RobotsGroup {
    fn new(user_agent: &str) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            ..Default::default()
        }
    }

    fn allow(mut self, paths: &[&str]) -> Self {
        self.allow.extend(paths.iter().map(|p| p.to_string()));
        self
    }

    fn disallow(mut self, paths: &[&str]) -> Self {
        self.disallow.extend(paths.iter().map(|p| p.to_string()));
        self
    }

    fn crawl_delay(mut self, secs: u32) -> Self {
        self.crawl_delay = Some(secs);
        self
    }
}

/// Ordered robots.txt content.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RobotsRuleSet {
    pub comments: Vec<String>,
    pub groups: Vec<RobotsGroup>,
    pub sitemaps: Vec<String>,
    pub host: Option<String>,
}

/// Structured view of a robots.txt document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedRobots {
    pub user_agent: Vec<RobotsGroup>,
    pub sitemaps: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub comments: Vec<String>,
}

/// Crawlers with dedicated rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crawler {
    Googlebot,
    GooglebotImage,
    GooglebotNews,
    Bingbot,
    DuckDuckBot,
}

impl Crawler {
    /// Match a `bot` query parameter, case-insensitively.
    pub fn from_param(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "googlebot" | "google" => Some(Self::Googlebot),
            "googlebot-image" | "image" => Some(Self::GooglebotImage),
            "googlebot-news" | "news" => Some(Self::GooglebotNews),
            "bingbot" | "bing" => Some(Self::Bingbot),
            "duckduckbot" | "duckduckgo" => Some(Self::DuckDuckBot),
            _ => None,
        }
    }

    pub fn user_agent(self) -> &'static str {
        match self {
            Self::Googlebot => "Googlebot",
            Self::GooglebotImage => "Googlebot-Image",
            Self::GooglebotNews => "Googlebot-News",
            Self::Bingbot => "Bingbot",
            Self::DuckDuckBot => "DuckDuckBot",
        }
    }
}

/// Private areas never meant for indexing.
const PRIVATE_PATHS: &[&str] = &["/api/", "/admin/", "/auth/", "/dashboard/", "/drafts/", "/search"];

/// Paths the development allow-list exposes to test crawlers.
const DEV_ALLOWED: &[&str] = &["/robots.txt", "/sitemap.xml"];

/// Build the rule set for an environment and optional crawler name.
pub fn generate(env: Environment, base_url: &str, bot: Option<&str>) -> RobotsRuleSet {
    let base = base_url.trim_end_matches('/');
    let mut comments = vec![format!("robots.txt for {base}")];

    let (groups, sitemaps) = match env {
        Environment::Development => {
            comments.push("Development deployment: indexing disabled".to_string());
            let groups = vec![
                RobotsGroup::new("*").disallow(&["/"]),
                RobotsGroup::new(Crawler::Googlebot.user_agent())
                    .allow(DEV_ALLOWED)
                    .disallow(&["/"]),
                RobotsGroup::new(Crawler::Bingbot.user_agent())
                    .allow(DEV_ALLOWED)
                    .disallow(&["/"]),
            ];
            (groups, Vec::new())
        }
        Environment::Production => {
            let crawler = bot.and_then(Crawler::from_param);
            let group = match crawler {
                Some(crawler) => {
                    comments.push(format!("Rules for {}", crawler.user_agent()));
                    crawler_group(crawler)
                }
                None => RobotsGroup::new("*").allow(&["/"]).disallow(PRIVATE_PATHS),
            };
            (vec![group], vec![format!("{base}/sitemap.xml")])
        }
    };

    RobotsRuleSet {
        comments,
        groups,
        sitemaps,
        host: host_of(base),
    }
}

fn crawler_group(crawler: Crawler) -> RobotsGroup {
    let group = RobotsGroup::new(crawler.user_agent()).allow(&["/"]);
    match crawler {
        Crawler::Googlebot => group.disallow(PRIVATE_PATHS),
        Crawler::GooglebotImage => group
            .allow(&["/images/", "/uploads/"])
            .disallow(PRIVATE_PATHS),
        Crawler::GooglebotNews => group
            .allow(&["/posts/"])
            .disallow(PRIVATE_PATHS)
            .disallow(&["/tags/"]),
        Crawler::Bingbot | Crawler::DuckDuckBot => group.disallow(PRIVATE_PATHS).crawl_delay(1),
    }
}

fn host_of(base: &str) -> Option<String> {
    match Url::parse(base) {
        Ok(url) => url.host_str().map(|h| match url.port() {
            Some(port) => format!("{h}:{port}"),
            None => h.to_string(),
        }),
        Err(_) => {
            let stripped = base
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            (!stripped.is_empty()).then(|| stripped.to_string())
        }
    }
}

impl RobotsRuleSet {
    /// Render as robots.txt text.
    pub fn render(&self) -> String {
        let mut out = String::new();

        for comment in &self.comments {
            out.push_str("# ");
            out.push_str(comment);
            out.push('\n');
        }

        for group in &self.groups {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&format!("User-agent: {}\n", group.user_agent));
            for path in &group.allow {
                out.push_str(&format!("Allow: {path}\n"));
            }
            for path in &group.disallow {
                out.push_str(&format!("Disallow: {path}\n"));
            }
            if let Some(delay) = group.crawl_delay {
                out.push_str(&format!("Crawl-delay: {delay}\n"));
            }
        }

        if !self.sitemaps.is_empty() {
            out.push('\n');
            for sitemap in &self.sitemaps {
                out.push_str(&format!("Sitemap: {sitemap}\n"));
            }
        }

        if let Some(host) = &self.host {
            out.push('\n');
            out.push_str(&format!("Host: {host}\n"));
        }

        out
    }
}

/// Parse robots.txt text. Directive names match case-insensitively and
/// values are trimmed; consecutive `User-agent` lines share their rules.
pub fn parse(text: &str) -> ParsedRobots {
    let mut parsed = ParsedRobots::default();
    let mut open: Vec<usize> = Vec::new();
    let mut last_was_agent = false;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(comment) = line.strip_prefix('#') {
            parsed.comments.push(comment.trim().to_string());
            continue;
        }

        let line = line.split('#').next().unwrap_or("").trim();
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if !last_was_agent {
                    open.clear();
                }
                parsed.user_agent.push(RobotsGroup::new(value));
                open.push(parsed.user_agent.len() - 1);
                last_was_agent = true;
                continue;
            }
            "allow" => {
                for &idx in &open {
                    parsed.user_agent[idx].allow.push(value.to_string());
                }
            }
            "disallow" => {
                for &idx in &open {
                    parsed.user_agent[idx].disallow.push(value.to_string());
                }
            }
            "crawl-delay" => {
                if let Ok(delay) = value.parse::<u32>() {
                    for &idx in &open {
                        parsed.user_agent[idx].crawl_delay = Some(delay);
                    }
                }
            }
            "sitemap" => parsed.sitemaps.push(value.to_string()),
            "host" => parsed.host = Some(value.to_string()),
            _ => {}
        }
        last_was_agent = false;
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://blog.example.com";

    #[test]
    fn test_development_blocks_everything() {
        let rules = generate(Environment::Development, BASE, None);
        assert_eq!(rules.groups[0].user_agent, "*");
        assert_eq!(rules.groups[0].disallow, vec!["/"]);
        assert!(rules.groups[1..]
            .iter()
            .all(|g| g.allow == DEV_ALLOWED && g.disallow == vec!["/"]));
        assert!(rules.sitemaps.is_empty());
        assert_eq!(rules.host.as_deref(), Some("blog.example.com"));

        let text = rules.render();
        assert!(!text.contains("Sitemap:"));
        assert!(text.contains("Host: blog.example.com"));
    }

    #[test]
    fn test_production_generic() {
        let rules = generate(Environment::Production, BASE, Some("unknown-bot"));
        assert_eq!(rules.groups.len(), 1);
        assert_eq!(rules.groups[0].user_agent, "*");
        assert!(rules.groups[0].disallow.contains(&"/api/".to_string()));
        assert_eq!(rules.sitemaps, vec!["https://blog.example.com/sitemap.xml"]);
    }

    #[test]
    fn test_crawler_specific_rules() {
        let news = generate(Environment::Production, BASE, Some("Googlebot-News"));
        assert_eq!(news.groups[0].user_agent, "Googlebot-News");
        assert!(news.groups[0].disallow.contains(&"/tags/".to_string()));

        let image = generate(Environment::Production, BASE, Some("googlebot-image"));
        assert!(image.groups[0].allow.contains(&"/images/".to_string()));

        let bing = generate(Environment::Production, BASE, Some("BING"));
        assert_eq!(bing.groups[0].crawl_delay, Some(1));
    }

    #[test]
    fn test_round_trip() {
        for (env, bot) in [
            (Environment::Development, None),
            (Environment::Production, None),
            (Environment::Production, Some("bingbot")),
            (Environment::Production, Some("googlebot-news")),
        ] {
            let rules = generate(env, BASE, bot);
            let parsed = parse(&rules.render());
            assert_eq!(parsed.user_agent, rules.groups, "{env:?} {bot:?}");
            assert_eq!(parsed.sitemaps, rules.sitemaps);
            assert_eq!(parsed.host, rules.host);
            assert_eq!(parsed.comments, rules.comments);
        }
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        let parsed = parse(
            "user-AGENT:   Foo  \nDISALLOW: /private   # inline\nallow:/open\nCRAWL-DELAY: 5\nsitemap: https://x.dev/s.xml\n",
        );
        assert_eq!(
            parsed.user_agent,
            vec![RobotsGroup {
                user_agent: "Foo".to_string(),
                allow: vec!["/open".to_string()],
                disallow: vec!["/private".to_string()],
                crawl_delay: Some(5),
            }]
        );
        assert_eq!(parsed.sitemaps, vec!["https://x.dev/s.xml"]);
    }

    #[test]
    fn test_consecutive_agents_share_rules() {
        let parsed = parse("User-agent: A\nUser-agent: B\nDisallow: /x\n\nUser-agent: C\nAllow: /\n");
        assert_eq!(parsed.user_agent.len(), 3);
        assert_eq!(parsed.user_agent[0].disallow, vec!["/x"]);
        assert_eq!(parsed.user_agent[1].disallow, vec!["/x"]);
        assert!(parsed.user_agent[2].disallow.is_empty());
        assert_eq!(parsed.user_agent[2].allow, vec!["/"]);
    }

    #[test]
    fn test_json_shape() {
        let parsed = parse(&generate(Environment::Production, BASE, Some("bingbot")).render());
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["userAgent"][0]["userAgent"], "Bingbot");
        assert_eq!(value["userAgent"][0]["crawlDelay"], 1);
        assert_eq!(value["host"], "blog.example.com");
    }
}
