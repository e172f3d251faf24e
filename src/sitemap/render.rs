// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sitemap XML serialization.
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
//!   <url>
//!     <loc>https://example.com/</loc>
//!     <lastmod>2025-01-01</lastmod>
//!     <changefreq>daily</changefreq>
//!     <priority>1.0</priority>
//!   </url>
//! </urlset>
//! ```

use super::SitemapEntry;
use crate::xml::escape;
use chrono::{DateTime, Utc};

pub const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";
pub const XHTML_NS: &str = "http://www.w3.org/1999/xhtml";

const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// Render a `<urlset>`.
pub fn urlset(entries: &[SitemapEntry]) -> String {
    let mut xml = String::with_capacity(256 + entries.len() * 160);
    let alternates = entries.iter().any(|e| !e.alternates.is_empty());

    xml.push_str(XML_DECL);
    xml.push_str("<urlset xmlns=\"");
    xml.push_str(SITEMAP_NS);
    if alternates {
        xml.push_str("\" xmlns:xhtml=\"");
        xml.push_str(XHTML_NS);
    }
    xml.push_str("\">\n");

    for entry in entries {
        xml.push_str("  <url>\n    <loc>");
        xml.push_str(&escape(&entry.loc));
        xml.push_str("</loc>\n");
        if let Some(lastmod) = &entry.lastmod {
            xml.push_str("    <lastmod>");
            xml.push_str(&escape(lastmod));
            xml.push_str("</lastmod>\n");
        }
        if let Some(changefreq) = entry.changefreq {
            xml.push_str("    <changefreq>");
            xml.push_str(changefreq.as_str());
            xml.push_str("</changefreq>\n");
        }
        if let Some(priority) = entry.priority {
            xml.push_str(&format!("    <priority>{priority:.1}</priority>\n"));
        }
        for alt in &entry.alternates {
            xml.push_str(&format!(
                "    <xhtml:link rel=\"alternate\" hreflang=\"{}\" href=\"{}\"/>\n",
                escape(&alt.hreflang),
                escape(&alt.href)
            ));
        }
        xml.push_str("  </url>\n");
    }

    xml.push_str("</urlset>\n");
    xml
}

/// Render a `<sitemapindex>` over shard locations.
pub fn index(locations: &[String], lastmod: Option<DateTime<Utc>>) -> String {
    let mut xml = String::with_capacity(256 + locations.len() * 120);
    let lastmod = lastmod.map(|t| t.format("%Y-%m-%d").to_string());

    xml.push_str(XML_DECL);
    xml.push_str("<sitemapindex xmlns=\"");
    xml.push_str(SITEMAP_NS);
    xml.push_str("\">\n");

    for loc in locations {
        xml.push_str("  <sitemap>\n    <loc>");
        xml.push_str(&escape(loc));
        xml.push_str("</loc>\n");
        if let Some(lastmod) = &lastmod {
            xml.push_str("    <lastmod>");
            xml.push_str(lastmod);
            xml.push_str("</lastmod>\n");
        }
        xml.push_str("  </sitemap>\n");
    }

    xml.push_str("</sitemapindex>\n");
    xml
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sitemap::{Alternate, ChangeFreq};

    #[test]
    fn test_sitemap_empty() {
        let xml = urlset(&[]);
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(&format!(r#"<urlset xmlns="{SITEMAP_NS}">"#)));
        assert!(xml.contains("</urlset>"));
        assert!(!xml.contains("<url>"));
    }

    #[test]
    fn test_full_entry() {
        let mut entry = SitemapEntry::new("https://example.com/search?q=a&b=c")
            .changefreq(ChangeFreq::Weekly)
            .priority(0.8);
        entry.lastmod = Some("2025-01-02".to_string());
        let xml = urlset(&[entry]);

        assert!(xml.contains("<loc>https://example.com/search?q=a&amp;b=c</loc>"));
        assert!(xml.contains("<lastmod>2025-01-02</lastmod>"));
        assert!(xml.contains("<changefreq>weekly</changefreq>"));
        assert!(xml.contains("<priority>0.8</priority>"));
        assert!(!xml.contains("xmlns:xhtml"));
    }

    #[test]
    fn test_alternates_declare_namespace() {
        let mut entry = SitemapEntry::new("https://example.com/about");
        entry.alternates.push(Alternate {
            hreflang: "fr".to_string(),
            href: "https://example.com/fr/about".to_string(),
        });
        let xml = urlset(&[entry]);

        assert!(xml.contains(&format!(r#"xmlns:xhtml="{XHTML_NS}""#)));
        assert!(xml.contains(
            r#"<xhtml:link rel="alternate" hreflang="fr" href="https://example.com/fr/about"/>"#
        ));
    }

    #[test]
    fn test_index() {
        let xml = index(
            &[
                "https://example.com/sitemap.xml?page=1".to_string(),
                "https://example.com/sitemap.xml?page=2".to_string(),
            ],
            None,
        );
        assert!(xml.contains(&format!(r#"<sitemapindex xmlns="{SITEMAP_NS}">"#)));
        assert_eq!(xml.matches("<sitemap>").count(), 2);
        assert!(xml.contains("<loc>https://example.com/sitemap.xml?page=2</loc>"));
        assert!(!xml.contains("<urlset"));
    }
}
