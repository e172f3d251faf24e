// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Plain-text projection and truncation of post bodies.

use regex::Regex;
use std::sync::LazyLock;

static RE_SCRIPT_STYLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").unwrap()
});
static RE_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static RE_WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const ELLIPSIS: &str = "...";

/// Strip markup from rendered HTML and collapse whitespace.
pub fn plain_text(html: &str) -> String {
    let without_code = RE_SCRIPT_STYLE.replace_all(html, " ");
    let without_tags = RE_TAG.replace_all(&without_code, " ");
    let decoded = decode_entities(&without_tags);
    RE_WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Truncate to at most `max_chars` characters, appending an ellipsis when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        None => text.to_string(),
        Some((byte_idx, _)) => {
            let mut cut = text[..byte_idx].trim_end().to_string();
            cut.push_str(ELLIPSIS);
            cut
        }
    }
}

/// Plain-text length in characters.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    // &amp; last so "&amp;lt;" stays "&lt;"
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
