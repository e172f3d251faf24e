// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! XML text escaping for hand-written documents.

use std::borrow::Cow;

/// Escape special XML characters.
pub fn escape(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 16);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_xml() {
        assert!(matches!(escape("hello"), Cow::Borrowed("hello")));
        assert_eq!(escape("<test>"), "&lt;test&gt;");
        assert_eq!(escape("a & b"), "a &amp; b");
        assert_eq!(escape(r#"say "hi""#), "say &quot;hi&quot;");
        assert_eq!(escape("it's"), "it&apos;s");
    }

    #[test]
    fn test_escape_does_not_double_escape_order() {
        assert_eq!(escape("&lt;"), "&amp;lt;");
        assert_eq!(escape("?q=a&b=c"), "?q=a&amp;b=c");
    }
}
