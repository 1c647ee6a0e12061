//! Found-URL set: a de-duplicating collector of candidate
//! URLs discovered by content processors, each annotated with the HTML/CSS/
//! JS construct (or redirect/sitemap origin) that yielded it.

use std::collections::HashMap;

use crate::url_model::ParsedUrl;
use crate::util::full_md5_hex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTag {
    Init,
    AHref,
    ImgSrc,
    ImgSrcset,
    InputSrc,
    SourceSrc,
    VideoSrc,
    AudioSrc,
    ScriptSrc,
    InlineScriptSrc,
    LinkHref,
    CssUrl,
    JsUrl,
    Redirect,
    Sitemap,
}

#[derive(Debug, Clone)]
pub struct FoundUrl {
    pub normalized_url: String,
    pub source_url: ParsedUrl,
    pub source_tag: SourceTag,
}

const PSEUDO_SCHEMES: &[&str] = &["mailto", "javascript", "tel", "data", "file", "sms", "ftp"];

/// Unescape `&amp;`/`&#38;`, trim surrounding quotes/whitespace, and
/// percent-encode embedded spaces (`FoundUrl` normalization).
pub fn normalize_raw_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'');
    let unescaped = trimmed.replace("&amp;", "&").replace("&#38;", "&");
    unescaped.replace(' ', "%20")
}

/// True when a raw candidate string could plausibly be requested: not an
/// anchor-only reference, not a non-http(s) pseudo-scheme.
pub fn is_requestable_candidate(raw: &str) -> bool {
    let s = raw.trim();
    if s.is_empty() || s.starts_with('#') {
        return false;
    }
    if let Some((scheme, _)) = s.split_once(':') {
        let scheme_l = scheme.to_ascii_lowercase();
        // Guard against false positives like a bare "C:\path" or "10:30" ---
        // schemes are alphabetic and short, so require the prefix to look
        // scheme-like before we gate on the denylist.
        if scheme_l.chars().all(|c| c.is_ascii_alphabetic()) {
            if PSEUDO_SCHEMES.contains(&scheme_l.as_str()) {
                return false;
            }
            if scheme_l != "http" && scheme_l != "https" && !s.starts_with("//") {
                // Unknown non-http(s) absolute scheme; reject conservatively
                // unless it's actually a Windows-style drive letter or port
                // number misread as a scheme (handled by the alpha check
                // above already excluding digits).
                if scheme_l.len() > 1 {
                    return false;
                }
            }
        }
    }
    true
}

/// De-duplicating collector keyed by md5(normalized_url); first write wins.
#[derive(Debug, Default)]
pub struct FoundUrlSet {
    by_key: HashMap<String, FoundUrl>,
    order: Vec<String>,
}

impl FoundUrlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and inserts a raw candidate; returns true if it was
    /// accepted as a new Found-URL, false if rejected or a duplicate.
    pub fn insert(&mut self, raw: &str, source_url: &ParsedUrl, source_tag: SourceTag) -> bool {
        if !is_requestable_candidate(raw) {
            return false;
        }
        let normalized = normalize_raw_url(raw);
        if normalized.is_empty() || normalized.starts_with('#') {
            return false;
        }
        let key = full_md5_hex(&normalized);
        if self.by_key.contains_key(&key) {
            return false;
        }
        self.by_key.insert(
            key.clone(),
            FoundUrl {
                normalized_url: normalized,
                source_url: source_url.clone(),
                source_tag,
            },
        );
        self.order.push(key);
        true
    }

    pub fn into_vec(self) -> Vec<FoundUrl> {
        let mut out = Vec::with_capacity(self.order.len());
        let mut by_key = self.by_key;
        for key in self.order {
            if let Some(fu) = by_key.remove(&key) {
                out.push(fu);
            }
        }
        out
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src() -> ParsedUrl {
        ParsedUrl::parse("https://example.com/", None).unwrap()
    }

    #[test]
    fn rejects_anchor_only() {
        assert!(!is_requestable_candidate("#section"));
    }

    #[test]
    fn rejects_pseudo_schemes() {
        assert!(!is_requestable_candidate("mailto:a@b.com"));
        assert!(!is_requestable_candidate("javascript:void(0)"));
        assert!(!is_requestable_candidate("data:image/png;base64,aaaa"));
    }

    #[test]
    fn accepts_http_and_relative() {
        assert!(is_requestable_candidate("https://example.com/a"));
        assert!(is_requestable_candidate("/a/b"));
        assert!(is_requestable_candidate("a/b"));
    }

    #[test]
    fn dedupes_by_normalized_key_first_wins() {
        let mut set = FoundUrlSet::new();
        let s = src();
        assert!(set.insert("/a", &s, SourceTag::AHref));
        assert!(!set.insert("/a", &s, SourceTag::ImgSrc));
        assert_eq!(set.len(), 1);
        assert_eq!(set.into_vec()[0].source_tag as usize, SourceTag::AHref as usize);
    }

    #[test]
    fn unescapes_entities_and_encodes_spaces() {
        assert_eq!(normalize_raw_url("\"/a&amp;b c\""), "/a&b%20c");
    }
}
