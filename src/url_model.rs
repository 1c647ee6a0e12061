//! URL model: a parsed URL value plus the admission-pipeline heuristics
//! (static-file / image / font / css detection, base name, depth) layered
//! on top of `url::Url`. Relative resolution is delegated to
//! `url::Url::join`, which already implements the RFC 3986 merge algorithm
//! for the cases that matter here (`./x`, bare `x/y`, `/x`, `//host/x`,
//! absolute).

use url::Url;

use crate::error::CrawlError;
use crate::util::second_level_domain;

const HTML_EXTENSIONS: &[&str] = &[
    "htm", "html", "shtml", "php", "phtml", "ashx", "xhtml", "asp", "aspx", "jsp", "jspx", "do",
    "cfm", "cgi", "pl", "rb", "erb", "gsp",
];

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "avif", "tif", "tiff",
];

const FONT_EXTENSIONS: &[&str] = &["woff", "woff2", "ttf", "otf", "eot"];

#[derive(Debug, Clone)]
pub struct ParsedUrl {
    url: Url,
    /// Crawl-graph depth, independent of path segment count; starts equal to
    /// the path-derived depth and is advanced by `with_depth_delta` when the
    /// engine enqueues a child discovered from this URL.
    depth: i64,
}

impl PartialEq for ParsedUrl {
    fn eq(&self, other: &Self) -> bool {
        self.canonical_key() == other.canonical_key()
    }
}
impl Eq for ParsedUrl {}

impl ParsedUrl {
    pub fn parse(raw: &str, base: Option<&ParsedUrl>) -> Result<Self, CrawlError> {
        let url = match base {
            Some(b) => b.url.join(raw)?,
            None => Url::parse(raw)?,
        };
        let depth = Self::path_depth(&url);
        Ok(Self { url, depth })
    }

    pub fn from_url(url: Url) -> Self {
        let depth = Self::path_depth(&url);
        Self { url, depth }
    }

    pub fn inner(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Port, defaulting to 80/443 by scheme when absent.
    pub fn port(&self) -> u16 {
        self.url.port().unwrap_or(match self.url.scheme() {
            "https" => 443,
            _ => 80,
        })
    }

    /// Path, defaulting to "/" when a host is present.
    pub fn path(&self) -> &str {
        let p = self.url.path();
        if p.is_empty() {
            "/"
        } else {
            p
        }
    }

    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    pub fn fragment(&self) -> Option<&str> {
        self.url.fragment()
    }

    pub fn extension(&self) -> Option<String> {
        let last_seg = self.path().rsplit('/').next().unwrap_or("");
        last_seg.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
    }

    pub fn domain_2nd_level(&self) -> Option<String> {
        self.host().map(second_level_domain)
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    /// Canonical full URL: scheme+host+(port if non-default)+path+(?query),
    /// fragment excluded — the equality key for queue/visited/skipped.
    pub fn canonical_key(&self) -> String {
        self.full_url(true, false)
    }

    pub fn full_url(&self, include_scheme_host: bool, include_fragment: bool) -> String {
        let mut out = String::new();
        if include_scheme_host {
            out.push_str(self.scheme());
            out.push_str("://");
            if let Some(h) = self.host() {
                out.push_str(h);
            }
            let default_port = match self.scheme() {
                "https" => 443,
                _ => 80,
            };
            if let Some(p) = self.url.port() {
                if p != default_port {
                    out.push(':');
                    out.push_str(&p.to_string());
                }
            }
        }
        out.push_str(self.path());
        if let Some(q) = self.query() {
            out.push('?');
            out.push_str(q);
        }
        if include_fragment {
            if let Some(f) = self.fragment() {
                out.push('#');
                out.push_str(f);
            }
        }
        out
    }

    pub fn is_image(&self) -> bool {
        self.extension()
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
    }

    pub fn is_font(&self) -> bool {
        self.extension()
            .is_some_and(|e| FONT_EXTENSIONS.contains(&e.as_str()))
    }

    pub fn is_css(&self) -> bool {
        self.extension().is_some_and(|e| e == "css")
    }

    /// True for non-numeric extensions outside the HTML extension set, or
    /// for image/CSS heuristic matches.
    pub fn is_static_file(&self) -> bool {
        if self.is_image() || self.is_css() || self.is_font() {
            return true;
        }
        match self.extension() {
            Some(ext) if ext.chars().all(|c| c.is_ascii_digit()) => false,
            Some(ext) => !HTML_EXTENSIONS.contains(&ext.as_str()),
            None => false,
        }
    }

    /// Last non-empty path segment; `?query` appended when the query string
    /// contains path-like characters (`/` or `%2F`); empty for `/`.
    pub fn base_name(&self) -> String {
        let path = self.path();
        let trimmed = path.trim_end_matches('/');
        let seg = trimmed.rsplit('/').next().unwrap_or("");
        if seg.is_empty() {
            return String::new();
        }
        let mut name = seg.to_string();
        if let Some(q) = self.query() {
            if q.contains('/') || q.to_ascii_uppercase().contains("%2F") {
                name.push_str("?query");
            }
        }
        name
    }

    fn path_depth(url: &Url) -> i64 {
        let path = url.path().trim_matches('/');
        if path.is_empty() {
            return 0;
        }
        let mut depth: i64 = 0;
        let mut dotdot: i64 = 0;
        for seg in path.split('/') {
            if seg == ".." {
                dotdot += 1;
            } else {
                depth += 1;
            }
        }
        (depth - dotdot).max(0)
    }

    pub fn depth(&self) -> i64 {
        self.depth
    }

    /// Returns a copy with crawl-graph depth advanced by `delta`, used when
    /// the engine assigns a child discovered from this URL its BFS depth.
    pub fn with_depth_delta(&self, delta: i64) -> Self {
        let mut next = self.clone();
        next.depth = (next.depth + delta).max(0);
        next
    }
}

impl std::fmt::Display for ParsedUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_excludes_fragment_and_default_port() {
        let a = ParsedUrl::parse("https://example.com:443/a/b?x=1#frag", None).unwrap();
        assert_eq!(a.canonical_key(), "https://example.com/a/b?x=1");
    }

    #[test]
    fn relative_dot_slash_replaces_basename() {
        let base = ParsedUrl::parse("https://example.com/a/b", None).unwrap();
        let child = ParsedUrl::parse("./x", Some(&base)).unwrap();
        assert_eq!(child.path(), "/a/x");
    }

    #[test]
    fn relative_bare_segment_resolves_to_directory() {
        let base = ParsedUrl::parse("https://example.com/a/b", None).unwrap();
        let child = ParsedUrl::parse("x/y", Some(&base)).unwrap();
        assert_eq!(child.path(), "/a/x/y");
    }

    #[test]
    fn root_relative_replaces_whole_path() {
        let base = ParsedUrl::parse("https://example.com/a/b?q=1", None).unwrap();
        let child = ParsedUrl::parse("/x", Some(&base)).unwrap();
        assert_eq!(child.path(), "/x");
        assert_eq!(child.query(), None);
    }

    #[test]
    fn scheme_relative_inherits_base_scheme() {
        let base = ParsedUrl::parse("https://example.com/a/b", None).unwrap();
        let child = ParsedUrl::parse("//cdn.example.com/x", Some(&base)).unwrap();
        assert_eq!(child.scheme(), "https");
        assert_eq!(child.host(), Some("cdn.example.com"));
    }

    #[test]
    fn is_static_file_classifies_by_extension() {
        let html = ParsedUrl::parse("https://example.com/a.html", None).unwrap();
        let img = ParsedUrl::parse("https://example.com/a.png", None).unwrap();
        let numeric = ParsedUrl::parse("https://example.com/2024", None).unwrap();
        assert!(!html.is_static_file());
        assert!(img.is_static_file());
        assert!(!numeric.is_static_file());
    }

    #[test]
    fn base_name_appends_query_marker_for_path_like_query() {
        let u = ParsedUrl::parse("https://example.com/img?src=a%2Fb.jpg", None).unwrap();
        assert_eq!(u.base_name(), "img?query");
    }

    #[test]
    fn base_name_empty_for_root() {
        let u = ParsedUrl::parse("https://example.com/", None).unwrap();
        assert_eq!(u.base_name(), "");
    }

    #[test]
    fn depth_counts_segments_minus_dotdot() {
        let u = ParsedUrl::parse("https://example.com/a/b/../c", None).unwrap();
        assert_eq!(u.depth(), 2);
    }
}
