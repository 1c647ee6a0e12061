//! Content processors: pluggable body parsers that turn a
//! response body into a Found-URL set, keyed by content type.

mod css;
mod html;
mod js;
mod xml;

pub use css::CssProcessor;
pub use html::{HtmlExtract, HtmlProcessor};
pub use js::JsProcessor;
pub use xml::{SitemapEntry, XmlProcessor};

use crate::found_url::FoundUrlSet;
use crate::url_model::ParsedUrl;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentTypeId {
    Html,
    Script,
    Stylesheet,
    Image,
    Audio,
    Video,
    Font,
    Document,
    Json,
    Xml,
    Redirect,
    Other,
}

impl ContentTypeId {
    /// Derived from the `Content-Type` response header; `Redirect` takes
    /// precedence when a `Location` header is present.
    pub fn classify(content_type: Option<&str>, has_location: bool) -> Self {
        if has_location {
            return ContentTypeId::Redirect;
        }
        let ct = content_type.unwrap_or("").to_ascii_lowercase();
        let ct = ct.split(';').next().unwrap_or("").trim();
        match ct {
            "text/html" | "application/xhtml+xml" => ContentTypeId::Html,
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                ContentTypeId::Script
            }
            "text/css" => ContentTypeId::Stylesheet,
            "application/json" | "text/json" => ContentTypeId::Json,
            "application/xml" | "text/xml" | "application/rss+xml" => ContentTypeId::Xml,
            _ if ct.starts_with("image/") => ContentTypeId::Image,
            _ if ct.starts_with("audio/") => ContentTypeId::Audio,
            _ if ct.starts_with("video/") => ContentTypeId::Video,
            _ if ct.starts_with("font/") || ct.contains("font") => ContentTypeId::Font,
            "application/pdf" | "application/msword" => ContentTypeId::Document,
            _ => ContentTypeId::Other,
        }
    }
}

/// `{accepts(contentTypeId); findUrls(body, source) -> [FoundUrl]}`,
/// tagged-variant dispatch via trait objects rather than one monolithic
/// parser.
pub trait ContentProcessor: Send + Sync {
    fn accepts(&self, content_type: ContentTypeId) -> bool;
    fn find_urls(&self, body: &[u8], source_url: &ParsedUrl, out: &mut FoundUrlSet);
}

pub fn default_processors() -> Vec<Box<dyn ContentProcessor>> {
    vec![
        Box::new(HtmlProcessor),
        Box::new(CssProcessor),
        Box::new(JsProcessor),
        Box::new(XmlProcessor),
    ]
}
