use super::{ContentProcessor, ContentTypeId};
use crate::found_url::{FoundUrlSet, SourceTag};
use crate::url_model::ParsedUrl;

pub struct CssProcessor;

impl ContentProcessor for CssProcessor {
    fn accepts(&self, content_type: ContentTypeId) -> bool {
        content_type == ContentTypeId::Stylesheet
    }

    fn find_urls(&self, body: &[u8], source_url: &ParsedUrl, out: &mut FoundUrlSet) {
        let css = String::from_utf8_lossy(body);
        for url in extract_css_urls(&css) {
            out.insert(&url, source_url, SourceTag::CssUrl);
        }
    }
}

/// Pulls the argument out of every `url(...)` occurrence, stripping
/// surrounding quotes. Used both for whole stylesheets and for inline
/// `style="..."` attribute values embedded in HTML.
pub fn extract_css_urls(css: &str) -> Vec<String> {
    let mut out = Vec::new();
    let bytes = css.as_bytes();
    let mut i = 0;
    while let Some(pos) = css[i..].find("url(") {
        let start = i + pos + 4;
        let Some(end_rel) = css[start..].find(')') else {
            break;
        };
        let raw = css[start..start + end_rel].trim();
        let cleaned = raw.trim_matches(|c| c == '"' || c == '\'').trim();
        if !cleaned.is_empty() && !cleaned.starts_with("data:") {
            out.push(cleaned.to_string());
        }
        i = start + end_rel + 1;
        if i >= bytes.len() {
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_quoted_and_unquoted_urls() {
        let css = r#"
            .a { background: url("/a.png"); }
            .b { background: url('/b.png'); }
            .c { background: url(/c.png); }
        "#;
        let urls = extract_css_urls(css);
        assert_eq!(urls, vec!["/a.png", "/b.png", "/c.png"]);
    }

    #[test]
    fn skips_data_uris() {
        let css = "a { background: url(data:image/png;base64,aaaa); }";
        assert!(extract_css_urls(css).is_empty());
    }
}
