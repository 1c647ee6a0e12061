use scraper::{ElementRef, Html, Selector};

use super::ContentProcessor;
use crate::found_url::{FoundUrlSet, SourceTag};
use crate::url_model::ParsedUrl;

use super::ContentTypeId;

/// Title/description/keywords/DOM-count columns collected alongside link
/// extraction.
#[derive(Debug, Clone, Default)]
pub struct HtmlExtract {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub dom_element_count: usize,
}

pub struct HtmlProcessor;

impl ContentProcessor for HtmlProcessor {
    fn accepts(&self, content_type: ContentTypeId) -> bool {
        content_type == ContentTypeId::Html
    }

    fn find_urls(&self, body: &[u8], source_url: &ParsedUrl, out: &mut FoundUrlSet) {
        let html = String::from_utf8_lossy(body);
        extract_urls(&html, source_url, out);
    }
}

impl HtmlProcessor {
    /// Single-pass extraction used by the worker loop: both the Found-URL
    /// set and the title/description/keywords/DOM-count columns.
    pub fn extract(body: &[u8], source_url: &ParsedUrl) -> (FoundUrlSet, HtmlExtract) {
        let html = String::from_utf8_lossy(body);
        let mut found = FoundUrlSet::new();
        extract_urls(&html, source_url, &mut found);
        let meta = extract_metadata(&html);
        (found, meta)
    }
}

/// Pseudo-elements (hyphenated custom-element tags with none of the
/// attributes our extraction rules key on) are ignored rather than stripped
/// from the DOM — selectors below simply never match attributes they don't
/// carry, so framework scaffolding never yields spurious Found-URLs.
fn is_pseudo_element(el: &ElementRef) -> bool {
    let name = el.value().name();
    if !name.contains('-') {
        return false;
    }
    let has_relevant_attr = ["href", "src", "srcset"]
        .iter()
        .any(|a| el.value().attr(a).is_some());
    !has_relevant_attr
}

fn extract_urls(html: &str, source_url: &ParsedUrl, out: &mut FoundUrlSet) {
    let doc = Html::parse_document(html);

    push_attr(&doc, "a[href]", "href", source_url, SourceTag::AHref, out);
    push_attr(&doc, "img[src]", "src", source_url, SourceTag::ImgSrc, out);
    push_srcset(&doc, "img[srcset]", source_url, out);
    push_srcset(&doc, "source[srcset]", source_url, out);
    push_attr(&doc, "input[src]", "src", source_url, SourceTag::InputSrc, out);
    push_attr(&doc, "source[src]", "src", source_url, SourceTag::SourceSrc, out);
    push_attr(&doc, "video[src]", "src", source_url, SourceTag::VideoSrc, out);
    push_attr(&doc, "audio[src]", "src", source_url, SourceTag::AudioSrc, out);
    push_attr(&doc, "script[src]", "src", source_url, SourceTag::ScriptSrc, out);

    // Inline `.src = "..."` assignments inside <script> bodies.
    if let Ok(sel) = Selector::parse("script:not([src])") {
        for el in doc.select(&sel) {
            if is_pseudo_element(&el) {
                continue;
            }
            let text: String = el.text().collect();
            for candidate in find_inline_src_assignments(&text) {
                out.insert(&candidate, source_url, SourceTag::InlineScriptSrc);
            }
        }
    }

    // <link href> filtered by rel: stylesheet/icon/preload/manifest/etc.
    if let Ok(sel) = Selector::parse("link[href]") {
        for el in doc.select(&sel) {
            if is_pseudo_element(&el) {
                continue;
            }
            let rel = el.value().attr("rel").unwrap_or("").to_ascii_lowercase();
            let interesting = matches!(
                rel.as_str(),
                "stylesheet" | "icon" | "shortcut icon" | "preload" | "manifest" | "alternate" | "canonical"
            ) || rel.is_empty();
            if interesting {
                if let Some(href) = el.value().attr("href") {
                    out.insert(href, source_url, SourceTag::LinkHref);
                }
            }
        }
    }

    // CSS url(...) occurrences inside inline <style> attributes/tags.
    if let Ok(sel) = Selector::parse("[style]") {
        for el in doc.select(&sel) {
            if let Some(style) = el.value().attr("style") {
                for url in super::css::extract_css_urls(style) {
                    out.insert(&url, source_url, SourceTag::CssUrl);
                }
            }
        }
    }
    if let Ok(sel) = Selector::parse("style") {
        for el in doc.select(&sel) {
            let css: String = el.text().collect();
            for url in super::css::extract_css_urls(&css) {
                out.insert(&url, source_url, SourceTag::CssUrl);
            }
        }
    }
}

fn push_attr(
    doc: &Html,
    selector: &str,
    attr: &str,
    source_url: &ParsedUrl,
    tag: SourceTag,
    out: &mut FoundUrlSet,
) {
    let Ok(sel) = Selector::parse(selector) else {
        return;
    };
    for el in doc.select(&sel) {
        if is_pseudo_element(&el) {
            continue;
        }
        if let Some(v) = el.value().attr(attr) {
            // Exclude fragment-only `<a href="#...">` references explicitly.
            if attr == "href" && v.trim().starts_with('#') {
                continue;
            }
            out.insert(v, source_url, tag);
        }
    }
}

fn push_srcset(doc: &Html, selector: &str, source_url: &ParsedUrl, out: &mut FoundUrlSet) {
    let Ok(sel) = Selector::parse(selector) else {
        return;
    };
    let attr = "srcset";
    for el in doc.select(&sel) {
        if is_pseudo_element(&el) {
            continue;
        }
        if let Some(v) = el.value().attr(attr) {
            for candidate in v.split(',') {
                // Each candidate is "<url> <descriptor>?"; take the URL token.
                if let Some(url_tok) = candidate.trim().split_whitespace().next() {
                    out.insert(url_tok, source_url, SourceTag::ImgSrcset);
                }
            }
        }
    }
}

/// Conservative regex-free scan for `.src = "..."` / `.src = '...'` inside
/// an inline script body.
fn find_inline_src_assignments(js: &str) -> Vec<String> {
    let mut out = Vec::new();
    let bytes = js.as_bytes();
    let mut i = 0;
    while let Some(pos) = js[i..].find(".src") {
        let start = i + pos + 4;
        let mut j = start;
        while j < bytes.len() && (bytes[j] as char).is_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || bytes[j] != b'=' {
            i = start;
            continue;
        }
        j += 1;
        while j < bytes.len() && (bytes[j] as char).is_whitespace() {
            j += 1;
        }
        if j >= bytes.len() || (bytes[j] != b'"' && bytes[j] != b'\'') {
            i = start;
            continue;
        }
        let quote = bytes[j];
        let val_start = j + 1;
        if let Some(end_rel) = js[val_start..].find(quote as char) {
            let value = &js[val_start..val_start + end_rel];
            if !value.is_empty() {
                out.push(value.to_string());
            }
            i = val_start + end_rel + 1;
        } else {
            break;
        }
    }
    out
}

fn extract_metadata(html: &str) -> HtmlExtract {
    let doc = Html::parse_document(html);
    let mut extract = HtmlExtract::default();

    if let Ok(sel) = Selector::parse("title") {
        extract.title = doc.select(&sel).next().map(|e| e.text().collect::<String>().trim().to_string());
    }
    if let Ok(sel) = Selector::parse(r#"meta[name="description" i]"#) {
        extract.description = doc
            .select(&sel)
            .next()
            .and_then(|e| e.value().attr("content"))
            .map(|s| s.to_string());
    }
    if let Ok(sel) = Selector::parse(r#"meta[name="keywords" i]"#) {
        extract.keywords = doc
            .select(&sel)
            .next()
            .and_then(|e| e.value().attr("content"))
            .map(|s| s.to_string());
    }
    if let Ok(sel) = Selector::parse("*") {
        extract.dom_element_count = doc.select(&sel).count();
    }
    extract
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url() -> ParsedUrl {
        ParsedUrl::parse("https://example.com/page", None).unwrap()
    }

    #[test]
    fn extracts_anchor_and_image_links() {
        let html = r##"<html><body>
            <a href="/a">A</a>
            <a href="#top">skip</a>
            <img src="/img.png">
        </body></html>"##;
        let (found, _) = HtmlProcessor::extract(html.as_bytes(), &url());
        let urls: Vec<_> = found.into_vec().into_iter().map(|f| f.normalized_url).collect();
        assert!(urls.contains(&"/a".to_string()));
        assert!(urls.contains(&"/img.png".to_string()));
        assert!(!urls.iter().any(|u| u.starts_with('#')));
    }

    #[test]
    fn extracts_srcset_candidates() {
        let html = r#"<img srcset="/a.jpg 1x, /b.jpg 2x">"#;
        let (found, _) = HtmlProcessor::extract(html.as_bytes(), &url());
        let urls: Vec<_> = found.into_vec().into_iter().map(|f| f.normalized_url).collect();
        assert!(urls.contains(&"/a.jpg".to_string()));
        assert!(urls.contains(&"/b.jpg".to_string()));
    }

    #[test]
    fn extracts_title_and_meta() {
        let html = r#"<html><head>
            <title>Hello</title>
            <meta name="description" content="desc text">
            <meta name="keywords" content="a,b">
        </head><body><p>x</p></body></html>"#;
        let (_, meta) = HtmlProcessor::extract(html.as_bytes(), &url());
        assert_eq!(meta.title.as_deref(), Some("Hello"));
        assert_eq!(meta.description.as_deref(), Some("desc text"));
        assert_eq!(meta.keywords.as_deref(), Some("a,b"));
        assert!(meta.dom_element_count > 0);
    }

    #[test]
    fn extracts_inline_script_src_assignment() {
        let html = r#"<script>var img = new Image(); img.src = "/lazy.png";</script>"#;
        let (found, _) = HtmlProcessor::extract(html.as_bytes(), &url());
        let urls: Vec<_> = found.into_vec().into_iter().map(|f| f.normalized_url).collect();
        assert!(urls.contains(&"/lazy.png".to_string()));
    }
}
