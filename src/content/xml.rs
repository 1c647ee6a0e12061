use std::io::Read;

use flate2::read::GzDecoder;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{ContentProcessor, ContentTypeId};
use crate::found_url::{FoundUrlSet, SourceTag};
use crate::url_model::ParsedUrl;

/// A single `<loc>` entry recovered from a sitemap or sitemap index, adapted
/// from the gzip-sniffing quick-xml walk the crawler already used for
/// sitemap discovery.
#[derive(Debug, Clone)]
pub struct SitemapEntry {
    pub loc: String,
    pub is_index: bool,
}

pub struct XmlProcessor;

impl ContentProcessor for XmlProcessor {
    fn accepts(&self, content_type: ContentTypeId) -> bool {
        content_type == ContentTypeId::Xml
    }

    fn find_urls(&self, body: &[u8], source_url: &ParsedUrl, out: &mut FoundUrlSet) {
        for entry in XmlProcessor::parse_sitemap(body) {
            out.insert(&entry.loc, source_url, SourceTag::Sitemap);
        }
    }
}

impl XmlProcessor {
    /// Transparently gunzips the body (gzip-sniffed by magic bytes `1f 8b`,
    /// since sitemap files are commonly served as `.xml.gz`), then walks all
    /// `<loc>` elements, tagging whether the document root was a
    /// `<sitemapindex>` (nested sitemaps) or a `<urlset>` (page entries).
    pub fn parse_sitemap(body: &[u8]) -> Vec<SitemapEntry> {
        let decompressed;
        let xml_bytes: &[u8] = if body.len() >= 2 && body[0] == 0x1f && body[1] == 0x8b {
            let mut gz = GzDecoder::new(body);
            let mut buf = Vec::new();
            if gz.read_to_end(&mut buf).is_err() {
                return Vec::new();
            }
            decompressed = buf;
            &decompressed
        } else {
            body
        };

        let xml = String::from_utf8_lossy(xml_bytes);
        let mut reader = Reader::from_str(&xml);
        reader.config_mut().trim_text(true);

        let mut entries = Vec::new();
        let mut is_index = false;
        let mut in_loc = false;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = e.local_name();
                    let name = String::from_utf8_lossy(name.as_ref()).to_string();
                    if name.eq_ignore_ascii_case("sitemapindex") {
                        is_index = true;
                    } else if name.eq_ignore_ascii_case("loc") {
                        in_loc = true;
                    }
                }
                Ok(Event::End(e)) => {
                    let name = e.local_name();
                    if String::from_utf8_lossy(name.as_ref()).eq_ignore_ascii_case("loc") {
                        in_loc = false;
                    }
                }
                Ok(Event::Text(t)) => {
                    if in_loc {
                        if let Ok(text) = t.unescape() {
                            let loc = text.trim().to_string();
                            if !loc.is_empty() {
                                entries.push(SitemapEntry {
                                    loc,
                                    is_index,
                                });
                            }
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => break,
                _ => {}
            }
            buf.clear();
        }

        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset_locs() {
        let xml = br#"<?xml version="1.0"?>
            <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                <url><loc>https://example.com/a</loc></url>
                <url><loc>https://example.com/b</loc></url>
            </urlset>"#;
        let entries = XmlProcessor::parse_sitemap(xml);
        assert_eq!(entries.len(), 2);
        assert!(!entries[0].is_index);
        assert_eq!(entries[0].loc, "https://example.com/a");
    }

    #[test]
    fn detects_sitemap_index() {
        let xml = br#"<sitemapindex>
                <sitemap><loc>https://example.com/sitemap-a.xml</loc></sitemap>
            </sitemapindex>"#;
        let entries = XmlProcessor::parse_sitemap(xml);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].is_index);
    }

    #[test]
    fn returns_empty_for_malformed_xml() {
        let entries = XmlProcessor::parse_sitemap(b"not xml at all");
        assert!(entries.is_empty());
    }
}
