use super::{ContentProcessor, ContentTypeId};
use crate::found_url::{FoundUrlSet, SourceTag};
use crate::url_model::ParsedUrl;

/// JavaScript gets only narrow, conservative treatment: framework
/// build-manifest references of the `_next/*manifest*.js` shape, never a
/// general script-body URL scan (too noisy, too many false positives from
/// string literals and comments).
pub struct JsProcessor;

impl ContentProcessor for JsProcessor {
    fn accepts(&self, content_type: ContentTypeId) -> bool {
        content_type == ContentTypeId::Script
    }

    fn find_urls(&self, body: &[u8], source_url: &ParsedUrl, out: &mut FoundUrlSet) {
        let js = String::from_utf8_lossy(body);
        for candidate in find_manifest_references(&js) {
            out.insert(&candidate, source_url, SourceTag::JsUrl);
        }
    }
}

fn find_manifest_references(js: &str) -> Vec<String> {
    let mut out = Vec::new();
    for quote in ['"', '\''] {
        let mut i = 0;
        while let Some(pos) = js[i..].find(quote) {
            let start = i + pos + 1;
            let Some(end_rel) = js[start..].find(quote) else {
                break;
            };
            let candidate = &js[start..start + end_rel];
            if candidate.contains("_next/") && candidate.contains("manifest") && candidate.ends_with(".js") {
                out.push(candidate.to_string());
            }
            i = start + end_rel + 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_next_manifest_references() {
        let js = r#"self.__BUILD_MANIFEST = "/_next/static/abc/_buildManifest.js";"#;
        let found = find_manifest_references(js);
        assert_eq!(found, vec!["/_next/static/abc/_buildManifest.js"]);
    }

    #[test]
    fn ignores_unrelated_string_literals() {
        let js = r#"var x = "/static/app.js"; var y = "hello";"#;
        assert!(find_manifest_references(js).is_empty());
    }
}
