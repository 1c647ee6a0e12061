use std::collections::HashMap;

use crate::engine::VisitedUrl;

/// Surfaces the Title/Description/Keywords/DOM-count columns the HTML
/// content processor already extracted, as extra output columns.
pub fn seo_columns(visited: &VisitedUrl) -> HashMap<String, String> {
    let mut cols = HashMap::new();
    if let Some(title) = &visited.title {
        cols.insert("title".to_string(), title.clone());
    }
    if let Some(desc) = &visited.description {
        cols.insert("description".to_string(), desc.clone());
    }
    if let Some(keywords) = &visited.keywords {
        cols.insert("keywords".to_string(), keywords.clone());
    }
    cols.insert("dom_elements".to_string(), visited.dom_element_count.to_string());
    cols
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emits_only_present_columns() {
        let visited = VisitedUrl {
            url: "https://example.com/".into(),
            uq_id: "deadbeef".into(),
            status_code: 200,
            content_type_id: None,
            size: 0,
            elapsed_time: 0.0,
            title: Some("Hi".into()),
            description: None,
            keywords: None,
            dom_element_count: 12,
        };
        let cols = seo_columns(&visited);
        assert_eq!(cols.get("title").map(String::as_str), Some("Hi"));
        assert!(!cols.contains_key("description"));
        assert_eq!(cols.get("dom_elements").map(String::as_str), Some("12"));
    }
}
