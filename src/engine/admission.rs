//! Admission pipeline: the ordered filters a candidate `FoundUrl` must clear
//! before it is inserted into the queue, plus the depth-limit check folded
//! in right after scope, using the same host check's short-circuit shape.

use regex::Regex;

use crate::error::CrawlError;
use crate::found_url::{FoundUrl, SourceTag};
use crate::url_model::ParsedUrl;

use super::tables::{EngineTables, SkipReason};

const ASSET_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "ico", "css", "woff", "woff2", "ttf", "otf",
    "eot", "mp4", "mp3", "webm", "avi",
];

#[derive(Debug, Clone)]
pub struct AdmissionConfig {
    pub initial_host: String,
    pub allowed_domains_for_external_files: Vec<String>,
    pub allowed_domains_for_crawling: Vec<String>,
    pub max_non200_responses_per_basename: u32,
    pub max_url_length: usize,
    pub max_depth: Option<i64>,
    pub include_regex: Vec<Regex>,
    pub ignore_regex: Vec<Regex>,
    pub regex_filtering_only_for_pages: bool,
    pub remove_query_params: bool,
    pub add_random_query_params: bool,
    pub crawl_only_html_files: bool,
    pub ignore_robots_txt: bool,
    pub transform_rules: Vec<TransformRule>,
    /// Restricts crawling on allowed foreign domains to the linked page and
    /// its direct assets (`--single-foreign-page`).
    pub single_foreign_page: bool,
}

/// One `--transform-url "from -> to"` rewrite: `from` is a regex when
/// delimited with slashes (`/foo/ -> /bar/`), else a literal substring
/// replacement.
#[derive(Debug, Clone)]
pub struct TransformRule {
    pub from_regex: Option<Regex>,
    pub from_literal: String,
    pub to: String,
}

impl TransformRule {
    pub fn parse(raw: &str) -> Option<Self> {
        let (from, to) = raw.split_once("->")?;
        let from = from.trim();
        let to = to.trim().to_string();
        if from.len() >= 2 && from.starts_with('/') && from.ends_with('/') {
            let pattern = &from[1..from.len() - 1];
            let regex = Regex::new(pattern).ok()?;
            Some(Self { from_regex: Some(regex), from_literal: String::new(), to })
        } else {
            Some(Self { from_regex: None, from_literal: from.to_string(), to })
        }
    }

    pub fn apply(&self, url: &str) -> String {
        match &self.from_regex {
            Some(re) => re.replace_all(url, self.to.as_str()).into_owned(),
            None => url.replace(&self.from_literal, &self.to),
        }
    }
}

pub enum Admission {
    Admitted(ParsedUrl),
    Skipped(SkipReason),
    Rejected,
}

pub struct AdmissionPipeline<'a> {
    pub config: &'a AdmissionConfig,
}

impl<'a> AdmissionPipeline<'a> {
    pub async fn evaluate(
        &self,
        candidate: &FoundUrl,
        robots: &crate::robots::RobotsOracle,
        tables: &EngineTables,
    ) -> Result<Admission, CrawlError> {
        // 1. Requestable resource check.
        if !crate::found_url::is_requestable_candidate(&candidate.normalized_url) {
            return Ok(Admission::Rejected);
        }

        let parsed = match ParsedUrl::parse(&candidate.normalized_url, Some(&candidate.source_url)) {
            Ok(p) => p,
            Err(_) => return Ok(Admission::Rejected),
        };
        let basename = parsed.base_name();

        // 2. Basename-loop guard.
        if self.config.max_non200_responses_per_basename > 0
            && tables.non200_count(&basename) >= self.config.max_non200_responses_per_basename
        {
            return Ok(Admission::Rejected);
        }

        // 3. Scope.
        let host = parsed.host().unwrap_or_default();
        let is_asset = is_asset_extension(&parsed);
        let in_initial_scope = host.eq_ignore_ascii_case(&self.config.initial_host);
        let in_external_scope = is_asset
            && self
                .config
                .allowed_domains_for_external_files
                .iter()
                .any(|pat| domain_matches(pat, host));
        let in_crawl_scope = self
            .config
            .allowed_domains_for_crawling
            .iter()
            .any(|pat| domain_matches(pat, host));

        if !(in_initial_scope || in_external_scope || in_crawl_scope) {
            return Ok(Admission::Skipped(SkipReason::NotAllowedHost));
        }

        if self.config.single_foreign_page && !is_asset {
            let source_host = candidate.source_url.host().unwrap_or_default();
            let source_is_foreign = !source_host.eq_ignore_ascii_case(&self.config.initial_host);
            if source_is_foreign {
                return Ok(Admission::Rejected);
            }
        }

        // Depth limit, folded in alongside scope (SkipReason::ExceedsMaxDepth
        // has no dedicated slot in the seven-step scope/query ordering above).
        if let Some(max_depth) = self.config.max_depth {
            if parsed.depth() > max_depth {
                return Ok(Admission::Skipped(SkipReason::ExceedsMaxDepth));
            }
        }

        // 4. Robots (static files bypass).
        if !is_asset {
            let port = parsed.port();
            let allowed = robots
                .is_allowed(host, port, parsed.scheme(), parsed.path())
                .await;
            if !allowed {
                return Ok(Admission::Skipped(SkipReason::RobotsTxt));
            }
        }

        // 5. Absolute-URL construction: fragment already excluded by
        // canonical_key; optionally strip query, apply rewrite rules, and
        // optionally append a cache-busting random query param.
        let mut rewritten = parsed.as_str().to_string();
        for rule in &self.config.transform_rules {
            rewritten = rule.apply(&rewritten);
        }
        let mut final_url = match ParsedUrl::parse(&rewritten, None) {
            Ok(p) => p,
            Err(_) => parsed,
        };

        if self.config.remove_query_params && final_url.query().is_some() {
            let stripped = final_url.as_str().split('?').next().unwrap_or(final_url.as_str()).to_string();
            if let Ok(p) = ParsedUrl::parse(&stripped, None) {
                final_url = p;
            }
        } else if self.config.add_random_query_params {
            let buster: u32 = rand::random();
            let sep = if final_url.query().is_some() { '&' } else { '?' };
            let with_buster = format!("{}{sep}_scbust={buster:08x}", final_url.as_str());
            if let Ok(p) = ParsedUrl::parse(&with_buster, None) {
                final_url = p;
            }
        }

        // 6. Include/ignore regex.
        let is_static = final_url.is_static_file();
        let bypass_regex = self.config.regex_filtering_only_for_pages && is_static;
        if !bypass_regex {
            let key = final_url.as_str();
            if !self.config.include_regex.is_empty()
                && !self.config.include_regex.iter().any(|r| r.is_match(key))
            {
                return Ok(Admission::Rejected);
            }
            if self.config.ignore_regex.iter().any(|r| r.is_match(key)) {
                return Ok(Admission::Rejected);
            }
        }

        // 7. Queue suitability.
        if final_url.as_str().len() > self.config.max_url_length {
            return Ok(Admission::Rejected);
        }
        let key = final_url.canonical_key();
        if tables.contains(&key) {
            return Ok(Admission::Rejected);
        }
        if tables.visited_plus_queue_len() >= tables.max_visited_urls {
            return Ok(Admission::Rejected);
        }
        let looks_like_html = final_url.extension().is_none() || !final_url.is_static_file();
        let is_sitemap = candidate.source_tag == SourceTag::Sitemap;
        if self.config.crawl_only_html_files && !looks_like_html && !is_sitemap {
            return Ok(Admission::Rejected);
        }

        Ok(Admission::Admitted(final_url))
    }
}

fn is_asset_extension(url: &ParsedUrl) -> bool {
    url.extension().is_some_and(|e| ASSET_EXTENSIONS.contains(&e.as_str()))
}

/// Wildcard host matching: `*` matches any host, `*.suffix`
/// matches a suffix, `prefix.*` matches a prefix, plain strings match
/// exactly (case-insensitively).
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    let host_l = host.to_ascii_lowercase();
    let pat_l = pattern.to_ascii_lowercase();
    if pat_l == "*" {
        return true;
    }
    if let Some(suffix) = pat_l.strip_prefix('*') {
        return host_l.ends_with(suffix);
    }
    if let Some(prefix) = pat_l.strip_suffix('*') {
        return host_l.starts_with(prefix);
    }
    host_l == pat_l
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matching() {
        assert!(domain_matches("*", "anything.com"));
        assert!(domain_matches("*.example.com", "cdn.example.com"));
        assert!(!domain_matches("*.example.com", "example.org"));
        assert!(domain_matches("cdn.*", "cdn.example.com"));
        assert!(domain_matches("example.com", "EXAMPLE.com"));
    }
}
