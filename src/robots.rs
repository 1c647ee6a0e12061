//! Robots oracle: fetches and memoizes `robots.txt` per
//! `(host, port)`, falling back from https:443 to http:80, and answers
//! `is_allowed(path)` against the crawler's own user-agent block (or the
//! wildcard block).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use url::Url;

const CRAWLER_UA_TOKEN: &str = "sitecrawl";
const FETCH_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone)]
struct RobotsRules {
    disallow: Vec<String>,
}

impl RobotsRules {
    fn allow_all() -> Self {
        Self { disallow: Vec::new() }
    }

    fn is_allowed(&self, path: &str) -> bool {
        !self.disallow.iter().any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Memoized per-`(host, port)` robots.txt fetch/parse. A single in-flight
/// fetch per host is enforced by caching the fetch's future result behind a
/// mutex rather than a plain map, so concurrent workers hitting a new host
/// don't stampede it with duplicate robots.txt requests.
pub struct RobotsOracle {
    client: Client,
    cache: Mutex<HashMap<(String, u16), Arc<RobotsRules>>>,
    ignore: bool,
}

impl RobotsOracle {
    pub fn new(client: Client, ignore: bool) -> Self {
        Self {
            client,
            cache: Mutex::new(HashMap::new()),
            ignore,
        }
    }

    pub async fn is_allowed(&self, host: &str, port: u16, scheme: &str, path: &str) -> bool {
        if self.ignore {
            return true;
        }
        let rules = self.rules_for(host, port, scheme).await;
        rules.is_allowed(path)
    }

    async fn rules_for(&self, host: &str, port: u16, scheme: &str) -> Arc<RobotsRules> {
        let key = (host.to_ascii_lowercase(), port);
        {
            let cache = self.cache.lock().await;
            if let Some(rules) = cache.get(&key) {
                return rules.clone();
            }
        }

        let rules = Arc::new(self.fetch_and_parse(host, port, scheme).await);
        let mut cache = self.cache.lock().await;
        cache.entry(key).or_insert_with(|| rules.clone());
        rules
    }

    async fn fetch_and_parse(&self, host: &str, port: u16, scheme: &str) -> RobotsRules {
        let default_port = if scheme == "https" { 443 } else { 80 };
        let url_str = if port == default_port {
            format!("{scheme}://{host}/robots.txt")
        } else {
            format!("{scheme}://{host}:{port}/robots.txt")
        };

        if let Ok(url) = Url::parse(&url_str) {
            if let Some(body) = self.try_fetch(url).await {
                return parse_robots_txt(&body);
            }
        }

        // https:443 fetch failure falls back to http:80 before giving up and
        // treating the host as allow-all.
        if scheme == "https" && port == 443 {
            if let Ok(url) = Url::parse(&format!("http://{host}/robots.txt")) {
                if let Some(body) = self.try_fetch(url).await {
                    return parse_robots_txt(&body);
                }
            }
        }

        RobotsRules::allow_all()
    }

    async fn try_fetch(&self, url: Url) -> Option<String> {
        let resp = tokio::time::timeout(FETCH_TIMEOUT, self.client.get(url).send())
            .await
            .ok()?
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }
}

/// Parses the block matching our user-agent token, falling back to the
/// wildcard (`User-agent: *`) block when no exact match exists.
fn parse_robots_txt(body: &str) -> RobotsRules {
    let mut wildcard_disallow = Vec::new();
    let mut ours_disallow = Vec::new();
    let mut in_wildcard = false;
    let mut in_ours = false;

    for line in body.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((directive, value)) = line.split_once(':') else {
            continue;
        };
        let directive = directive.trim().to_ascii_lowercase();
        let value = value.trim();

        match directive.as_str() {
            "user-agent" => {
                in_wildcard = value == "*";
                in_ours = value.to_ascii_lowercase().contains(CRAWLER_UA_TOKEN);
            }
            "disallow" => {
                if !value.is_empty() {
                    if in_wildcard {
                        wildcard_disallow.push(value.to_string());
                    }
                    if in_ours {
                        ours_disallow.push(value.to_string());
                    }
                }
            }
            _ => {}
        }
    }

    if !ours_disallow.is_empty() {
        RobotsRules { disallow: ours_disallow }
    } else {
        RobotsRules { disallow: wildcard_disallow }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wildcard_block() {
        let body = "User-agent: *\nDisallow: /private/\nDisallow: /tmp\n";
        let rules = parse_robots_txt(body);
        assert!(!rules.is_allowed("/private/x"));
        assert!(!rules.is_allowed("/tmp"));
        assert!(rules.is_allowed("/public"));
    }

    #[test]
    fn prefers_crawler_specific_block() {
        let body = "User-agent: sitecrawl\nDisallow: /only-for-us/\n\nUser-agent: *\nDisallow: /for-everyone/\n";
        let rules = parse_robots_txt(body);
        assert!(!rules.is_allowed("/only-for-us/x"));
        assert!(rules.is_allowed("/for-everyone/x"));
    }

    #[test]
    fn empty_disallow_value_allows_everything() {
        let body = "User-agent: *\nDisallow:\n";
        let rules = parse_robots_txt(body);
        assert!(rules.is_allowed("/anything"));
    }
}
