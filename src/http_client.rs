//! HTTP client: a thin wrapper over `reqwest` that applies
//! the crawler's fetch policy — byte-capped streaming bodies, synthetic
//! negative status codes for transport failures, optional forced-IP
//! resolution with Host/SNI preserved, proxying, and basic auth gated to the
//! crawl's own host. Adapted from the plain single-purpose fetcher this
//! crate started from.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use bytes::BytesMut;
use futures_util::StreamExt;
use reqwest::{header, redirect, Client, StatusCode};
use url::Url;

/// Synthetic status codes surfaced when a request never produced a real HTTP
/// response: distinguished from genuine 1xx-5xx codes so downstream
/// per-basename failure bucketing can tell a DNS failure from a server
/// error.
pub const STATUS_CONNECT_FAILED: i32 = -1;
pub const STATUS_TIMEOUT: i32 = -2;
pub const STATUS_TOO_LARGE: i32 = -3;
pub const STATUS_OTHER_TRANSPORT_ERROR: i32 = -4;

#[derive(Debug, Clone)]
pub struct HttpOptions {
    pub user_agent: String,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub max_body_bytes: usize,
    pub proxy: Option<String>,
    pub basic_auth: Option<(String, String)>,
    /// Host the crawl is scoped to; basic auth and the `Origin` header are
    /// only attached to requests targeting this host.
    pub auth_host: Option<String>,
    /// DNS override: always connect to this address regardless of the
    /// request URL's host, while still sending the original Host header and
    /// TLS SNI.
    pub forced_ip: Option<SocketAddr>,
    /// Host name the `forced_ip` resolution override applies to (from
    /// `--resolve host:port:ip`); independent of `auth_host`.
    pub resolve_host: Option<String>,
    pub send_origin_header: bool,
    /// Recorded for cache-fingerprint purposes; actual wire negotiation is
    /// left to reqwest's gzip/brotli/deflate feature flags.
    pub accept_encoding: String,
    pub accept: String,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            user_agent: format!("sitecrawl/{}", env!("CARGO_PKG_VERSION")),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_body_bytes: 32 * 1024 * 1024,
            proxy: None,
            basic_auth: None,
            auth_host: None,
            forced_ip: None,
            resolve_host: None,
            send_origin_header: false,
            accept_encoding: "gzip, deflate, br".to_string(),
            accept: "text/html,application/xhtml+xml;q=0.9,*/*;q=0.1".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetch {
    pub requested: Url,
    pub final_url: Url,
    /// Real HTTP status when available, else one of the `STATUS_*` sentinels.
    pub status_code: i32,
    pub content_type: Option<String>,
    pub location: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub age: Option<String>,
    pub date: Option<String>,
    pub body: Vec<u8>,
    pub from_cache: bool,
}

pub fn build_client(opts: &HttpOptions, crawl_hosts: HashSet<String>) -> Result<Client> {
    let crawl_hosts = Arc::new(crawl_hosts);
    let policy = redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() >= 10 {
            return attempt.stop();
        }
        if let Some(host) = attempt.url().host_str() {
            if crawl_hosts.is_empty() || crawl_hosts.contains(&host.to_ascii_lowercase()) {
                return attempt.follow();
            }
        }
        attempt.stop()
    });

    let mut builder = Client::builder()
        .user_agent(opts.user_agent.clone())
        .timeout(opts.timeout)
        .connect_timeout(opts.connect_timeout)
        .redirect(policy)
        .brotli(true)
        .gzip(true)
        .deflate(true);

    if let (Some(addr), Some(host)) = (opts.forced_ip, opts.resolve_host.as_deref()) {
        builder = builder.resolve(host, addr);
    }
    if let Some(proxy_url) = &opts.proxy {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url).context("invalid proxy URL")?);
    }

    builder.build().context("failed to build HTTP client")
}

pub async fn fetch_limited(client: &Client, url: Url, opts: &HttpOptions) -> HttpFetch {
    let requested = url.clone();
    let mut req = client.get(url.clone()).header(header::ACCEPT, opts.accept.clone());

    let host_matches_auth = opts
        .auth_host
        .as_deref()
        .zip(url.host_str())
        .map(|(a, b)| a.eq_ignore_ascii_case(b))
        .unwrap_or(false);

    if host_matches_auth {
        if let Some((user, pass)) = &opts.basic_auth {
            req = req.basic_auth(user, Some(pass));
        }
        if opts.send_origin_header {
            if let Some(host) = url.host_str() {
                req = req.header(header::ORIGIN, format!("{}://{}", url.scheme(), host));
            }
        }
    }

    let result = req.send().await;

    let resp = match result {
        Ok(r) => r,
        Err(e) => {
            let status_code = if e.is_timeout() {
                STATUS_TIMEOUT
            } else if e.is_connect() {
                STATUS_CONNECT_FAILED
            } else {
                STATUS_OTHER_TRANSPORT_ERROR
            };
            return HttpFetch {
                requested,
                final_url: url,
                status_code,
                content_type: None,
                location: None,
                cache_control: None,
                expires: None,
                age: None,
                date: None,
                body: Vec::new(),
                from_cache: false,
            };
        }
    };

    let status: StatusCode = resp.status();
    let final_url = resp.url().clone();
    let header_str = |name: header::HeaderName| {
        resp.headers().get(name).and_then(|v| v.to_str().ok()).map(|s| s.to_string())
    };
    let content_type = header_str(header::CONTENT_TYPE);
    let location = header_str(header::LOCATION);
    let cache_control = header_str(header::CACHE_CONTROL);
    let expires = header_str(header::EXPIRES);
    let age = header_str(header::AGE);
    let date = header_str(header::DATE);

    let mut stream = resp.bytes_stream();
    let mut buf = BytesMut::new();
    let max_bytes = opts.max_body_bytes;

    while let Some(item) = stream.next().await {
        let chunk = match item {
            Ok(c) => c,
            Err(_) => {
                return HttpFetch {
                    requested,
                    final_url,
                    status_code: STATUS_OTHER_TRANSPORT_ERROR,
                    content_type,
                    location,
                    cache_control,
                    expires,
                    age,
                    date,
                    body: buf.to_vec(),
                    from_cache: false,
                }
            }
        };
        if buf.len() + chunk.len() > max_bytes {
            return HttpFetch {
                requested,
                final_url,
                status_code: STATUS_TOO_LARGE,
                content_type,
                location,
                cache_control,
                expires,
                age,
                date,
                body: buf.to_vec(),
                from_cache: false,
            };
        }
        buf.extend_from_slice(&chunk);
    }

    HttpFetch {
        requested,
        final_url,
        status_code: status.as_u16() as i32,
        content_type,
        location,
        cache_control,
        expires,
        age,
        date,
        body: buf.to_vec(),
        from_cache: false,
    }
}

/// Derives `cacheType` from `Cache-Control` directives, falling back to
/// `Expires`, and `cacheLifetime` in seconds from `max-age` (minus `Age`) or
/// `Expires` minus `Date`.
pub fn parse_cache_metadata(fetch: &HttpFetch) -> (Option<String>, Option<i64>) {
    let cache_type = fetch.cache_control.as_ref().and_then(|cc| {
        let cc_l = cc.to_ascii_lowercase();
        for directive in ["no-store", "no-cache", "private", "public", "immutable"] {
            if cc_l.contains(directive) {
                return Some(directive.to_string());
            }
        }
        None
    }).or_else(|| fetch.expires.as_ref().map(|_| "expires".to_string()));

    let max_age = fetch.cache_control.as_ref().and_then(|cc| {
        cc.split(',').find_map(|part| {
            let part = part.trim();
            part.strip_prefix("max-age=").and_then(|v| v.parse::<i64>().ok())
        })
    });
    let age = fetch.age.as_ref().and_then(|a| a.parse::<i64>().ok()).unwrap_or(0);

    let lifetime = if let Some(max_age) = max_age {
        Some((max_age - age).max(0))
    } else if let (Some(expires), Some(date)) = (&fetch.expires, &fetch.date) {
        match (
            chrono::DateTime::parse_from_rfc2822(expires),
            chrono::DateTime::parse_from_rfc2822(date),
        ) {
            (Ok(exp), Ok(d)) => Some((exp.timestamp() - d.timestamp()).max(0)),
            _ => None,
        }
    } else {
        None
    };

    (cache_type, lifetime)
}

/// Builds the cache fingerprint key for a GET of `url` under `opts` from
/// host, port, scheme, path, method, userAgent, accept, acceptEncoding, and
/// origin.
pub fn cache_fingerprint(url: &Url, opts: &HttpOptions) -> Option<String> {
    let host = url.host_str()?;
    let port = url.port_or_known_default().unwrap_or(0);
    let origin = if opts.send_origin_header {
        opts.auth_host
            .as_deref()
            .filter(|h| h.eq_ignore_ascii_case(host))
            .map(|_| format!("{}://{}", url.scheme(), host))
    } else {
        None
    };
    Some(crate::http_cache::HttpCache::fingerprint(&crate::http_cache::FingerprintInput {
        host,
        port,
        scheme: url.scheme(),
        path: url.path(),
        method: "GET",
        user_agent: &opts.user_agent,
        accept: &opts.accept,
        accept_encoding: &opts.accept_encoding,
        origin: origin.as_deref(),
    }))
}

/// Percent-encodes literal spaces in a path before the request is issued,
/// since some origin servers reject raw spaces outright.
pub fn encode_path_spaces(raw: &str) -> String {
    raw.replace(' ', "%20")
}

pub fn validate_proxy_url(proxy: &str) -> Result<()> {
    Url::parse(proxy).map(|_| ()).map_err(|e| anyhow!("invalid proxy URL {proxy}: {e}"))
}
