//! CLI surface: every engine-consumed flag as a `clap`-derived field. A
//! hand-rolled argv parser is fine for a ~15-flag surface; this crate's
//! ~30-flag surface with repeatable options, an enum-valued `--device`, and
//! `from -> to` transform syntax is the kind of surface `clap`'s derive API
//! is built for.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Device {
    Desktop,
    Mobile,
    Tablet,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ResultStorage {
    Memory,
    File,
}

#[derive(Debug, Parser)]
#[command(name = "sitecrawl", version, about = "Bounded-concurrency website crawler")]
pub struct Cli {
    /// Seed URL to start crawling from.
    #[arg(long)]
    pub url: String,

    #[arg(long, default_value_t = 8)]
    pub workers: usize,

    #[arg(long = "max-reqs-per-sec", default_value_t = 10.0)]
    pub max_reqs_per_sec: f64,

    #[arg(long, default_value_t = 5)]
    pub timeout: u64,

    #[arg(long = "max-queue-length", default_value_t = 100_000)]
    pub max_queue_length: usize,

    #[arg(long = "max-visited-urls", default_value_t = 100_000)]
    pub max_visited_urls: usize,

    #[arg(long = "max-skipped-urls", default_value_t = 100_000)]
    pub max_skipped_urls: usize,

    #[arg(long = "max-url-length", default_value_t = 2048)]
    pub max_url_length: usize,

    #[arg(long = "max-non200-responses-per-basename", default_value_t = 5)]
    pub max_non200_responses_per_basename: u32,

    #[arg(long = "memory-limit")]
    pub memory_limit: Option<String>,

    #[arg(long = "allowed-domain-for-external-files")]
    pub allowed_domain_for_external_files: Vec<String>,

    #[arg(long = "allowed-domain-for-crawling")]
    pub allowed_domain_for_crawling: Vec<String>,

    #[arg(long = "single-foreign-page", default_value_t = false)]
    pub single_foreign_page: bool,

    #[arg(long = "max-depth")]
    pub max_depth: Option<i64>,

    #[arg(long = "include-regex")]
    pub include_regex: Vec<String>,

    #[arg(long = "ignore-regex")]
    pub ignore_regex: Vec<String>,

    #[arg(long = "regex-filtering-only-for-pages", default_value_t = false)]
    pub regex_filtering_only_for_pages: bool,

    #[arg(long = "ignore-robots-txt", default_value_t = false)]
    pub ignore_robots_txt: bool,

    #[arg(long = "remove-query-params", default_value_t = false)]
    pub remove_query_params: bool,

    #[arg(long = "add-random-query-params", default_value_t = false)]
    pub add_random_query_params: bool,

    /// Repeatable `from -> to` rewrite; `from` is treated as a regex when
    /// delimited (e.g. `/foo/ -> /bar/`).
    #[arg(long = "transform-url")]
    pub transform_url: Vec<String>,

    #[arg(long = "user-agent")]
    pub user_agent: Option<String>,

    #[arg(long, value_enum, default_value_t = Device::Desktop)]
    pub device: Device,

    #[arg(long = "accept-encoding", default_value = "gzip, deflate, br")]
    pub accept_encoding: String,

    #[arg(long)]
    pub proxy: Option<String>,

    #[arg(long = "http-auth")]
    pub http_auth: Option<String>,

    #[arg(long = "resolve")]
    pub resolve: Vec<String>,

    #[arg(long = "http-cache-dir")]
    pub http_cache_dir: Option<String>,

    #[arg(long = "http-cache-compression", default_value_t = false)]
    pub http_cache_compression: bool,

    #[arg(long = "crawl-only-html-files", default_value_t = true)]
    pub crawl_only_html_files: bool,

    #[arg(long = "result-storage", value_enum, default_value_t = ResultStorage::Memory)]
    pub result_storage: ResultStorage,

    #[arg(long = "offline-export-dir")]
    pub offline_export_dir: Option<PathBuf>,

    /// Increase log verbosity; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Cli {
    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// `<ua>!` suppresses the crawler signature suffix; trims the sentinel.
    pub fn resolved_user_agent(&self) -> String {
        let device_default = match self.device {
            Device::Desktop => "Mozilla/5.0 (Windows NT 10.0; Win64; x64)",
            Device::Mobile => "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)",
            Device::Tablet => "Mozilla/5.0 (iPad; CPU OS 17_0 like Mac OS X)",
        };
        let base = self.user_agent.clone().unwrap_or_else(|| device_default.to_string());
        if let Some(stripped) = base.strip_suffix('!') {
            stripped.to_string()
        } else {
            format!("{base} sitecrawl/{}", env!("CARGO_PKG_VERSION"))
        }
    }

    pub fn http_auth_parts(&self) -> Option<(String, String)> {
        let raw = self.http_auth.as_ref()?;
        let (user, pass) = raw.split_once(':')?;
        Some((user.to_string(), pass.to_string()))
    }

    /// Parses the first `--resolve host:port:ip` entry into a forced
    /// resolution target. Only one DNS override is meaningful per crawl
    /// since the client binds a single `resolve()` mapping to the crawl's
    /// own host.
    pub fn forced_resolve(&self) -> Option<(String, std::net::SocketAddr)> {
        let raw = self.resolve.first()?;
        let mut parts = raw.splitn(3, ':');
        let host = parts.next()?.to_string();
        let port: u16 = parts.next()?.parse().ok()?;
        let ip: std::net::IpAddr = parts.next()?.parse().ok()?;
        Some((host, std::net::SocketAddr::new(ip, port)))
    }
}
