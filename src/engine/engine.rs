use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::content::{default_processors, ContentProcessor, ContentTypeId};
use crate::error::{CrawlError, CrawlResult};
use crate::http_cache::HttpCache;
use crate::http_client::HttpOptions;
use crate::ledger::Ledger;
use crate::robots::RobotsOracle;
use crate::url_model::ParsedUrl;

use super::admission::AdmissionConfig;
use super::rate_limiter::RateLimiter;
use super::tables::EngineTables;
use super::worker;

/// Every CLI-tunable budget and scope rule the engine consults.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub seed_url: String,
    pub workers: usize,
    pub max_reqs_per_sec: f64,
    pub timeout: Duration,
    pub max_queue_length: usize,
    pub max_visited_urls: usize,
    pub max_skipped_urls: usize,
    pub max_url_length: usize,
    pub max_non200_responses_per_basename: u32,
    pub allowed_domains_for_external_files: Vec<String>,
    pub allowed_domains_for_crawling: Vec<String>,
    pub single_foreign_page: bool,
    pub max_depth: Option<i64>,
    pub include_regex: Vec<Regex>,
    pub ignore_regex: Vec<Regex>,
    pub regex_filtering_only_for_pages: bool,
    pub ignore_robots_txt: bool,
    pub remove_query_params: bool,
    pub add_random_query_params: bool,
    pub transform_rules: Vec<super::admission::TransformRule>,
    pub crawl_only_html_files: bool,
    pub http: HttpOptions,
    pub http_cache_dir: Option<std::path::PathBuf>,
    pub http_cache_compression: bool,
    /// `--result-storage file` target; `None` keeps the in-process,
    /// in-memory ledger.
    pub ledger_file: Option<std::path::PathBuf>,
}

/// The record handed to the `visited_url_callback` for every URL that
/// reaches `visited`.
#[derive(Debug, Clone)]
pub struct VisitedUrl {
    pub url: String,
    pub uq_id: String,
    pub status_code: i32,
    pub content_type_id: Option<ContentTypeId>,
    pub size: usize,
    pub elapsed_time: f64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub dom_element_count: usize,
}

pub type VisitedCallback =
    Arc<dyn Fn(&VisitedUrl, Option<&[u8]>) -> HashMap<String, String> + Send + Sync>;
pub type DoneCallback = Arc<dyn Fn() + Send + Sync>;

pub struct CrawlEngine {
    pub(crate) config: CrawlConfig,
    pub(crate) tables: Mutex<EngineTables>,
    pub(crate) client: Client,
    pub(crate) http_cache: Option<HttpCache>,
    pub(crate) robots: RobotsOracle,
    pub(crate) rate_limiter: RateLimiter,
    pub(crate) processors: Vec<Box<dyn ContentProcessor>>,
    pub(crate) ledger: Ledger,
    pub(crate) terminated: Arc<AtomicBool>,
    done_called: Arc<AtomicBool>,
    active_workers: AtomicUsize,
    done_count: AtomicUsize,
    /// One-shot adoption of a redirected initial URL before the seed is
    /// confirmed.
    pub(crate) initial_host: Mutex<String>,
    initial_adopted: AtomicBool,
}

impl CrawlEngine {
    pub fn new(config: CrawlConfig) -> CrawlResult<Self> {
        let seed = ParsedUrl::parse(&config.seed_url, None).map_err(|_| {
            CrawlError::ConfigError(format!("invalid seed URL: {}", config.seed_url))
        })?;
        let initial_host = seed.host().unwrap_or_default().to_string();

        let mut crawl_hosts = std::collections::HashSet::new();
        crawl_hosts.insert(initial_host.to_ascii_lowercase());
        for d in &config.allowed_domains_for_crawling {
            crawl_hosts.insert(d.to_ascii_lowercase());
        }

        let client = crate::http_client::build_client(&config.http, crawl_hosts)
            .map_err(|e| CrawlError::ConfigError(e.to_string()))?;

        let http_cache = match &config.http_cache_dir {
            Some(dir) => Some(
                HttpCache::new(dir.clone(), config.http_cache_compression)
                    .map_err(|e| CrawlError::ConfigError(e.to_string()))?,
            ),
            None => None,
        };

        let tables = EngineTables::new(
            config.max_queue_length,
            config.max_visited_urls,
            config.max_skipped_urls,
        );

        let rate_limiter = RateLimiter::new(config.max_reqs_per_sec);
        let robots = RobotsOracle::new(client.clone(), config.ignore_robots_txt);

        let ledger = match &config.ledger_file {
            Some(path) => {
                Ledger::file(path.clone()).map_err(|e| CrawlError::ConfigError(e.to_string()))?
            }
            None => Ledger::memory(),
        };

        Ok(Self {
            config,
            tables: Mutex::new(tables),
            client,
            http_cache,
            robots,
            rate_limiter,
            processors: default_processors(),
            ledger,
            terminated: Arc::new(AtomicBool::new(false)),
            done_called: Arc::new(AtomicBool::new(false)),
            active_workers: AtomicUsize::new(0),
            done_count: AtomicUsize::new(0),
            initial_host: Mutex::new(initial_host),
            initial_adopted: AtomicBool::new(false),
        })
    }

    pub fn admission_config(&self, initial_host: String) -> AdmissionConfig {
        AdmissionConfig {
            initial_host,
            allowed_domains_for_external_files: self.config.allowed_domains_for_external_files.clone(),
            allowed_domains_for_crawling: self.config.allowed_domains_for_crawling.clone(),
            max_non200_responses_per_basename: self.config.max_non200_responses_per_basename,
            max_url_length: self.config.max_url_length,
            max_depth: self.config.max_depth,
            include_regex: self.config.include_regex.clone(),
            ignore_regex: self.config.ignore_regex.clone(),
            regex_filtering_only_for_pages: self.config.regex_filtering_only_for_pages,
            remove_query_params: self.config.remove_query_params,
            add_random_query_params: self.config.add_random_query_params,
            crawl_only_html_files: self.config.crawl_only_html_files,
            ignore_robots_txt: self.config.ignore_robots_txt,
            transform_rules: self.config.transform_rules.clone(),
            single_foreign_page: self.config.single_foreign_page,
        }
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Snapshot of the visited table, for callers inspecting crawl results
    /// after `run` returns.
    pub async fn visited_snapshot(&self) -> Vec<super::tables::VisitedEntry> {
        self.tables.lock().await.visited_entries().cloned().collect()
    }

    pub async fn skipped_snapshot(&self) -> Vec<super::tables::SkippedEntry> {
        self.tables.lock().await.skipped_entries().cloned().collect()
    }

    pub(crate) async fn maybe_adopt_redirect(&self, from: &str, to_host: &str) {
        if self.initial_adopted.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut host = self.initial_host.lock().await;
        let same_2nd_level = crate::util::second_level_domain(&host) == crate::util::second_level_domain(to_host);
        if same_2nd_level {
            info!(from, to = to_host, "adopting redirected initial host");
            *host = to_host.to_string();
        } else {
            self.initial_adopted.store(false, Ordering::SeqCst);
        }
    }

    pub async fn run(self: Arc<Self>, visited_cb: VisitedCallback, done_cb: DoneCallback) -> CrawlResult<()> {
        let seed = ParsedUrl::parse(&self.config.seed_url, None)
            .map_err(|_| CrawlError::ConfigError(format!("invalid seed URL: {}", self.config.seed_url)))?;
        let seed_key = seed.canonical_key();
        {
            let mut tables = self.tables.lock().await;
            tables.enqueue(seed_key, seed.as_str().to_string(), None, None)?;
        }

        let sigint_engine = self.clone();
        let sigint_done_cb = done_cb.clone();
        let sigint_done_called = self.done_called.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("SIGINT received, terminating crawl");
                sigint_engine.terminate();
                if !sigint_done_called.swap(true, Ordering::SeqCst) {
                    (sigint_done_cb)();
                }
            }
        });

        let mut joinset: JoinSet<()> = JoinSet::new();
        let total_count = Arc::new(AtomicUsize::new(1));

        loop {
            if self.is_terminated() {
                break;
            }

            while joinset.len() < self.config.workers {
                if self.is_terminated() {
                    break;
                }
                let Some((key, entry)) = ({
                    let mut tables = self.tables.lock().await;
                    tables.dequeue_to_visited()
                }) else {
                    break;
                };

                self.active_workers.fetch_add(1, Ordering::SeqCst);
                let engine = self.clone();
                let cb = visited_cb.clone();
                let total = total_count.clone();
                joinset.spawn(async move {
                    let added = worker::process_one(&engine, &key, &entry, &cb).await;
                    total.fetch_add(added, Ordering::SeqCst);
                    engine.active_workers.fetch_sub(1, Ordering::SeqCst);
                    engine.done_count.fetch_add(1, Ordering::SeqCst);
                });
            }

            if joinset.is_empty() {
                let queue_empty = {
                    let tables = self.tables.lock().await;
                    tables.queue_len() == 0
                };
                let idle = self.active_workers.load(Ordering::SeqCst) == 0;
                if queue_empty && idle {
                    break;
                }
            }

            let done = self.done_count.load(Ordering::SeqCst);
            let total = total_count.load(Ordering::SeqCst);
            if total >= 2 && done >= total {
                break;
            }

            if joinset.join_next().await.is_none() {
                tokio::task::yield_now().await;
            }
        }

        while joinset.join_next().await.is_some() {}

        self.terminate();
        if !self.done_called.swap(true, Ordering::SeqCst) {
            (done_cb)();
        }
        Ok(())
    }
}
