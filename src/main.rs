use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use regex::Regex;
use sitecrawl::analyzers::seo_columns;
use sitecrawl::analyzers::OfflineExportWriter;
use sitecrawl::cli::Cli;
use sitecrawl::engine::{CrawlConfig, CrawlEngine};
use sitecrawl::error::CrawlError;
use sitecrawl::http_client::HttpOptions;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(CrawlError::ConfigError(msg)) => {
            eprintln!("sitecrawl: {msg}");
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("sitecrawl: {err:#}");
            std::process::exit(1);
        }
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> Result<(), CrawlError> {
    if cli.workers < 1 {
        return Err(CrawlError::ConfigError("workers must be >= 1".to_string()));
    }

    let include_regex = compile_regexes(&cli.include_regex)?;
    let ignore_regex = compile_regexes(&cli.ignore_regex)?;

    let seed_host = url::Url::parse(&cli.url).ok().and_then(|u| u.host_str().map(str::to_string));
    let forced_resolve = cli.forced_resolve();

    let http = HttpOptions {
        user_agent: cli.resolved_user_agent(),
        timeout: cli.timeout_duration(),
        connect_timeout: cli.timeout_duration() + Duration::from_secs(1),
        max_body_bytes: 64 * 1024 * 1024,
        proxy: cli.proxy.clone(),
        basic_auth: cli.http_auth_parts(),
        auth_host: seed_host,
        forced_ip: forced_resolve.as_ref().map(|(_, addr)| *addr),
        resolve_host: forced_resolve.map(|(host, _)| host),
        send_origin_header: cli.http_auth.is_some(),
        accept_encoding: cli.accept_encoding.clone(),
        ..HttpOptions::default()
    };

    let config = CrawlConfig {
        seed_url: cli.url.clone(),
        workers: cli.workers.max(1),
        max_reqs_per_sec: cli.max_reqs_per_sec,
        timeout: cli.timeout_duration(),
        max_queue_length: cli.max_queue_length,
        max_visited_urls: cli.max_visited_urls,
        max_skipped_urls: cli.max_skipped_urls,
        max_url_length: cli.max_url_length,
        max_non200_responses_per_basename: cli.max_non200_responses_per_basename,
        allowed_domains_for_external_files: cli.allowed_domain_for_external_files.clone(),
        allowed_domains_for_crawling: cli.allowed_domain_for_crawling.clone(),
        single_foreign_page: cli.single_foreign_page,
        max_depth: cli.max_depth,
        include_regex,
        ignore_regex,
        regex_filtering_only_for_pages: cli.regex_filtering_only_for_pages,
        ignore_robots_txt: cli.ignore_robots_txt,
        remove_query_params: cli.remove_query_params,
        add_random_query_params: cli.add_random_query_params,
        transform_rules: cli
            .transform_url
            .iter()
            .filter_map(|raw| sitecrawl::engine::admission::TransformRule::parse(raw))
            .collect(),
        crawl_only_html_files: cli.crawl_only_html_files,
        http,
        http_cache_dir: cli
            .http_cache_dir
            .as_ref()
            .filter(|d| d.as_str() != "off")
            .map(|d| std::path::PathBuf::from(d.as_str())),
        http_cache_compression: cli.http_cache_compression,
        ledger_file: matches!(cli.result_storage, sitecrawl::cli::ResultStorage::File)
            .then(|| std::path::PathBuf::from("sitecrawl-ledger.ndjson")),
    };

    let engine = Arc::new(CrawlEngine::new(config)?);

    let offline_export = cli
        .offline_export_dir
        .clone()
        .map(OfflineExportWriter::new)
        .transpose()
        .map_err(|e| CrawlError::ConfigError(e.to_string()))?;
    let offline_export = Arc::new(offline_export);

    let visited_cb: sitecrawl::engine::VisitedCallback = Arc::new(move |visited, body| {
        let mut cols = seo_columns(visited);
        if let (Some(writer), Some(body)) = (offline_export.as_ref(), body) {
            if matches!(visited.content_type_id, Some(sitecrawl::content::ContentTypeId::Html)) {
                if let Err(e) = writer.write_page(&visited.url, body) {
                    tracing::warn!(url = %visited.url, error = %e, "offline export failed");
                } else {
                    cols.insert("offline_exported".to_string(), "true".to_string());
                }
            }
        }
        cols
    });

    let done_cb: sitecrawl::engine::DoneCallback = Arc::new(|| {
        tracing::info!("crawl finished");
    });

    engine.run(visited_cb, done_cb).await
}

fn compile_regexes(patterns: &[String]) -> Result<Vec<Regex>, CrawlError> {
    patterns
        .iter()
        .map(|p| Regex::new(p).map_err(|e| CrawlError::ConfigError(format!("invalid regex {p:?}: {e}"))))
        .collect()
}
