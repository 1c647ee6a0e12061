//! Worker loop: the numbered fetch-classify-extract-admit-record steps run
//! for every dequeued URL.

use std::time::Instant;

use tracing::{debug, warn};

use crate::content::{ContentTypeId, HtmlProcessor};
use crate::found_url::{FoundUrl, FoundUrlSet, SourceTag};
use crate::http_client;
use crate::url_model::ParsedUrl;

use super::admission::{Admission, AdmissionPipeline};
use super::engine::{CrawlEngine, VisitedCallback, VisitedUrl};
use super::tables::QueueEntry;

/// Processes one dequeued URL end to end and returns the number of new
/// candidates admitted into the queue as a result (used to track
/// `total_count` for the engine's termination check).
pub async fn process_one(
    engine: &CrawlEngine,
    key: &str,
    entry: &QueueEntry,
    visited_cb: &VisitedCallback,
) -> usize {
    let source_url = match ParsedUrl::parse(&entry.url, None) {
        Ok(u) => u,
        Err(e) => {
            warn!(url = %entry.url, error = %e, "failed to re-parse dequeued URL");
            return 0;
        }
    };
    let basename = source_url.base_name();

    // Step 2: basename already over threshold -> synthesize a skip, no I/O.
    let threshold = engine.config.max_non200_responses_per_basename;
    if threshold > 0 {
        let tables = engine.tables.lock().await;
        if tables.non200_count(&basename) >= threshold {
            drop(tables);
            debug!(url = %entry.url, basename, "basename over non-200 threshold, skipping without fetch");
            return 0;
        }
    }

    if engine.is_terminated() {
        return 0;
    }

    let fingerprint = engine
        .http_cache
        .as_ref()
        .and_then(|_| http_client::cache_fingerprint(source_url.inner(), &engine.config.http));
    let cached = fingerprint
        .as_deref()
        .and_then(|fp| engine.http_cache.as_ref().and_then(|c| c.get(fp)));

    let start = Instant::now();
    let fetch = if let Some((status_code, content_type, body)) = cached {
        debug!(url = %entry.url, "serving from HTTP cache");
        http_client::HttpFetch {
            requested: source_url.inner().clone(),
            final_url: source_url.inner().clone(),
            status_code,
            content_type,
            location: None,
            cache_control: None,
            expires: None,
            age: None,
            date: None,
            body,
            from_cache: true,
        }
    } else {
        engine.rate_limiter.wait_turn().await;
        let fresh = http_client::fetch_limited(&engine.client, source_url.inner().clone(), &engine.config.http).await;
        if let (Some(fp), Some(cache)) = (&fingerprint, &engine.http_cache) {
            let _ = cache.put(fp, fresh.status_code, fresh.content_type.as_deref(), &fresh.body);
        }
        fresh
    };
    let elapsed = start.elapsed().as_secs_f64();

    if engine.is_terminated() {
        return 0;
    }

    // Step 4: classify.
    let content_type = ContentTypeId::classify(fetch.content_type.as_deref(), fetch.location.is_some());

    if fetch.status_code < 0 || fetch.status_code >= 400 {
        engine.tables.lock().await.record_non200(&basename);
    }

    let mut found = FoundUrlSet::new();
    let mut html_meta = None;

    // Steps 6-7: content-processor dispatch.
    match content_type {
        ContentTypeId::Html => {
            let (set, meta) = HtmlProcessor::extract(&fetch.body, &source_url);
            found = set;
            html_meta = Some(meta);
        }
        ContentTypeId::Stylesheet | ContentTypeId::Script | ContentTypeId::Xml => {
            for proc in &engine.processors {
                if proc.accepts(content_type) {
                    proc.find_urls(&fetch.body, &source_url, &mut found);
                }
            }
        }
        _ => {}
    }

    // Step 8: redirect handling.
    if let Some(location) = &fetch.location {
        found.insert(location, &source_url, SourceTag::Redirect);
        if let Ok(target) = ParsedUrl::parse(location, Some(&source_url)) {
            if let Some(target_host) = target.host() {
                if target_host != source_url.host().unwrap_or_default() {
                    engine.maybe_adopt_redirect(source_url.as_str(), target_host).await;
                }
            }
        }
    }

    // Admission pipeline for every candidate this step produced.
    let initial_host = engine.initial_host.lock().await.clone();
    let admission_config = engine.admission_config(initial_host);
    let pipeline = AdmissionPipeline { config: &admission_config };
    let mut admitted = 0usize;

    for candidate in found.into_vec() {
        admitted += admit_candidate(engine, &pipeline, &candidate, &entry.uq_id).await;
    }

    // Step 9: update VisitedEntry, including Cache-Control/Expires/Age/Date
    // derived cache metadata.
    let (cache_type, cache_lifetime) = http_client::parse_cache_metadata(&fetch);
    {
        let mut tables = engine.tables.lock().await;
        let _ = tables.update_visited(key, |v| {
            v.elapsed_time = elapsed;
            v.status_code = fetch.status_code;
            v.size = fetch.body.len();
            v.content_type_id = Some(content_type);
            v.cache_type = cache_type.clone();
            v.cache_lifetime = cache_lifetime;
        });
    }

    let visited = VisitedUrl {
        url: source_url.as_str().to_string(),
        uq_id: entry.uq_id.clone(),
        status_code: fetch.status_code,
        content_type_id: Some(content_type),
        size: fetch.body.len(),
        elapsed_time: elapsed,
        title: html_meta.as_ref().and_then(|m| m.title.clone()),
        description: html_meta.as_ref().and_then(|m| m.description.clone()),
        keywords: html_meta.as_ref().and_then(|m| m.keywords.clone()),
        dom_element_count: html_meta.as_ref().map(|m| m.dom_element_count).unwrap_or(0),
    };

    engine.ledger.append(&into_visited_entry(&visited)).await.ok();

    // Step 10: analyzer callback.
    let body_ref = if fetch.body.is_empty() { None } else { Some(fetch.body.as_slice()) };
    let _extra_columns = (visited_cb)(&visited, body_ref);

    admitted
}

async fn admit_candidate(
    engine: &CrawlEngine,
    pipeline: &AdmissionPipeline<'_>,
    candidate: &FoundUrl,
    source_uq_id: &str,
) -> usize {
    let tables_snapshot = engine.tables.lock().await;
    let decision = pipeline.evaluate(candidate, &engine.robots, &tables_snapshot).await;
    drop(tables_snapshot);

    match decision {
        Ok(Admission::Admitted(parsed)) => {
            let key = parsed.canonical_key();
            let mut tables = engine.tables.lock().await;
            match tables.enqueue(
                key,
                parsed.as_str().to_string(),
                Some(source_uq_id.to_string()),
                Some(candidate.source_tag),
            ) {
                Ok(()) => 1,
                Err(e) => {
                    warn!(error = %e, "failed to enqueue admitted candidate");
                    0
                }
            }
        }
        Ok(Admission::Skipped(reason)) => {
            if let Ok(parsed) = ParsedUrl::parse(&candidate.normalized_url, Some(&candidate.source_url)) {
                let key = parsed.canonical_key();
                let mut tables = engine.tables.lock().await;
                let _ = tables.skip(
                    key,
                    parsed.as_str().to_string(),
                    reason,
                    Some(source_uq_id.to_string()),
                    Some(candidate.source_tag),
                );
            }
            0
        }
        Ok(Admission::Rejected) | Err(_) => 0,
    }
}

fn into_visited_entry(v: &VisitedUrl) -> crate::engine::tables::VisitedEntry {
    crate::engine::tables::VisitedEntry {
        url: v.url.clone(),
        uq_id: v.uq_id.clone(),
        state: crate::engine::tables::VisitState::Visited,
        elapsed_time: v.elapsed_time,
        status_code: v.status_code,
        size: v.size,
        content_type_id: v.content_type_id,
        cache_type: None,
        cache_lifetime: None,
    }
}
