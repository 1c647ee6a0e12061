//! The engine's three fixed-capacity tables plus the non-200 basename
//! counter, behind one lock so every mutation is serialized on whichever
//! task holds it (a single-writer model: any worker may read, but table
//! mutation always happens under this one mutex).

use std::collections::HashMap;

use crate::content::ContentTypeId;
use crate::error::CrawlError;
use crate::found_url::SourceTag;
use crate::util::short_md5_hex;

const UNTRACKED_BASENAMES: &[&str] = &["index", "index.html", "index.htm"];

#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub url: String,
    pub uq_id: String,
    pub source_uq_id: Option<String>,
    pub source_tag: Option<SourceTag>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisitState {
    Queued,
    Visited,
}

#[derive(Debug, Clone)]
pub struct VisitedEntry {
    pub url: String,
    pub uq_id: String,
    pub state: VisitState,
    pub elapsed_time: f64,
    pub status_code: i32,
    pub size: usize,
    pub content_type_id: Option<ContentTypeId>,
    pub cache_type: Option<String>,
    pub cache_lifetime: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotAllowedHost,
    RobotsTxt,
    ExceedsMaxDepth,
}

#[derive(Debug, Clone)]
pub struct SkippedEntry {
    pub url: String,
    pub reason: SkipReason,
    pub uq_id: String,
    pub source_uq_id: Option<String>,
    pub source_tag: Option<SourceTag>,
}

#[derive(Debug, Default)]
pub struct EngineTables {
    queue: HashMap<String, QueueEntry>,
    queue_order: std::collections::VecDeque<String>,
    visited: HashMap<String, VisitedEntry>,
    skipped: HashMap<String, SkippedEntry>,
    non200_basenames: HashMap<String, u32>,

    pub max_queue_length: usize,
    pub max_visited_urls: usize,
    pub max_skipped_urls: usize,
}

impl EngineTables {
    pub fn new(max_queue_length: usize, max_visited_urls: usize, max_skipped_urls: usize) -> Self {
        Self {
            max_queue_length,
            max_visited_urls,
            max_skipped_urls,
            ..Default::default()
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.queue.contains_key(key) || self.visited.contains_key(key)
    }

    pub fn visited_plus_queue_len(&self) -> usize {
        self.visited.len() + self.queue.len()
    }

    pub fn enqueue(
        &mut self,
        key: String,
        url: String,
        source_uq_id: Option<String>,
        source_tag: Option<SourceTag>,
    ) -> Result<(), CrawlError> {
        if self.queue.len() >= self.max_queue_length {
            return Err(CrawlError::CapacityExhausted {
                limit: "max_queue_length",
                capacity: self.max_queue_length,
                url,
            });
        }
        let uq_id = short_md5_hex(&key);
        self.queue.insert(
            key.clone(),
            QueueEntry {
                url,
                uq_id,
                source_uq_id,
                source_tag,
            },
        );
        self.queue_order.push_back(key);
        Ok(())
    }

    /// Moves the head of the queue into `visited` atomically, returning the
    /// dequeued entry. Returns `None` when the queue is empty.
    pub fn dequeue_to_visited(&mut self) -> Option<(String, QueueEntry)> {
        loop {
            let key = self.queue_order.pop_front()?;
            let Some(entry) = self.queue.remove(&key) else {
                continue;
            };
            self.visited.insert(
                key.clone(),
                VisitedEntry {
                    url: entry.url.clone(),
                    uq_id: entry.uq_id.clone(),
                    state: VisitState::Queued,
                    elapsed_time: 0.0,
                    status_code: 0,
                    size: 0,
                    content_type_id: None,
                    cache_type: None,
                    cache_lifetime: None,
                },
            );
            return Some((key, entry));
        }
    }

    pub fn update_visited(&mut self, key: &str, f: impl FnOnce(&mut VisitedEntry)) -> Result<(), CrawlError> {
        match self.visited.get_mut(key) {
            Some(entry) => {
                f(entry);
                entry.state = VisitState::Visited;
                Ok(())
            }
            None => {
                if self.visited.len() >= self.max_visited_urls {
                    return Err(CrawlError::CapacityExhausted {
                        limit: "max_visited_urls",
                        capacity: self.max_visited_urls,
                        url: key.to_string(),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn visited_entries(&self) -> impl Iterator<Item = &VisitedEntry> {
        self.visited.values()
    }

    /// Records a skip; the first reason for a key wins, later attempts are
    /// silently ignored.
    pub fn skip(
        &mut self,
        key: String,
        url: String,
        reason: SkipReason,
        source_uq_id: Option<String>,
        source_tag: Option<SourceTag>,
    ) -> Result<(), CrawlError> {
        if self.skipped.contains_key(&key) {
            return Ok(());
        }
        if self.skipped.len() >= self.max_skipped_urls {
            return Err(CrawlError::CapacityExhausted {
                limit: "max_skipped_urls",
                capacity: self.max_skipped_urls,
                url,
            });
        }
        let uq_id = short_md5_hex(&key);
        self.skipped.insert(
            key,
            SkippedEntry {
                url,
                reason,
                uq_id,
                source_uq_id,
                source_tag,
            },
        );
        Ok(())
    }

    pub fn skipped_len(&self) -> usize {
        self.skipped.len()
    }

    pub fn skipped_entries(&self) -> impl Iterator<Item = &SkippedEntry> {
        self.skipped.values()
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Records a non-200 response for `basename`'s bucket; `index`-family
    /// basenames are never tracked. Returns the new count.
    pub fn record_non200(&mut self, basename: &str) -> u32 {
        if basename.is_empty() || UNTRACKED_BASENAMES.contains(&basename) {
            return 0;
        }
        let count = self.non200_basenames.entry(basename.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn non200_count(&self, basename: &str) -> u32 {
        self.non200_basenames.get(basename).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_respects_capacity() {
        let mut t = EngineTables::new(1, 10, 10);
        t.enqueue("a".into(), "https://a".into(), None, None).unwrap();
        let err = t.enqueue("b".into(), "https://b".into(), None, None);
        assert!(matches!(err, Err(CrawlError::CapacityExhausted { .. })));
    }

    #[test]
    fn dequeue_moves_queue_entry_to_visited() {
        let mut t = EngineTables::new(10, 10, 10);
        t.enqueue("a".into(), "https://a".into(), None, None).unwrap();
        let (key, _) = t.dequeue_to_visited().unwrap();
        assert_eq!(key, "a");
        assert_eq!(t.visited_len(), 1);
        assert_eq!(t.queue_len(), 0);
    }

    #[test]
    fn skip_first_reason_wins() {
        let mut t = EngineTables::new(10, 10, 10);
        t.skip("a".into(), "https://a".into(), SkipReason::RobotsTxt, None, None).unwrap();
        t.skip("a".into(), "https://a".into(), SkipReason::NotAllowedHost, None, None).unwrap();
        assert_eq!(t.skipped_len(), 1);
    }

    #[test]
    fn untracked_basenames_are_never_counted() {
        let mut t = EngineTables::new(10, 10, 10);
        assert_eq!(t.record_non200("index.html"), 0);
        assert_eq!(t.non200_count("index.html"), 0);
        assert_eq!(t.record_non200("missing.jpg"), 1);
        assert_eq!(t.record_non200("missing.jpg"), 2);
    }
}
