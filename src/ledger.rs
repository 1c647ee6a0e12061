//! Status ledger: append-only `VisitedEntry` store consumed by analyzers and
//! exporters after the crawl. Two backends selected by `--result-storage`:
//! in-memory (a plain `Vec` behind the engine's single writer) and
//! file-backed, appending newline-delimited JSON records one per write.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::engine::tables::VisitedEntry;

#[derive(Debug, Serialize)]
struct LedgerRecord<'a> {
    url: &'a str,
    uq_id: &'a str,
    status_code: i32,
    size: usize,
    elapsed_time: f64,
    content_type: Option<String>,
}

#[derive(Clone)]
pub enum Ledger {
    Memory(Arc<Mutex<Vec<VisitedEntry>>>),
    File(Arc<Mutex<std::fs::File>>),
}

impl Ledger {
    pub fn memory() -> Self {
        Ledger::Memory(Arc::new(Mutex::new(Vec::new())))
    }

    pub fn file(path: PathBuf) -> Result<Self> {
        let f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open ledger file: {}", path.display()))?;
        Ok(Ledger::File(Arc::new(Mutex::new(f))))
    }

    pub async fn append(&self, entry: &VisitedEntry) -> Result<()> {
        match self {
            Ledger::Memory(v) => {
                v.lock().await.push(entry.clone());
                Ok(())
            }
            Ledger::File(f) => {
                let record = LedgerRecord {
                    url: &entry.url,
                    uq_id: &entry.uq_id,
                    status_code: entry.status_code,
                    size: entry.size,
                    elapsed_time: entry.elapsed_time,
                    content_type: entry.content_type_id.map(|c| format!("{c:?}")),
                };
                let line = serde_json::to_string(&record).context("failed to serialize ledger record")?;
                let mut file = f.lock().await;
                writeln!(file, "{line}").context("failed to append ledger record")?;
                Ok(())
            }
        }
    }

    pub async fn len(&self) -> usize {
        match self {
            Ledger::Memory(v) => v.lock().await.len(),
            Ledger::File(_) => 0,
        }
    }
}
