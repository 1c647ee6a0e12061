use std::path::PathBuf;

use anyhow::{Context, Result};
use html_to_markdown_rs::{convert_with_metadata, options::ConversionOptions, MetadataConfig};
use url::Url;

use crate::cache::Cache;

/// `--offline-export-dir <DIR>`: converts each visited HTML body to Markdown
/// and writes it under a site-mirrored directory tree, reusing the
/// teacher's `Cache` path layout and atomic writer verbatim.
pub struct OfflineExportWriter {
    cache: Cache,
}

impl OfflineExportWriter {
    pub fn new(dir: PathBuf) -> Result<Self> {
        Ok(Self {
            cache: Cache::new(Some(dir))?,
        })
    }

    pub fn write_page(&self, url: &str, html_body: &[u8]) -> Result<PathBuf> {
        let parsed = Url::parse(url).with_context(|| format!("invalid URL for offline export: {url}"))?;
        let markdown = convert_with_metadata(
            &String::from_utf8_lossy(html_body),
            Some(ConversionOptions::default()),
            MetadataConfig::default(),
            None,
        )
        .map(|(md, _meta)| md)
        .unwrap_or_default();

        let path = self.cache.page_path(&parsed)?;
        self.cache.write_atomic(&path, markdown.as_bytes())?;
        Ok(path)
    }
}
