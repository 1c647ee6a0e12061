//! HTTP response cache: the fingerprint covers only the request side (host,
//! port, scheme, path, method, userAgent, accept, acceptEncoding, origin) so
//! repeat requests for the same resource hit the same entry regardless of
//! what status came back last time. A stored response whose status falls in
//! the not-safe-to-cache set (429/500/502/503 and synthetic negatives) is
//! treated as a miss and the request is re-issued. Adapted from the
//! content-addressed atomic-write cache in `cache.rs`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use flate2::write::GzEncoder;
use flate2::Compression;

const UNCACHEABLE_STATUSES: &[i32] = &[429, 500, 502, 503];

pub fn is_cacheable_status(status_code: i32) -> bool {
    status_code >= 0 && !UNCACHEABLE_STATUSES.contains(&status_code)
}

#[derive(Debug, Clone)]
pub struct HttpCache {
    root: PathBuf,
    compress: bool,
}

/// Key inputs for a cache fingerprint.
pub struct FingerprintInput<'a> {
    pub host: &'a str,
    pub port: u16,
    pub scheme: &'a str,
    pub path: &'a str,
    pub method: &'a str,
    pub user_agent: &'a str,
    pub accept: &'a str,
    pub accept_encoding: &'a str,
    pub origin: Option<&'a str>,
}

impl HttpCache {
    pub fn new(root: PathBuf, compress: bool) -> Result<Self> {
        fs::create_dir_all(&root).with_context(|| format!("failed to create cache dir: {}", root.display()))?;
        Ok(Self { root, compress })
    }

    pub fn fingerprint(input: &FingerprintInput) -> String {
        let mut h = Hasher::new();
        for part in [
            input.host,
            &input.port.to_string(),
            input.scheme,
            input.path,
            input.method,
            input.user_agent,
            input.accept,
            input.accept_encoding,
            input.origin.unwrap_or(""),
        ] {
            h.update(part.as_bytes());
            h.update(b"\0");
        }
        h.finalize().to_hex().to_string()
    }

    fn entry_path(&self, fingerprint: &str) -> PathBuf {
        let ext = if self.compress { "bin.gz" } else { "bin" };
        self.root.join(format!("{fingerprint}.{ext}"))
    }

    /// Returns `(status_code, content_type, body)` on a cacheable hit, `None`
    /// on a miss or on a stored status that is no longer safe to serve.
    pub fn get(&self, fingerprint: &str) -> Option<(i32, Option<String>, Vec<u8>)> {
        let path = self.entry_path(fingerprint);
        let raw = fs::read(&path).ok()?;
        let bytes = if self.compress {
            let mut decoder = flate2::read::GzDecoder::new(raw.as_slice());
            let mut out = Vec::new();
            std::io::Read::read_to_end(&mut decoder, &mut out).ok()?;
            out
        } else {
            raw
        };
        if bytes.len() < 6 {
            return None;
        }
        let status_code = i32::from_le_bytes(bytes[..4].try_into().ok()?);
        if !is_cacheable_status(status_code) {
            return None;
        }
        let ct_len = u16::from_le_bytes(bytes[4..6].try_into().ok()?) as usize;
        if bytes.len() < 6 + ct_len {
            return None;
        }
        let content_type = if ct_len == 0 {
            None
        } else {
            std::str::from_utf8(&bytes[6..6 + ct_len]).ok().map(|s| s.to_string())
        };
        Some((status_code, content_type, bytes[6 + ct_len..].to_vec()))
    }

    pub fn put(&self, fingerprint: &str, status_code: i32, content_type: Option<&str>, body: &[u8]) -> Result<()> {
        if !is_cacheable_status(status_code) {
            return Ok(());
        }
        let path = self.entry_path(fingerprint);
        let ct_bytes = content_type.unwrap_or("").as_bytes();
        let mut framed = Vec::with_capacity(body.len() + 6 + ct_bytes.len());
        framed.extend_from_slice(&status_code.to_le_bytes());
        framed.extend_from_slice(&(ct_bytes.len() as u16).to_le_bytes());
        framed.extend_from_slice(ct_bytes);
        framed.extend_from_slice(body);
        let payload = if self.compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&framed).context("failed to gzip response body")?;
            encoder.finish().context("failed to finish gzip stream")?
        } else {
            framed
        };
        write_atomic(&path, &payload)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().context("cache path has no parent")?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create dir: {}", parent.display()))?;

    let file_name = path.file_name().and_then(|s| s.to_str()).unwrap_or("entry.bin");
    let tmp_path = parent.join(format!(".{file_name}.tmp"));

    {
        let mut f = fs::File::create(&tmp_path)
            .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
        f.write_all(bytes)
            .with_context(|| format!("failed to write temp file: {}", tmp_path.display()))?;
        f.flush().ok();
    }

    fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace {} with {}", path.display(), tmp_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncacheable_statuses_are_rejected() {
        assert!(!is_cacheable_status(429));
        assert!(!is_cacheable_status(500));
        assert!(!is_cacheable_status(-1));
        assert!(is_cacheable_status(200));
        assert!(is_cacheable_status(404));
    }

    fn input(path: &str) -> FingerprintInput<'static> {
        FingerprintInput {
            host: "example.com",
            port: 443,
            scheme: "https",
            path: Box::leak(path.to_string().into_boxed_str()),
            method: "GET",
            user_agent: "sitecrawl/test",
            accept: "text/html",
            accept_encoding: "gzip",
            origin: None,
        }
    }

    #[test]
    fn fingerprint_is_stable_for_same_inputs() {
        let a = HttpCache::fingerprint(&input("/a"));
        let b = HttpCache::fingerprint(&input("/a"));
        let c = HttpCache::fingerprint(&input("/b"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = std::env::temp_dir().join(format!("sitecrawl-test-{}", std::process::id()));
        let cache = HttpCache::new(dir.clone(), false).unwrap();
        let fp = HttpCache::fingerprint(&input("/"));
        cache.put(&fp, 200, Some("text/html"), b"hello").unwrap();
        assert_eq!(cache.get(&fp), Some((200, Some("text/html".to_string()), b"hello".to_vec())));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn stale_uncacheable_status_is_treated_as_a_miss() {
        let dir = std::env::temp_dir().join(format!("sitecrawl-test-stale-{}", std::process::id()));
        let cache = HttpCache::new(dir.clone(), false).unwrap();
        let fp = HttpCache::fingerprint(&input("/"));
        // put() itself refuses to persist a 500; simulate a pre-existing
        // entry by writing the frame directly, then confirm get() rejects it.
        let mut framed = Vec::new();
        framed.extend_from_slice(&500i32.to_le_bytes());
        framed.extend_from_slice(b"oops");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{fp}.bin")), &framed).unwrap();
        assert_eq!(cache.get(&fp), None);
        let _ = fs::remove_dir_all(&dir);
    }
}
