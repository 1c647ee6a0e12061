use std::time::{SystemTime, UNIX_EPOCH};

use url::Url;

pub fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

pub fn strip_fragment(mut url: Url) -> Url {
    url.set_fragment(None);
    url
}

/// First 8 hex chars of md5(s), the short `uqId` format used for table keys.
pub fn short_md5_hex(s: &str) -> String {
    let digest = md5::compute(s.as_bytes());
    hex::encode(digest.0)[..8].to_string()
}

pub fn full_md5_hex(s: &str) -> String {
    let digest = md5::compute(s.as_bytes());
    hex::encode(digest.0)
}

/// Rightmost `label.tld` slice of a host, e.g. `a.b.example.co.uk` -> best
/// effort `co.uk`-unaware `example.co.uk`; takes exactly the last two
/// labels rather than consulting a public-suffix list.
pub fn second_level_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2 {
        return host.to_string();
    }
    labels[labels.len() - 2..].join(".")
}
