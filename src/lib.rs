//! sitecrawl: bounded-concurrency website crawler with a pluggable
//! content-processor and analyzer surface.

pub mod analyzers;
pub mod cache;
pub mod cli;
pub mod content;
pub mod engine;
pub mod error;
pub mod found_url;
pub mod http_cache;
pub mod http_client;
pub mod ledger;
pub mod robots;
pub mod url_model;
pub mod util;
