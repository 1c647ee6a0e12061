//! Analyzers consume the engine purely through `visited_url_callback`,
//! external collaborators to the core rather than code the engine calls
//! directly. These two are real, not stubbed, to prove the callback
//! interface carries enough information to be useful.

pub mod offline_export;
pub mod seo;

pub use offline_export::OfflineExportWriter;
pub use seo::seo_columns;
