//! Persisted news items.
//!
//! [`IngestionStore`] writes crawled entries, deduplicated by URL.
//! [`DeliveryStore`] reads undelivered items and flips their delivery flag.

mod repository;
mod types;

pub use repository::{DeliveryStore, IngestionStore};
pub use types::{IngestReport, NewNewsItem, NewsItem};
