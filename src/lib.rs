//! feedhook - feed-to-webhook news bot
//!
//! Crawls one Atom/RSS feed on a schedule, stores new entries deduplicated
//! by link, and posts undelivered entries to a chat webhook as one batch.

pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod logging;
pub mod news;
pub mod scheduler;
pub mod webhook;

pub use config::Config;
pub use db::{Database, DbPool};
pub use error::{FeedhookError, Result};
pub use feed::{FeedDocument, FeedEntry, FeedFetcher};
pub use news::{DeliveryStore, IngestReport, IngestionStore, NewsItem};
pub use scheduler::{CycleScheduler, DeliveryOutcome, Pipeline};
pub use webhook::WebhookNotifier;
