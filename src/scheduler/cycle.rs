//! Crawl and delivery cycles.

use tracing::{error, info};

use crate::db::DbPool;
use crate::error::Result;
use crate::feed::FeedFetcher;
use crate::news::{DeliveryStore, IngestReport, IngestionStore};
use crate::webhook::WebhookNotifier;

/// Result of one delivery tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Nothing was undelivered; the webhook was not called.
    Empty,
    /// A batch was posted and marked delivered.
    Delivered { count: usize },
}

/// Everything one tick of either cycle needs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pool: DbPool,
    fetcher: FeedFetcher,
    notifier: WebhookNotifier,
    feed_url: String,
}

impl Pipeline {
    pub fn new(
        pool: DbPool,
        fetcher: FeedFetcher,
        notifier: WebhookNotifier,
        feed_url: impl Into<String>,
    ) -> Self {
        Self {
            pool,
            fetcher,
            notifier,
            feed_url: feed_url.into(),
        }
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Fetch the feed and store new entries.
    ///
    /// A fetch or parse failure returns before the store is touched.
    pub async fn run_crawl(&self) -> Result<IngestReport> {
        info!(url = %self.feed_url, "Starting crawl");

        let document = self.fetcher.fetch(&self.feed_url).await?;
        info!(entries = document.entries.len(), "Fetched feed");

        let report = IngestionStore::new(&self.pool)
            .ingest(document.entries)
            .await?;

        info!(
            entries = report.total(),
            inserted = report.inserted,
            skipped = report.skipped,
            failed = report.failed,
            "Crawl finished"
        );
        Ok(report)
    }

    /// Post all undelivered items as one message, then mark them delivered.
    ///
    /// Items stay undelivered when the post fails. If marking fails after a
    /// successful post, the same items go out again on the next tick.
    pub async fn run_delivery(&self) -> Result<DeliveryOutcome> {
        let store = DeliveryStore::new(&self.pool);

        let items = store.list_undelivered().await?;
        if items.is_empty() {
            info!("No news to deliver");
            return Ok(DeliveryOutcome::Empty);
        }

        let count = items.len();
        info!(count, "Delivering news");
        self.notifier.notify(&items).await?;

        let ids: Vec<i64> = items.iter().map(|item| item.id).collect();
        match store.mark_delivered(&ids).await {
            Ok(marked) => {
                info!(count, marked, "Delivery finished");
                Ok(DeliveryOutcome::Delivered { count })
            }
            Err(e) => {
                error!(
                    count,
                    error = %e,
                    "Webhook accepted the batch but marking it failed; it may be delivered again"
                );
                Err(e)
            }
        }
    }
}
