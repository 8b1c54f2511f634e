//! News item types.

use chrono::{DateTime, Utc};

use crate::feed::FeedEntry;

/// A persisted, deduplicated news item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsItem {
    /// Store-assigned ID.
    pub id: i64,
    /// Source URL (unique).
    pub url: String,
    /// Title.
    pub title: String,
    /// Author name.
    pub author: String,
    /// Content body.
    pub content: String,
    /// When the entry was published.
    pub published_at: DateTime<Utc>,
    /// When the row was inserted.
    pub created_at: DateTime<Utc>,
    /// Whether the item was included in a delivered batch.
    pub sent: bool,
}

/// New news item for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNewsItem {
    pub url: String,
    pub title: String,
    pub author: String,
    pub content: String,
    pub published_at: DateTime<Utc>,
}

impl From<&FeedEntry> for NewNewsItem {
    fn from(entry: &FeedEntry) -> Self {
        Self {
            url: entry.link.clone(),
            title: entry.title.clone(),
            author: entry.author.name.clone(),
            content: entry.content.clone(),
            published_at: entry.published,
        }
    }
}

/// Outcome counts of one ingestion batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Newly inserted rows.
    pub inserted: usize,
    /// Entries whose URL already existed.
    pub skipped: usize,
    /// Entries that failed to insert.
    pub failed: usize,
}

impl IngestReport {
    /// Number of entries looked at.
    pub fn total(&self) -> usize {
        self.inserted + self.skipped + self.failed
    }
}
