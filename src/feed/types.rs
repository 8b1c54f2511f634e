//! Feed document types.

use chrono::{DateTime, Utc};

/// Maximum feed size in bytes (5MB).
pub const MAX_FEED_SIZE: u64 = 5 * 1024 * 1024;

/// Total fetch timeout in seconds, body read included.
pub const FETCH_TIMEOUT_SECS: u64 = 30;

/// Author of a feed or an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedAuthor {
    /// Display name (empty when the feed names none).
    pub name: String,
    /// Contact email.
    pub email: Option<String>,
    /// Homepage.
    pub uri: Option<String>,
}

/// A feed-level link element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedLink {
    /// Target URL.
    pub href: String,
    /// Relation (`alternate`, `self`, ...).
    pub rel: Option<String>,
    /// Declared media type.
    pub media_type: Option<String>,
}

/// One entry of a fetched feed, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Entry title.
    pub title: String,
    /// Link to the article; used as the deduplication key.
    pub link: String,
    /// Atom id or RSS guid.
    pub id: String,
    /// Publication time, falling back to the update time.
    pub published: DateTime<Utc>,
    /// Last update time.
    pub updated: Option<DateTime<Utc>>,
    /// First listed author.
    pub author: FeedAuthor,
    /// Content body, may contain markup.
    pub content: String,
}

impl FeedEntry {
    /// Create an entry with the required fields.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            link: link.into(),
            id: id.into(),
            published,
            updated: None,
            author: FeedAuthor::default(),
            content: String::new(),
        }
    }

    /// Set the author name.
    pub fn with_author(mut self, name: impl Into<String>) -> Self {
        self.author.name = name.into();
        self
    }

    /// Set the content body.
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }
}

/// A parsed feed. Lives for one crawl cycle.
#[derive(Debug, Clone, Default)]
pub struct FeedDocument {
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub id: String,
    pub author: Option<FeedAuthor>,
    pub updated: Option<DateTime<Utc>>,
    pub icon: Option<String>,
    pub logo: Option<String>,
    pub links: Vec<FeedLink>,
    /// Entries in document order.
    pub entries: Vec<FeedEntry>,
}
