//! Feed fetching and parsing.

pub mod fetcher;
pub mod types;

pub use fetcher::{parse_feed, FeedFetcher, USER_AGENT};
pub use types::{
    FeedAuthor, FeedDocument, FeedEntry, FeedLink, FETCH_TIMEOUT_SECS, MAX_FEED_SIZE,
};
