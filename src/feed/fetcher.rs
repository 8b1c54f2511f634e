//! Feed fetcher.
//!
//! Fetches one Atom/RSS document over HTTP and maps it onto the strict
//! [`FeedDocument`] schema. A document is returned whole or not at all.

use std::time::Duration;

use feed_rs::model::{Entry, Feed, Link, Person};
use feed_rs::parser;
use reqwest::Client;
use tracing::debug;

use crate::error::{FeedhookError, Result};
use crate::feed::types::{
    FeedAuthor, FeedDocument, FeedEntry, FeedLink, FETCH_TIMEOUT_SECS, MAX_FEED_SIZE,
};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent sent with every outbound request.
pub const USER_AGENT: &str = concat!("feedhook/", env!("CARGO_PKG_VERSION"));

/// HTTP feed fetcher.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a new fetcher with default settings.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FeedhookError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Fetch and parse the feed at `url`.
    pub async fn fetch(&self, url: &str) -> Result<FeedDocument> {
        debug!(url, "Fetching feed");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FeedhookError::fetch(url, describe_request_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FeedhookError::Fetch {
                url: url.to_string(),
                status: Some(status.as_u16()),
                message: format!("HTTP status {}", status),
            });
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(FeedhookError::fetch(
                    url,
                    format!(
                        "feed too large: {} bytes (max {} bytes)",
                        content_length, MAX_FEED_SIZE
                    ),
                ));
            }
        }

        let bytes = response.bytes().await.map_err(|e| {
            FeedhookError::fetch(url, format!("failed to read response: {}", describe_request_error(&e)))
        })?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(FeedhookError::fetch(
                url,
                format!(
                    "feed too large: {} bytes (max {} bytes)",
                    bytes.len(),
                    MAX_FEED_SIZE
                ),
            ));
        }

        parse_feed(&bytes)
    }
}

fn describe_request_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out after {}s: {}", FETCH_TIMEOUT_SECS, e)
    } else {
        e.to_string()
    }
}

/// Parse feed bytes into a [`FeedDocument`].
///
/// Each entry must carry a title, a link and a published (or updated)
/// timestamp; anything else is optional.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedDocument> {
    let feed = parser::parse(bytes)
        .map_err(|e| FeedhookError::Parse(format!("failed to parse feed: {}", e)))?;
    convert_feed(feed)
}

fn convert_feed(feed: Feed) -> Result<FeedDocument> {
    let entries = feed
        .entries
        .into_iter()
        .map(convert_entry)
        .collect::<Result<Vec<_>>>()?;

    Ok(FeedDocument {
        title: feed.title.map(|t| t.content),
        subtitle: feed.description.map(|t| t.content),
        id: feed.id,
        author: feed.authors.into_iter().next().map(convert_person),
        updated: feed.updated,
        icon: feed.icon.map(|i| i.uri),
        logo: feed.logo.map(|i| i.uri),
        links: feed.links.into_iter().map(convert_link).collect(),
        entries,
    })
}

fn convert_entry(entry: Entry) -> Result<FeedEntry> {
    let id = entry.id;

    let title = entry
        .title
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| FeedhookError::Parse(format!("entry {} has no title", id)))?;

    let link = pick_link(&entry.links)
        .ok_or_else(|| FeedhookError::Parse(format!("entry {} has no link", id)))?;

    let published = entry
        .published
        .or(entry.updated)
        .ok_or_else(|| FeedhookError::Parse(format!("entry {} has no published date", id)))?;

    let author = entry
        .authors
        .into_iter()
        .next()
        .map(convert_person)
        .unwrap_or_default();

    let content = entry
        .content
        .and_then(|c| c.body)
        .or(entry.summary.map(|s| s.content))
        .unwrap_or_default();

    Ok(FeedEntry {
        title,
        link,
        id,
        published,
        updated: entry.updated,
        author,
        content,
    })
}

/// Prefer the `alternate` link, else the first link with an href.
fn pick_link(links: &[Link]) -> Option<String> {
    links
        .iter()
        .find(|l| l.rel.as_deref() == Some("alternate") && !l.href.is_empty())
        .or_else(|| links.iter().find(|l| !l.href.is_empty()))
        .map(|l| l.href.clone())
}

fn convert_person(person: Person) -> FeedAuthor {
    FeedAuthor {
        name: person.name,
        email: person.email,
        uri: person.uri,
    }
}

fn convert_link(link: Link) -> FeedLink {
    FeedLink {
        href: link.href,
        rel: link.rel,
        media_type: link.media_type,
    }
}
