//! Database schema and migrations for feedhook.
//!
//! Migrations are applied in order when the database is opened.
//! The schema_version table tracks which have already run.

/// Database migrations (SQLite).
#[cfg(feature = "sqlite")]
pub const MIGRATIONS: &[&str] = &[
    // v1: news items crawled from the feed
    r#"
CREATE TABLE news (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    url           TEXT NOT NULL UNIQUE CHECK (url <> ''),
    title         TEXT NOT NULL,
    author        TEXT NOT NULL DEFAULT '',
    content       TEXT NOT NULL DEFAULT '',
    published_at  TEXT NOT NULL,
    created_at    TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    sent          INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX idx_news_sent_published ON news(sent, published_at);
"#,
];

/// Database migrations (PostgreSQL).
#[cfg(feature = "postgres")]
pub const MIGRATIONS: &[&str] = &[
    // v1: news items crawled from the feed
    r#"
CREATE TABLE news (
    id            BIGSERIAL PRIMARY KEY,
    url           TEXT NOT NULL UNIQUE CHECK (url <> ''),
    title         TEXT NOT NULL,
    author        TEXT NOT NULL DEFAULT '',
    content       TEXT NOT NULL DEFAULT '',
    published_at  TIMESTAMPTZ NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    sent          BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE INDEX idx_news_sent_published ON news(sent, published_at);
"#,
];
