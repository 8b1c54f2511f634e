//! News repositories for feedhook.

use chrono::{DateTime, Utc};
use sqlx::QueryBuilder;
use tracing::{debug, error, info};

use super::types::{IngestReport, NewNewsItem, NewsItem};
use crate::db::{DbBackend, DbPool, SQL_FALSE, SQL_TRUE};
use crate::feed::FeedEntry;
use crate::Result;

/// Upper bound on bound ids per UPDATE statement.
const MAX_IDS_PER_STATEMENT: usize = 500;

const NEWS_COLUMNS: &str = "id, url, title, author, content, published_at, created_at, sent";

/// Row type for news from database.
#[derive(Debug, Clone, sqlx::FromRow)]
struct NewsRow {
    id: i64,
    url: String,
    title: String,
    author: String,
    content: String,
    published_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    sent: bool,
}

impl From<NewsRow> for NewsItem {
    fn from(row: NewsRow) -> Self {
        NewsItem {
            id: row.id,
            url: row.url,
            title: row.title,
            author: row.author,
            content: row.content,
            published_at: row.published_at,
            created_at: row.created_at,
            sent: row.sent,
        }
    }
}

/// Insert a row unless its URL already exists. Returns the new ID.
async fn insert_news<'e, E>(executor: E, item: &NewNewsItem) -> Result<Option<i64>>
where
    E: sqlx::Executor<'e, Database = DbBackend>,
{
    let id: Option<i64> = sqlx::query_scalar(
        r#"
        INSERT INTO news (url, title, author, content, published_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (url) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&item.url)
    .bind(&item.title)
    .bind(&item.author)
    .bind(&item.content)
    .bind(item.published_at)
    .fetch_optional(executor)
    .await?;

    Ok(id)
}

/// Repository that writes crawled entries.
pub struct IngestionStore<'a> {
    pool: &'a DbPool,
}

impl<'a> IngestionStore<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a single item, ignoring it if the URL is already stored.
    ///
    /// The existing row is never updated.
    pub async fn insert_or_ignore(&self, item: &NewNewsItem) -> Result<Option<i64>> {
        insert_news(self.pool, item).await
    }

    /// Persist a batch of feed entries, oldest published first.
    ///
    /// Rows that fail individually are logged and counted; only a lost
    /// connection aborts the batch.
    pub async fn ingest(&self, mut entries: Vec<FeedEntry>) -> Result<IngestReport> {
        if entries.is_empty() {
            info!("No entries to save");
            return Ok(IngestReport::default());
        }

        // Stable, so equal timestamps keep feed order
        entries.sort_by_key(|e| e.published);

        let mut conn = self.pool.acquire().await?;
        let mut report = IngestReport::default();

        for entry in &entries {
            let item = NewNewsItem::from(entry);

            match insert_news(&mut *conn, &item).await {
                Ok(Some(id)) => {
                    debug!(id, url = %item.url, "Saved entry");
                    report.inserted += 1;
                }
                Ok(None) => {
                    debug!(url = %item.url, "Entry already stored");
                    report.skipped += 1;
                }
                Err(e) if e.is_connectivity() => {
                    error!(url = %item.url, error = %e, "Lost database connection while saving entries");
                    return Err(e);
                }
                Err(e) => {
                    error!(url = %item.url, error = %e, "Error saving entry");
                    report.failed += 1;
                }
            }
        }

        info!(
            saved = report.inserted,
            skipped = report.skipped,
            errors = report.failed,
            "Database operation completed"
        );

        Ok(report)
    }

    /// Get an item by URL.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<NewsItem>> {
        let query = format!("SELECT {} FROM news WHERE url = $1", NEWS_COLUMNS);
        let row = sqlx::query_as::<_, NewsRow>(&query)
            .bind(url)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(NewsItem::from))
    }

    /// Count all stored items.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM news")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Repository that tracks delivery state.
pub struct DeliveryStore<'a> {
    pool: &'a DbPool,
}

impl<'a> DeliveryStore<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// List all undelivered items, oldest published first.
    pub async fn list_undelivered(&self) -> Result<Vec<NewsItem>> {
        let query = format!(
            r#"
            SELECT {}
            FROM news
            WHERE sent = {}
            ORDER BY published_at ASC, id ASC
            "#,
            NEWS_COLUMNS, SQL_FALSE
        );
        let rows = sqlx::query_as::<_, NewsRow>(&query)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(NewsItem::from).collect())
    }

    /// Mark the given items delivered in a single transaction.
    ///
    /// Either every listed undelivered row flips or none does. Returns the
    /// number of rows changed; an empty slice touches nothing.
    pub async fn mark_delivered(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut updated = 0;

        for chunk in ids.chunks(MAX_IDS_PER_STATEMENT) {
            let mut query: QueryBuilder<DbBackend> = QueryBuilder::new(format!(
                "UPDATE news SET sent = {} WHERE sent = {} AND id IN (",
                SQL_TRUE, SQL_FALSE
            ));
            let mut separated = query.separated(", ");
            for id in chunk {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");

            updated += query.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(updated)
    }

    /// Get an item by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<NewsItem>> {
        let query = format!("SELECT {} FROM news WHERE id = $1", NEWS_COLUMNS);
        let row = sqlx::query_as::<_, NewsRow>(&query)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(NewsItem::from))
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, hour, 0, 0).unwrap()
    }

    fn entry(url: &str, hour: u32) -> FeedEntry {
        FeedEntry::new(format!("urn:{url}"), format!("Title {url}"), url, at(hour))
            .with_author("kim")
            .with_content("body")
    }

    #[tokio::test]
    async fn test_insert_or_ignore() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        let item = NewNewsItem::from(&entry("https://example.com/a", 1));
        let id = store.insert_or_ignore(&item).await.unwrap().unwrap();

        let saved = store.get_by_url("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(saved.id, id);
        assert_eq!(saved.title, "Title https://example.com/a");
        assert_eq!(saved.author, "kim");
        assert_eq!(saved.content, "body");
        assert_eq!(saved.published_at, at(1));
        assert!(!saved.sent);
    }

    #[tokio::test]
    async fn test_duplicate_url_keeps_existing_row() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        let first = NewNewsItem::from(&entry("https://example.com/a", 1));
        assert!(store.insert_or_ignore(&first).await.unwrap().is_some());

        let mut second = first.clone();
        second.title = "Changed title".to_string();
        assert!(store.insert_or_ignore(&second).await.unwrap().is_none());

        let saved = store.get_by_url("https://example.com/a").await.unwrap().unwrap();
        assert_eq!(saved.title, "Title https://example.com/a");
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_ingest_twice_is_idempotent() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());
        let entries = vec![entry("https://example.com/a", 1), entry("https://example.com/b", 2)];

        let first = store.ingest(entries.clone()).await.unwrap();
        assert_eq!(first.inserted, 2);

        let second = store.ingest(entries).await.unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(second.failed, 0);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_sorts_oldest_first() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        // T3 > T1 > T2 in input order
        let entries = vec![
            entry("https://example.com/t3", 3),
            entry("https://example.com/t1", 1),
            entry("https://example.com/t2", 2),
        ];
        store.ingest(entries).await.unwrap();

        let t1 = store.get_by_url("https://example.com/t1").await.unwrap().unwrap();
        let t2 = store.get_by_url("https://example.com/t2").await.unwrap().unwrap();
        let t3 = store.get_by_url("https://example.com/t3").await.unwrap().unwrap();
        assert!(t1.id < t2.id);
        assert!(t2.id < t3.id);
    }

    #[tokio::test]
    async fn test_ingest_equal_timestamps_keep_source_order() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        let entries = vec![
            entry("https://example.com/x", 5),
            entry("https://example.com/y", 5),
        ];
        store.ingest(entries).await.unwrap();

        let x = store.get_by_url("https://example.com/x").await.unwrap().unwrap();
        let y = store.get_by_url("https://example.com/y").await.unwrap().unwrap();
        assert!(x.id < y.id);
    }

    #[tokio::test]
    async fn test_ingest_empty_is_noop() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        let report = store.ingest(Vec::new()).await.unwrap();
        assert_eq!(report, IngestReport::default());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ingest_continues_after_row_failure() {
        let db = setup_db().await;
        let store = IngestionStore::new(db.pool());

        // Empty URL violates the CHECK constraint
        let entries = vec![
            entry("https://example.com/a", 1),
            entry("", 2),
            entry("https://example.com/c", 3),
        ];
        let report = store.ingest(entries).await.unwrap();

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failed, 1);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_ingest_aborts_on_closed_pool() {
        let db = setup_db().await;
        db.close().await;

        let store = IngestionStore::new(db.pool());
        let err = store
            .ingest(vec![entry("https://example.com/a", 1)])
            .await
            .unwrap_err();
        assert!(err.is_connectivity());
    }

    #[tokio::test]
    async fn test_list_undelivered_ordered_by_published() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());
        let delivery = DeliveryStore::new(db.pool());

        for (url, hour) in [("https://example.com/b", 2), ("https://example.com/a", 1)] {
            ingest
                .insert_or_ignore(&NewNewsItem::from(&entry(url, hour)))
                .await
                .unwrap();
        }

        let items = delivery.list_undelivered().await.unwrap();
        let urls: Vec<&str> = items.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://example.com/a", "https://example.com/b"]);
    }

    #[tokio::test]
    async fn test_list_undelivered_empty() {
        let db = setup_db().await;
        let delivery = DeliveryStore::new(db.pool());
        assert!(delivery.list_undelivered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_delivered_exact_selection() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());
        let delivery = DeliveryStore::new(db.pool());

        ingest
            .ingest(vec![
                entry("https://example.com/a", 1),
                entry("https://example.com/b", 2),
                entry("https://example.com/c", 3),
            ])
            .await
            .unwrap();

        let a = ingest.get_by_url("https://example.com/a").await.unwrap().unwrap();
        let c = ingest.get_by_url("https://example.com/c").await.unwrap().unwrap();

        let updated = delivery.mark_delivered(&[a.id, c.id]).await.unwrap();
        assert_eq!(updated, 2);

        let remaining = delivery.list_undelivered().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].url, "https://example.com/b");

        assert!(delivery.get_by_id(a.id).await.unwrap().unwrap().sent);
        assert!(delivery.get_by_id(c.id).await.unwrap().unwrap().sent);
    }

    #[tokio::test]
    async fn test_mark_delivered_twice_changes_nothing() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());
        let delivery = DeliveryStore::new(db.pool());

        let id = ingest
            .insert_or_ignore(&NewNewsItem::from(&entry("https://example.com/a", 1)))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(delivery.mark_delivered(&[id]).await.unwrap(), 1);
        assert_eq!(delivery.mark_delivered(&[id]).await.unwrap(), 0);
        assert!(delivery.get_by_id(id).await.unwrap().unwrap().sent);
    }

    #[tokio::test]
    async fn test_mark_delivered_empty_is_noop() {
        let db = setup_db().await;
        let delivery = DeliveryStore::new(db.pool());
        assert_eq!(delivery.mark_delivered(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mark_delivered_many_ids() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());
        let delivery = DeliveryStore::new(db.pool());

        let entries: Vec<FeedEntry> = (0..(MAX_IDS_PER_STATEMENT + 20))
            .map(|i| entry(&format!("https://example.com/{i}"), (i % 24) as u32))
            .collect();
        ingest.ingest(entries).await.unwrap();

        let ids: Vec<i64> = delivery
            .list_undelivered()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        let updated = delivery.mark_delivered(&ids).await.unwrap();

        assert_eq!(updated as usize, MAX_IDS_PER_STATEMENT + 20);
        assert!(delivery.list_undelivered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_delivered_failure_leaves_flags() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());
        let delivery = DeliveryStore::new(db.pool());

        ingest
            .ingest(vec![entry("https://example.com/a", 1), entry("https://example.com/b", 2)])
            .await
            .unwrap();
        let ids: Vec<i64> = delivery
            .list_undelivered()
            .await
            .unwrap()
            .iter()
            .map(|i| i.id)
            .collect();

        // Reject the update of the second row only
        sqlx::raw_sql(&format!(
            "CREATE TRIGGER block_b BEFORE UPDATE ON news WHEN OLD.id = {}
             BEGIN SELECT RAISE(ABORT, 'blocked'); END;",
            ids[1]
        ))
        .execute(db.pool())
        .await
        .unwrap();

        assert!(delivery.mark_delivered(&ids).await.is_err());
        assert_eq!(delivery.list_undelivered().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_created_at_is_assigned() {
        let db = setup_db().await;
        let ingest = IngestionStore::new(db.pool());

        let before = Utc::now() - chrono::Duration::seconds(5);
        ingest
            .insert_or_ignore(&NewNewsItem::from(&entry("https://example.com/a", 1)))
            .await
            .unwrap();

        let saved = ingest.get_by_url("https://example.com/a").await.unwrap().unwrap();
        assert!(saved.created_at >= before);
    }
}
