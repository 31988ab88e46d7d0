//! `SQLite`-backed history store.
//!
//! Holds the `posts` table (one row per approved post, keyed by content hash)
//! and the append-only `skipped_posts` audit log.

use crate::models::{HistoricalEmbedding, HistoricalRecord, SkipEvent, SkipReason};
use crate::storage::sqlite::{
    acquire_lock, configure_connection, open_file, record_operation_metrics,
};
use crate::storage::traits::{HistoryStore, InsertOutcome, PostRecord};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const POST_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `SQLite` history store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` because `rusqlite::Connection` is not `Sync`.
/// WAL mode and `busy_timeout` let several pipeline processes share one
/// database file.
///
/// # Schema
///
/// - `posts`: `hash` is UNIQUE and inserts are `ON CONFLICT(hash) DO NOTHING`.
///   Vectors and attachment lists are JSON arrays.
/// - `skipped_posts`: a unique expression index on
///   `(COALESCE(new_post_url, ''), reason, COALESCE(hash, ''))` makes
///   repeated skip events no-ops.
pub struct SqliteHistoryStore {
    /// Connection to the `SQLite` database.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteHistoryStore {
    /// Opens (or creates) a file-backed store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened,
    /// or [`Error::OperationFailed`] if the schema cannot be created.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// use postsieve::storage::SqliteHistoryStore;
    ///
    /// let store = SqliteHistoryStore::new("./history.db")?;
    /// # Ok::<(), postsieve::Error>(())
    /// ```
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_file(&db_path)?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                hash TEXT NOT NULL UNIQUE,
                raw_text TEXT NOT NULL,
                rewritten_text TEXT,
                vector_raw TEXT,
                vector_rewritten TEXT,
                original_post_url TEXT,
                group_name TEXT,
                post_date TEXT,
                media_urls TEXT NOT NULL DEFAULT '[]',
                gif_urls TEXT NOT NULL DEFAULT '[]',
                video_urls TEXT NOT NULL DEFAULT '[]',
                link_preview_url TEXT,
                link_preview_photo_url TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_posts_original_url ON posts(original_post_url);

            CREATE TABLE IF NOT EXISTS skipped_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                new_post_url TEXT,
                reason TEXT NOT NULL,
                hash TEXT,
                similar_post_url TEXT,
                similarity REAL,
                group_name TEXT,
                raw_text TEXT,
                similar_post_date TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE UNIQUE INDEX IF NOT EXISTS idx_skipped_posts_unique
                ON skipped_posts(COALESCE(new_post_url, ''), reason, COALESCE(hash, ''));",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_schema".to_string(),
            cause: e.to_string(),
        })
    }

    /// Runs `f` under the connection lock and records operation metrics.
    fn with_conn<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn)
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics("sqlite", operation, start, status);
        result
    }

    fn fetch_record(conn: &Connection, column: &str, value: &str) -> Result<Option<HistoricalRecord>> {
        let sql = format!(
            "SELECT hash, original_post_url, vector_raw, raw_text, created_at
             FROM posts WHERE {column} = ?1 ORDER BY id LIMIT 1"
        );
        let row = conn
            .query_row(&sql, params![value], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            })
            .optional()
            .map_err(|e| sql_error("fetch_post", &e))?;

        Ok(row.map(|(content_hash, url, vector, raw_text, created_at)| {
            let source_url = url.unwrap_or_default();
            let embedding_raw = vector.and_then(|v| parse_vector(&source_url, &v));
            HistoricalRecord {
                content_hash,
                source_url,
                embedding_raw,
                raw_text,
                created_at,
            }
        }))
    }

    /// Looks up the insertion time of the post stored under `url`.
    ///
    /// Lookup failures degrade to `None`.
    fn created_at_for_url(conn: &Connection, url: &str) -> Option<String> {
        let result = conn
            .query_row(
                "SELECT created_at FROM posts WHERE original_post_url = ?1 ORDER BY id LIMIT 1",
                params![url],
                |row| row.get::<_, String>(0),
            )
            .optional();
        match result {
            Ok(date) => date,
            Err(e) => {
                tracing::warn!(matched_url = %url, error = %e, "Failed to resolve matched post date");
                None
            },
        }
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn health_check(&self) -> Result<()> {
        self.with_conn("health_check", |conn| {
            conn.query_row(
                "SELECT (SELECT COUNT(*) FROM posts LIMIT 1) + (SELECT COUNT(*) FROM skipped_posts LIMIT 1)",
                [],
                |row| row.get::<_, i64>(0),
            )
            .map(|_| ())
            .map_err(|e| Error::StoreUnavailable(e.to_string()))
        })
    }

    #[instrument(skip(self), fields(operation = "lookup_by_hash", backend = "sqlite"))]
    fn lookup_by_hash(&self, hash: &str) -> Result<Option<HistoricalRecord>> {
        self.with_conn("lookup_by_hash", |conn| Self::fetch_record(conn, "hash", hash))
    }

    #[instrument(skip(self), fields(operation = "lookup_by_url", backend = "sqlite"))]
    fn lookup_by_url(&self, url: &str) -> Result<Option<HistoricalRecord>> {
        self.with_conn("lookup_by_url", |conn| {
            Self::fetch_record(conn, "original_post_url", url)
        })
    }

    #[instrument(skip(self), fields(operation = "all_embeddings", backend = "sqlite"))]
    fn all_embeddings(&self) -> Result<Vec<HistoricalEmbedding>> {
        self.with_conn("all_embeddings", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT original_post_url, vector_raw FROM posts
                     WHERE vector_raw IS NOT NULL ORDER BY id",
                )
                .map_err(|e| sql_error("all_embeddings", &e))?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                    ))
                })
                .map_err(|e| sql_error("all_embeddings", &e))?;

            let mut embeddings = Vec::new();
            for row in rows {
                let (url, raw) = row.map_err(|e| sql_error("all_embeddings", &e))?;
                let url = url.unwrap_or_default();
                if let Some(vector) = parse_vector(&url, &raw) {
                    embeddings.push(HistoricalEmbedding::new(url, vector));
                }
            }
            Ok(embeddings)
        })
    }

    fn raw_text_by_url(&self, url: &str) -> Result<Option<String>> {
        self.with_conn("raw_text_by_url", |conn| {
            conn.query_row(
                "SELECT raw_text FROM posts WHERE original_post_url = ?1 ORDER BY id LIMIT 1",
                params![url],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .map_err(|e| sql_error("raw_text_by_url", &e))
        })
    }

    #[instrument(
        skip(self, record),
        fields(operation = "insert_post", backend = "sqlite", source_url = %record.source_url)
    )]
    fn insert_post(&self, record: &PostRecord) -> Result<InsertOutcome> {
        let media_urls = to_json("media_urls", &record.media_urls)?;
        let gif_urls = to_json("gif_urls", &record.gif_urls)?;
        let video_urls = to_json("video_urls", &record.video_urls)?;
        let vector_raw = record
            .vector_raw
            .as_ref()
            .map(|v| to_json("vector_raw", v))
            .transpose()?;
        let vector_rewritten = record
            .vector_rewritten
            .as_ref()
            .map(|v| to_json("vector_rewritten", v))
            .transpose()?;
        let post_date = record
            .post_date
            .map(|d| d.format(POST_DATE_FORMAT).to_string());
        let source_url = non_empty(&record.source_url);

        self.with_conn("insert_post", |conn| {
            let changed = conn
                .execute(
                    "INSERT INTO posts (
                        hash, raw_text, rewritten_text, vector_raw, vector_rewritten,
                        original_post_url, group_name, post_date, media_urls, gif_urls,
                        video_urls, link_preview_url, link_preview_photo_url
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                     ON CONFLICT(hash) DO NOTHING",
                    params![
                        record.content_hash,
                        record.raw_text,
                        record.rewritten_text,
                        vector_raw,
                        vector_rewritten,
                        source_url,
                        record.group_name,
                        post_date,
                        media_urls,
                        gif_urls,
                        video_urls,
                        record.link_preview_url,
                        record.link_preview_photo_url,
                    ],
                )
                .map_err(|e| sql_error("insert_post", &e))?;

            Ok(if changed > 0 {
                InsertOutcome::Inserted
            } else {
                InsertOutcome::AlreadyPresent
            })
        })
    }

    #[instrument(
        skip(self, event),
        fields(operation = "record_skip", backend = "sqlite", reason = %event.reason)
    )]
    fn record_skip(&self, event: &SkipEvent) -> Result<bool> {
        self.with_conn("record_skip", |conn| {
            let matched_date = match (&event.matched_record_date, &event.matched_url) {
                (Some(date), _) => Some(date.clone()),
                (None, Some(url)) if !url.is_empty() => Self::created_at_for_url(conn, url),
                _ => None,
            };

            let changed = conn
                .execute(
                    "INSERT OR IGNORE INTO skipped_posts (
                        new_post_url, reason, hash, similar_post_url, similarity,
                        group_name, raw_text, similar_post_date
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                    params![
                        non_empty(&event.source_url),
                        event.reason.as_str(),
                        event.content_hash,
                        event.matched_url.as_deref().and_then(non_empty),
                        event.similarity.map(f64::from),
                        event.group_name,
                        event.raw_text,
                        matched_date,
                    ],
                )
                .map_err(|e| sql_error("record_skip", &e))?;

            Ok(changed > 0)
        })
    }

    fn count_posts(&self) -> Result<u64> {
        self.with_conn("count_posts", |conn| {
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM posts", [], |row| row.get(0))
                .map_err(|e| sql_error("count_posts", &e))?;
            Ok(u64::try_from(count).unwrap_or(0))
        })
    }

    #[allow(clippy::cast_possible_truncation)] // similarity is stored from an f32
    fn recent_skips(&self, limit: usize) -> Result<Vec<SkipEvent>> {
        self.with_conn("recent_skips", |conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT new_post_url, reason, hash, similar_post_url, similarity,
                            group_name, raw_text, similar_post_date
                     FROM skipped_posts ORDER BY id DESC LIMIT ?1",
                )
                .map_err(|e| sql_error("recent_skips", &e))?;
            let limit = i64::try_from(limit).unwrap_or(i64::MAX);
            let rows = stmt
                .query_map(params![limit], |row| {
                    Ok((
                        row.get::<_, Option<String>>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, Option<f64>>(4)?,
                        row.get::<_, Option<String>>(5)?,
                        row.get::<_, Option<String>>(6)?,
                        row.get::<_, Option<String>>(7)?,
                    ))
                })
                .map_err(|e| sql_error("recent_skips", &e))?;

            let mut events = Vec::new();
            for row in rows {
                let (url, reason, hash, matched_url, similarity, group, raw_text, matched_date) =
                    row.map_err(|e| sql_error("recent_skips", &e))?;
                let Some(reason) = SkipReason::parse(&reason) else {
                    tracing::warn!(reason = %reason, "Skipping audit row with unknown reason");
                    continue;
                };
                events.push(SkipEvent {
                    source_url: url.unwrap_or_default(),
                    reason,
                    content_hash: hash,
                    matched_url,
                    similarity: similarity.map(|s| s as f32),
                    group_name: group.unwrap_or_default(),
                    raw_text: raw_text.unwrap_or_default(),
                    matched_record_date: matched_date,
                });
            }
            Ok(events)
        })
    }
}

fn sql_error(operation: &str, e: &rusqlite::Error) -> Error {
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(field: &str, value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| Error::OperationFailed {
        operation: format!("serialize_{field}"),
        cause: e.to_string(),
    })
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

/// Parses a stored JSON vector, skipping malformed or empty ones.
fn parse_vector(source_url: &str, raw: &str) -> Option<Vec<f32>> {
    match serde_json::from_str::<Vec<f32>>(raw) {
        Ok(vector) if !vector.is_empty() => Some(vector),
        Ok(_) => None,
        Err(e) => {
            tracing::warn!(
                source_url = %source_url,
                error = %e,
                "Skipping malformed stored embedding"
            );
            metrics::counter!("history_malformed_embeddings_total").increment(1);
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Post;

    fn record(hash: &str, url: &str, vector: Option<Vec<f32>>) -> PostRecord {
        let mut post = Post::new(format!("text for {hash}"), url).with_group_name("g");
        post.embedding_raw = vector;
        PostRecord::from_post(&post, hash.to_string(), None)
    }

    fn raw_insert_vector(store: &SqliteHistoryStore, hash: &str, url: &str, vector: &str) {
        let conn = acquire_lock(&store.conn);
        conn.execute(
            "INSERT INTO posts (hash, raw_text, original_post_url, vector_raw) VALUES (?1, 'x', ?2, ?3)",
            params![hash, url, vector],
        )
        .unwrap();
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let outcome = store
            .insert_post(&record("h1", "https://a", Some(vec![0.5, 0.5])))
            .unwrap();
        assert_eq!(outcome, InsertOutcome::Inserted);

        let by_hash = store.lookup_by_hash("h1").unwrap().unwrap();
        assert_eq!(by_hash.source_url, "https://a");
        assert_eq!(by_hash.raw_text, "text for h1");
        assert_eq!(by_hash.embedding_raw, Some(vec![0.5, 0.5]));
        assert!(by_hash.created_at.is_some());

        let by_url = store.lookup_by_url("https://a").unwrap().unwrap();
        assert_eq!(by_url.content_hash, "h1");

        assert!(store.lookup_by_hash("missing").unwrap().is_none());
        assert!(store.lookup_by_url("https://missing").unwrap().is_none());
        assert_eq!(
            store.raw_text_by_url("https://a").unwrap().as_deref(),
            Some("text for h1")
        );
    }

    #[test]
    fn test_insert_conflict_is_no_op() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.insert_post(&record("h1", "https://a", None)).unwrap();
        let second = store.insert_post(&record("h1", "https://b", None)).unwrap();

        assert_eq!(second, InsertOutcome::AlreadyPresent);
        assert_eq!(store.count_posts().unwrap(), 1);
        assert_eq!(store.lookup_by_hash("h1").unwrap().unwrap().source_url, "https://a");
    }

    #[test]
    fn test_all_embeddings_skips_malformed() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store
            .insert_post(&record("h1", "https://a", Some(vec![1.0, 0.0])))
            .unwrap();
        raw_insert_vector(&store, "h2", "https://bad", "not json");
        raw_insert_vector(&store, "h3", "https://empty", "[]");
        store.insert_post(&record("h4", "https://none", None)).unwrap();
        store
            .insert_post(&record("h5", "https://c", Some(vec![0.0, 1.0])))
            .unwrap();

        let embeddings = store.all_embeddings().unwrap();
        let urls: Vec<&str> = embeddings.iter().map(|e| e.source_url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://c"]);
    }

    #[test]
    fn test_record_skip_is_idempotent() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let post = Post::new("dup", "https://new").with_group_name("g");
        let event = SkipEvent::new(&post, SkipReason::SessionDuplicate);

        assert!(store.record_skip(&event).unwrap());
        assert!(!store.record_skip(&event).unwrap());

        let other_reason = SkipEvent::new(&post, SkipReason::UrlDuplicate);
        assert!(store.record_skip(&other_reason).unwrap());
        assert_eq!(store.recent_skips(10).unwrap().len(), 2);
    }

    #[test]
    fn test_record_skip_resolves_matched_date() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.insert_post(&record("h1", "https://old", None)).unwrap();

        let post = Post::new("text", "https://new");
        let event = SkipEvent::new(&post, SkipReason::HashDuplicate)
            .with_hash("h1")
            .with_match("https://old");
        store.record_skip(&event).unwrap();

        let stored = store.recent_skips(1).unwrap().remove(0);
        assert_eq!(stored.matched_url.as_deref(), Some("https://old"));
        assert_eq!(
            stored.matched_record_date,
            store.lookup_by_url("https://old").unwrap().unwrap().created_at
        );
    }

    #[test]
    fn test_record_skip_unknown_match_has_no_date() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let post = Post::new("text", "https://new");
        let event = SkipEvent::new(&post, SkipReason::SemanticDuplicateInBatch)
            .with_match("https://same-batch")
            .with_similarity(0.97);
        store.record_skip(&event).unwrap();

        let stored = store.recent_skips(1).unwrap().remove(0);
        assert!(stored.matched_record_date.is_none());
        assert!((stored.similarity.unwrap() - 0.97).abs() < 1e-6);
    }

    #[test]
    fn test_record_skip_stores_empty_match_as_null() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        let post = Post::new("text", "https://new");
        let mut event = SkipEvent::new(&post, SkipReason::HashDuplicate).with_hash("h");
        event.matched_url = Some(String::new());
        store.record_skip(&event).unwrap();

        let conn = acquire_lock(&store.conn);
        let matched: Option<String> = conn
            .query_row("SELECT similar_post_url FROM skipped_posts", [], |row| row.get(0))
            .unwrap();
        assert!(matched.is_none());
    }

    #[test]
    fn test_recent_skips_newest_first() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        for i in 0..3 {
            let post = Post::new("t", format!("https://p{i}"));
            store
                .record_skip(&SkipEvent::new(&post, SkipReason::VideoTooLarge))
                .unwrap();
        }
        let recent = store.recent_skips(2).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].source_url, "https://p2");
        assert_eq!(recent[1].source_url, "https://p1");
    }

    #[test]
    fn test_health_check_detects_missing_schema() {
        let store = SqliteHistoryStore::in_memory().unwrap();
        store.health_check().unwrap();

        acquire_lock(&store.conn)
            .execute_batch("DROP TABLE posts;")
            .unwrap();
        assert!(matches!(store.health_check(), Err(Error::StoreUnavailable(_))));
    }

    #[test]
    fn test_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.db");
        {
            let store = SqliteHistoryStore::new(&path).unwrap();
            store.insert_post(&record("h1", "https://a", None)).unwrap();
            assert_eq!(store.db_path(), Some(path.as_path()));
        }
        let reopened = SqliteHistoryStore::new(&path).unwrap();
        assert_eq!(reopened.count_posts().unwrap(), 1);
    }
}
