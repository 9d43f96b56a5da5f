//! Durable Tier Module
//!
//! The slower secondary tier that survives process restarts. The
//! [`DurableTier`] trait is the seam where a shared remote cache cluster
//! would plug in; [`SqliteTier`] is the local implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use crate::cache::{CacheEntry, WriteStrategy};
use crate::error::DurableError;
use crate::keys::KeyPattern;

pub type DurableResult<T> = std::result::Result<T, DurableError>;

// == Durable Tier Trait ==
#[async_trait]
pub trait DurableTier: Send + Sync + std::fmt::Debug {
    async fn get(&self, key: &str) -> DurableResult<Option<CacheEntry>>;

    async fn put(&self, key: &str, entry: &CacheEntry) -> DurableResult<()>;

    async fn remove(&self, key: &str) -> DurableResult<()>;

    /// Removes every key matching `pattern`, returning how many rows went.
    async fn remove_matching(&self, pattern: &KeyPattern) -> DurableResult<usize>;

    /// Drops rows whose expiry is at or before `now_ms`.
    async fn purge_expired(&self, now_ms: u64) -> DurableResult<usize>;

    async fn clear(&self) -> DurableResult<()>;

    async fn len(&self) -> DurableResult<usize>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
    key        TEXT PRIMARY KEY NOT NULL,
    value      TEXT NOT NULL,
    strategy   TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_cache_entries_expires_at ON cache_entries (expires_at);";

// == SQLite Tier ==
/// SQLite-backed durable tier. All statements run on the blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteTier {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTier {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> DurableResult<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Non-persistent database, mainly for tests and `:memory:` configs.
    pub fn in_memory() -> DurableResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> DurableResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn run<T, F>(&self, op: F) -> DurableResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DurableResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let guard = conn.lock();
            op(&guard)
        })
        .await?
    }
}

#[async_trait]
impl DurableTier for SqliteTier {
    async fn get(&self, key: &str) -> DurableResult<Option<CacheEntry>> {
        let key = key.to_string();
        self.run(move |conn| {
            let row = conn
                .query_row(
                    "SELECT value, strategy, created_at, expires_at
                     FROM cache_entries WHERE key = ?1",
                    params![key],
                    map_entry_row,
                )
                .optional()?;
            match row {
                Some((raw, strategy, created_at, expires_at)) => Ok(Some(CacheEntry {
                    value: serde_json::from_str(&raw)?,
                    created_at,
                    expires_at,
                    hit_count: 0,
                    strategy: WriteStrategy::parse(&strategy),
                })),
                None => Ok(None),
            }
        })
        .await
    }

    async fn put(&self, key: &str, entry: &CacheEntry) -> DurableResult<()> {
        let key = key.to_string();
        let raw = serde_json::to_string(&entry.value)?;
        let strategy = entry.strategy.as_str();
        let created_at = to_sql_ts(entry.created_at);
        let expires_at = to_sql_ts(entry.expires_at);
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (key, value, strategy, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    strategy = excluded.strategy,
                    created_at = excluded.created_at,
                    expires_at = excluded.expires_at",
                params![key, raw, strategy, created_at, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn remove(&self, key: &str) -> DurableResult<()> {
        let key = key.to_string();
        self.run(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
            Ok(())
        })
        .await
    }

    async fn remove_matching(&self, pattern: &KeyPattern) -> DurableResult<usize> {
        let pattern = pattern.clone();
        self.run(move |conn| {
            let removed = match pattern {
                KeyPattern::Exact(key) => {
                    conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?
                }
                KeyPattern::Prefix(prefix) => conn.execute(
                    "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1",
                    params![prefix],
                )?,
            };
            Ok(removed)
        })
        .await
    }

    async fn purge_expired(&self, now_ms: u64) -> DurableResult<usize> {
        let now = to_sql_ts(now_ms);
        self.run(move |conn| {
            let removed =
                conn.execute("DELETE FROM cache_entries WHERE expires_at <= ?1", params![now])?;
            Ok(removed)
        })
        .await
    }

    async fn clear(&self) -> DurableResult<()> {
        self.run(|conn| {
            conn.execute("DELETE FROM cache_entries", [])?;
            Ok(())
        })
        .await
    }

    async fn len(&self) -> DurableResult<usize> {
        self.run(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
            Ok(count.max(0) as usize)
        })
        .await
    }
}

// == Row Mapping ==
fn map_entry_row(row: &Row<'_>) -> rusqlite::Result<(String, String, u64, u64)> {
    let created_at: i64 = row.get(2)?;
    let expires_at: i64 = row.get(3)?;
    Ok((
        row.get(0)?,
        row.get(1)?,
        created_at.max(0) as u64,
        expires_at.max(0) as u64,
    ))
}

fn to_sql_ts(ms: u64) -> i64 {
    i64::try_from(ms).unwrap_or(i64::MAX)
}
