//! Cache backend stored in the metadata database, so it survives restarts

use super::CacheStore;
use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct SqliteCache {
    pool: SqlitePool,
}

fn cache_error(context: &str, err: sqlx::Error) -> Error {
    tracing::error!("{}: {:?}", context, err);
    Error::Cache(context.to_string())
}

impl SqliteCache {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CacheStore for SqliteCache {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar::<_, String>("SELECT value FROM cache_entries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| cache_error("Error reading cache entry", e))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cache_entries (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| cache_error("Error writing cache entry", e))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM cache_entries WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| cache_error("Error deleting cache entry", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::MetaDb;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sqlite_cache_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("cache.db")).await.unwrap();
        let cache = SqliteCache::new(db.pool().clone());

        assert_eq!(cache.get("k").await.unwrap(), None);
        cache.set("k", "one").await.unwrap();
        cache.set("k", "two").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), Some("two".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get("k").await.unwrap(), None);
    }
}
