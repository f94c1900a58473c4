//! Key/value cache in front of the upstream API and the database
//!
//! This module provides:
//! - The `CacheStore` trait and its memory and SQLite backends
//! - Key naming for every cached value
//! - The comment chunk cache and the per-video ingestion markers

mod chunks;
mod memory;
mod sqlite;

pub use chunks::*;
pub use memory::*;
pub use sqlite::*;

use crate::config::{CacheBackendKind, Config};
use crate::error::Result;
use crate::meta::MetaDb;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

/// String-keyed cache with no expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Cache key layout
pub mod keys {
    pub fn video(video_id: &str) -> String {
        format!("video:{}", video_id)
    }

    pub fn comment_chunk(video_id: &str, chunk_index: usize) -> String {
        format!("comments:{}:chunk:{}", video_id, chunk_index)
    }

    pub fn comment_status(video_id: &str) -> String {
        format!("comments:{}:status", video_id)
    }

    /// Next unused chunk index; its presence marks a chain as started
    pub fn comment_cursor(video_id: &str) -> String {
        format!("comments:{}:cursor", video_id)
    }

    /// Next page token to fetch, or empty once upstream is exhausted
    pub fn comment_resume(video_id: &str) -> String {
        format!("comments:{}:resume", video_id)
    }
}

/// Read and deserialize a JSON value
pub async fn get_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Result<Option<T>> {
    match cache.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serialize and write a JSON value
pub async fn set_json<T: Serialize + ?Sized>(cache: &dyn CacheStore, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    cache.set(key, &raw).await
}

/// Build the configured cache backend
pub fn open_cache(config: &Config, db: &MetaDb) -> Result<Arc<dyn CacheStore>> {
    let cache: Arc<dyn CacheStore> = match config.cache.backend_kind()? {
        CacheBackendKind::Memory => Arc::new(MemoryCache::new()),
        CacheBackendKind::Sqlite => Arc::new(SqliteCache::new(db.pool().clone())),
    };
    Ok(cache)
}
