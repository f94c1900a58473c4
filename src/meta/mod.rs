//! Persistent storage using SQLite
//!
//! This module handles the source of truth for:
//! - Videos (metadata, upserted by external id)
//! - Comments (deduplicated by external comment id per video)

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{db_error, Result};
use crate::models::{RawComment, VideoDetails};
use crate::pagination::{PageMeta, PageRequest, Paginated};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

/// A persisted video row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Video {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub view_count: i64,
    pub like_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Video> for VideoDetails {
    fn from(video: Video) -> Self {
        Self {
            video_id: video.video_id,
            title: video.title,
            description: video.description,
            view_count: video.view_count,
            like_count: video.like_count,
        }
    }
}

/// A persisted comment row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub comment_id: String,
    pub video_id: String,
    pub text: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub video_count: usize,
    pub comment_count: usize,
}

/// Metadata database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the database configured in `config`, creating the schema if needed
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| db_error("Error opening the database", e))?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Shared pool, used by the sqlite cache backend
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Error initializing the database schema", e))?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM sqlite_master WHERE type='table' AND name='comments'")
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| db_error("Error inspecting the database", e))?;
        Ok(result.is_some())
    }

    // ===== Video Operations =====

    /// Insert a video, or merge into the existing row for the same id
    pub async fn upsert_video(&self, details: &VideoDetails) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO videos (video_id, title, description, view_count, like_count, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(video_id) DO UPDATE SET
                title = excluded.title,
                description = excluded.description,
                view_count = excluded.view_count,
                like_count = excluded.like_count,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&details.video_id)
        .bind(&details.title)
        .bind(&details.description)
        .bind(details.view_count)
        .bind(details.like_count)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Video repository - error inserting into the database", e))?;
        Ok(())
    }

    /// Get video by external id
    pub async fn get_video(&self, video_id: &str) -> Result<Option<Video>> {
        sqlx::query_as::<_, Video>("SELECT * FROM videos WHERE video_id = ?")
            .bind(video_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Video repository - error retrieving from the database", e))
    }

    /// List all videos, most recently updated first
    pub async fn list_videos(&self) -> Result<Vec<Video>> {
        sqlx::query_as::<_, Video>("SELECT * FROM videos ORDER BY updated_at DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Video repository - error retrieving from the database", e))
    }

    /// Delete a video; its comments go with it. Returns whether a row was removed.
    pub async fn delete_video(&self, video_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM videos WHERE video_id = ?")
            .bind(video_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Video repository - error deleting from the database", e))?;
        Ok(result.rows_affected() > 0)
    }

    // ===== Comment Operations =====

    /// Return which of `comment_ids` are already stored for the video, in one query
    pub async fn existing_comment_ids(
        &self,
        video_id: &str,
        comment_ids: &[String],
    ) -> Result<HashSet<String>> {
        if comment_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = comment_ids
            .iter()
            .map(|_| "?")
            .collect::<Vec<_>>()
            .join(",");
        let query = format!(
            "SELECT comment_id FROM comments WHERE video_id = ? AND comment_id IN ({})",
            placeholders
        );

        let mut query_builder = sqlx::query_scalar::<_, String>(&query).bind(video_id);
        for id in comment_ids {
            query_builder = query_builder.bind(id);
        }
        let existing: Vec<String> = query_builder
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Comment repository - error retrieving from the database", e))?;

        Ok(existing.into_iter().collect())
    }

    /// Insert comments in a single statement
    pub async fn insert_comments(&self, comments: &[RawComment]) -> Result<()> {
        if comments.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO comments (id, comment_id, video_id, text, created_at, updated_at) ",
        );
        builder.push_values(comments, |mut row, comment| {
            row.push_bind(Uuid::new_v4().to_string())
                .push_bind(comment.comment_id.clone())
                .push_bind(comment.video_id.clone())
                .push_bind(comment.text.clone())
                .push_bind(now.clone())
                .push_bind(now.clone());
        });
        builder.push(" ON CONFLICT(video_id, comment_id) DO NOTHING");

        builder
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Comment repository - error inserting into the database", e))?;
        Ok(())
    }

    /// Number of stored comments for a video
    pub async fn count_comments(&self, video_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE video_id = ?")
            .bind(video_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Comment repository - error retrieving from the database", e))?;
        Ok(count as u64)
    }

    /// Page through stored comments in insertion order
    pub async fn list_comments(
        &self,
        video_id: &str,
        request: PageRequest,
    ) -> Result<Paginated<Comment>> {
        let total = self.count_comments(video_id).await?;

        let data = sqlx::query_as::<_, Comment>(
            "SELECT * FROM comments WHERE video_id = ? ORDER BY rowid LIMIT ? OFFSET ?",
        )
        .bind(video_id)
        .bind(request.per_page as i64)
        .bind(request.start_index() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Comment repository - error retrieving from the database", e))?;

        Ok(Paginated {
            data,
            meta: PageMeta::new(total, request.per_page, request.page),
        })
    }

    // ===== Statistics =====

    /// Get global statistics
    pub async fn global_stats(&self) -> Result<GlobalStats> {
        let video_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Error reading statistics", e))?;

        let comment_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Error reading statistics", e))?;

        Ok(GlobalStats {
            video_count: video_count as usize,
            comment_count: comment_count as usize,
        })
    }
}
