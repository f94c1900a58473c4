//! Comment chunk cache
//!
//! Fetched comment pages are written to fixed-size, index-addressed chunks
//! (`comments:{video}:chunk:{n}`) by the continuation chain. Readers assemble
//! any page window from consecutive chunks and never fill chunks themselves,
//! so a window can come back short while ingestion is still running.

use super::{get_json, keys, set_json, CacheStore};
use crate::error::{Error, Result};
use crate::models::{IngestionState, RawComment};
use crate::pagination::PageRequest;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

const STATUS_COMPLETE: &str = "complete";

/// Items read for a page window
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPage {
    pub items: Vec<RawComment>,
    pub meta: ChunkPageMeta,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkPageMeta {
    pub per_page: u32,
    pub page: u32,
    pub start_index: usize,
    pub chunks_read: usize,
    /// Fewer items than requested: a chunk in the window is not cached yet
    pub partial: bool,
}

/// Where the continuation chain should pick up from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeCursor {
    /// No page has completed yet
    NotRecorded,
    /// Fetch this token next
    Next(String),
    /// The last fetched page had no next token
    Exhausted,
}

#[derive(Clone)]
pub struct CommentChunkCache {
    cache: Arc<dyn CacheStore>,
    chunk_size: usize,
}

impl CommentChunkCache {
    pub fn new(cache: Arc<dyn CacheStore>, chunk_size: usize) -> Self {
        Self {
            cache,
            chunk_size: chunk_size.max(1),
        }
    }

    async fn chunk(&self, video_id: &str, chunk_index: usize) -> Result<Option<Vec<RawComment>>> {
        get_json(self.cache.as_ref(), &keys::comment_chunk(video_id, chunk_index)).await
    }

    /// Assemble a page window from consecutive chunks.
    ///
    /// Reading stops at the first chunk that is not cached; whatever was
    /// accumulated up to that point is sliced to the window and returned.
    pub async fn get_page(&self, video_id: &str, request: PageRequest) -> Result<ChunkPage> {
        let start_index = request.start_index();
        let per_page = request.per_page as usize;
        let first_chunk = start_index / self.chunk_size;
        let offset_in_first = start_index - first_chunk * self.chunk_size;
        let needed = offset_in_first + per_page;

        let mut accumulated: Vec<RawComment> = Vec::with_capacity(needed);
        let mut chunk_index = first_chunk;
        let mut chunks_read = 0;

        while accumulated.len() < needed {
            match self.chunk(video_id, chunk_index).await? {
                Some(items) => {
                    accumulated.extend(items);
                    chunks_read += 1;
                    chunk_index += 1;
                }
                None => {
                    debug!(
                        "Chunk {} for {} not cached yet; returning partial window",
                        chunk_index, video_id
                    );
                    break;
                }
            }
        }

        let items: Vec<RawComment> = accumulated
            .into_iter()
            .skip(offset_in_first)
            .take(per_page)
            .collect();
        let partial = items.len() < per_page;

        Ok(ChunkPage {
            items,
            meta: ChunkPageMeta {
                per_page: request.per_page,
                page: request.page,
                start_index,
                chunks_read,
                partial,
            },
        })
    }

    /// Pack comments onto the chunk grid after the ones already cached.
    ///
    /// The last chunk is topped up to `chunk_size` before the next one is
    /// started, so chunk `n` always holds offsets `n * chunk_size..(n + 1) * chunk_size`
    /// whatever size the upstream pages were. Returns the first chunk index written.
    pub async fn append(&self, video_id: &str, comments: &[RawComment]) -> Result<usize> {
        let offset = self.cached_count(video_id).await?.unwrap_or(0);
        let first_chunk = offset / self.chunk_size;
        if comments.is_empty() {
            return Ok(first_chunk);
        }

        let filled = offset % self.chunk_size;
        let mut slot = if filled == 0 {
            Vec::with_capacity(self.chunk_size)
        } else {
            let existing = self.chunk(video_id, first_chunk).await?.unwrap_or_default();
            if existing.len() != filled {
                return Err(Error::Cache(format!(
                    "Chunk {} for {} holds {} comments, cursor expects {}",
                    first_chunk,
                    video_id,
                    existing.len(),
                    filled
                )));
            }
            existing
        };

        let mut chunk_index = first_chunk;
        let mut remaining = comments;
        loop {
            let take = (self.chunk_size - slot.len()).min(remaining.len());
            slot.extend_from_slice(&remaining[..take]);
            remaining = &remaining[take..];
            set_json(
                self.cache.as_ref(),
                &keys::comment_chunk(video_id, chunk_index),
                &slot,
            )
            .await?;
            if remaining.is_empty() {
                break;
            }
            chunk_index += 1;
            slot = Vec::with_capacity(self.chunk_size);
        }

        let cached = offset + comments.len();
        self.cache
            .set(&keys::comment_cursor(video_id), &cached.to_string())
            .await?;
        debug!(
            "Cached {} comments for {} in chunks {}..={} ({} total)",
            comments.len(),
            video_id,
            first_chunk,
            chunk_index,
            cached
        );
        Ok(first_chunk)
    }

    /// Comments cached so far; `None` before the chain has started
    async fn cached_count(&self, video_id: &str) -> Result<Option<usize>> {
        match self.cache.get(&keys::comment_cursor(video_id)).await? {
            Some(raw) => raw
                .parse::<usize>()
                .map(Some)
                .map_err(|_| Error::Cache(format!("Corrupt chunk cursor for {}: {}", video_id, raw))),
            None => Ok(None),
        }
    }

    /// Current state of the video's continuation chain
    pub async fn state(&self, video_id: &str) -> Result<IngestionState> {
        if self.cache.get(&keys::comment_status(video_id)).await?.as_deref() == Some(STATUS_COMPLETE) {
            return Ok(IngestionState::Complete);
        }
        if self.cached_count(video_id).await?.is_some() {
            return Ok(IngestionState::InProgress);
        }
        Ok(IngestionState::NotStarted)
    }

    /// Mark a chain as started before its first page is fetched
    pub async fn mark_started(&self, video_id: &str) -> Result<()> {
        if self.cached_count(video_id).await?.is_none() {
            self.cache.set(&keys::comment_cursor(video_id), "0").await?;
        }
        Ok(())
    }

    pub async fn mark_complete(&self, video_id: &str) -> Result<()> {
        self.cache
            .set(&keys::comment_status(video_id), STATUS_COMPLETE)
            .await
    }

    /// Forget a chain that never got past its first page
    pub async fn reset(&self, video_id: &str) -> Result<()> {
        self.cache.delete(&keys::comment_cursor(video_id)).await?;
        self.cache.delete(&keys::comment_resume(video_id)).await
    }

    /// Drop every key belonging to the video
    pub async fn clear(&self, video_id: &str) -> Result<()> {
        let cached = self.cached_count(video_id).await?.unwrap_or(0);
        for chunk_index in 0..cached.div_ceil(self.chunk_size) {
            self.cache
                .delete(&keys::comment_chunk(video_id, chunk_index))
                .await?;
        }
        self.cache.delete(&keys::comment_status(video_id)).await?;
        self.cache.delete(&keys::video(video_id)).await?;
        self.reset(video_id).await
    }

    pub async fn set_resume_token(&self, video_id: &str, next_page_token: Option<&str>) -> Result<()> {
        self.cache
            .set(&keys::comment_resume(video_id), next_page_token.unwrap_or(""))
            .await
    }

    pub async fn resume_cursor(&self, video_id: &str) -> Result<ResumeCursor> {
        Ok(match self.cache.get(&keys::comment_resume(video_id)).await? {
            None => ResumeCursor::NotRecorded,
            Some(token) if token.is_empty() => ResumeCursor::Exhausted,
            Some(token) => ResumeCursor::Next(token),
        })
    }
}
