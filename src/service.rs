//! Operations exposed to the entry layer (CLI, or an HTTP front end)

use crate::cache::{get_json, keys, set_json, CacheStore, CommentChunkCache};
use crate::config::CommentsConfig;
use crate::error::{Error, Result};
use crate::ingest::{CommentIngestor, ResumeOutcome};
use crate::meta::{Comment, MetaDb};
use crate::models::{IngestionState, RawComment, VideoDetails};
use crate::pagination::{PageMeta, PageRequest, Paginated};
use crate::upstream::UpstreamClient;
use std::sync::Arc;
use tracing::{debug, info};

pub struct VideoService {
    db: MetaDb,
    cache: Arc<dyn CacheStore>,
    upstream: Arc<UpstreamClient>,
    ingestor: Arc<CommentIngestor>,
    comments: CommentsConfig,
}

impl VideoService {
    pub fn new(
        db: MetaDb,
        cache: Arc<dyn CacheStore>,
        upstream: Arc<UpstreamClient>,
        ingestor: Arc<CommentIngestor>,
        comments: CommentsConfig,
    ) -> Self {
        Self {
            db,
            cache,
            upstream,
            ingestor,
            comments,
        }
    }

    fn chunks(&self) -> &CommentChunkCache {
        self.ingestor.chunks()
    }

    /// Cache-aside read of video metadata.
    ///
    /// A hit returns without touching upstream or the database. A miss costs one
    /// upstream call, one upsert and one cache write.
    pub async fn fetch_video_details(&self, video_id: &str) -> Result<VideoDetails> {
        let key = keys::video(video_id);
        if let Some(cached) = get_json::<VideoDetails>(self.cache.as_ref(), &key).await? {
            debug!("Returning cached video details for {}", video_id);
            return Ok(cached);
        }

        let details = self
            .upstream
            .video(video_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Invalid video id: {}", video_id)))?;

        self.db.upsert_video(&details).await?;
        set_json(self.cache.as_ref(), &key, &details).await?;

        info!("Video details for {} saved to the database and cached", video_id);
        Ok(details)
    }

    /// Serve a window of comments, starting the ingestion chain on first use.
    ///
    /// The video must already be stored. An explicit `page_token` runs one step
    /// from that token instead of the usual first-page initiation.
    pub async fn fetch_video_comments(
        &self,
        video_id: &str,
        page_token: Option<&str>,
        per_page: Option<u32>,
        page: Option<u32>,
    ) -> Result<Paginated<RawComment>> {
        let request = PageRequest::resolve(per_page, page, &self.comments)?;

        if self.db.get_video(video_id).await?.is_none() {
            return Err(Error::Database("Save video details first".to_string()));
        }

        match page_token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => {
                self.ingestor.continue_from(video_id, token).await?;
            }
            None => {
                self.ingestor.start_if_idle(video_id).await?;
            }
        }

        let window = self.chunks().get_page(video_id, request).await?;
        let total = self.db.count_comments(video_id).await?;

        Ok(Paginated {
            data: window.items,
            meta: PageMeta::new(total, request.per_page, request.page),
        })
    }

    /// Page through persisted comments without touching upstream
    pub async fn list_stored_comments(
        &self,
        video_id: &str,
        per_page: Option<u32>,
        page: Option<u32>,
    ) -> Result<Paginated<Comment>> {
        let request = PageRequest::resolve(per_page, page, &self.comments)?;
        self.db.list_comments(video_id, request).await
    }

    pub async fn ingestion_state(&self, video_id: &str) -> Result<IngestionState> {
        self.chunks().state(video_id).await
    }

    /// Re-trigger a stalled chain
    pub async fn resume(&self, video_id: &str) -> Result<ResumeOutcome> {
        if self.db.get_video(video_id).await?.is_none() {
            return Err(Error::Database("Save video details first".to_string()));
        }
        self.ingestor.resume(video_id).await
    }

    pub async fn stored_comment_count(&self, video_id: &str) -> Result<u64> {
        self.db.count_comments(video_id).await
    }

    /// Delete a video, its comments and every cache entry for it
    pub async fn remove_video(&self, video_id: &str) -> Result<bool> {
        let removed = self.db.delete_video(video_id).await?;
        self.chunks().clear(video_id).await?;
        Ok(removed)
    }
}
