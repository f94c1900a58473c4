//! Comment ingestion chain
//!
//! A chain walks a video's upstream comment pages one step at a time:
//! - fetch one page through the backoff fetcher
//! - persist the comments not stored yet
//! - write the page into the next chunk slot and record the resume token
//! - publish a `load-more-comments` event carrying the next page token
//!
//! The continuation handler picks that event up and either runs the next step
//! or marks the video complete. Step failures propagate to whoever ran the
//! step; a stalled chain stays in progress until `resume` is called.
//!
//! Every step for a video runs under that video's lock. While a continuation
//! event is queued or being handled, `resume` and explicit-token requests
//! leave the chain alone.

mod continuation;
mod dedup;
mod guard;

pub use continuation::*;
pub use dedup::*;
pub use guard::*;

use crate::cache::{CommentChunkCache, ResumeCursor};
use crate::error::Result;
use crate::events::{Event, EventPublisher, LoadMoreComments};
use crate::meta::MetaDb;
use crate::models::IngestionState;
use crate::upstream::UpstreamClient;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one page-fetch step did
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub fetched: usize,
    pub inserted: usize,
    pub chunk_index: Option<usize>,
    pub next_page_token: Option<String>,
}

/// Result of asking a chain to resume
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ResumeOutcome {
    AlreadyComplete,
    AlreadyRunning,
    Started(StepOutcome),
    Resumed(StepOutcome),
    MarkedComplete,
}

pub struct CommentIngestor {
    db: MetaDb,
    chunks: CommentChunkCache,
    upstream: Arc<UpstreamClient>,
    publisher: Arc<dyn EventPublisher>,
    steps: KeyedLocks,
    in_flight: InFlight,
}

impl CommentIngestor {
    pub fn new(
        db: MetaDb,
        chunks: CommentChunkCache,
        upstream: Arc<UpstreamClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            db,
            chunks,
            upstream,
            publisher,
            steps: KeyedLocks::new(),
            in_flight: InFlight::new(),
        }
    }

    pub fn chunks(&self) -> &CommentChunkCache {
        &self.chunks
    }

    /// Run one page-fetch step and publish its continuation event.
    /// Callers hold the video's step lock.
    async fn fetch_page(&self, video_id: &str, page_token: Option<&str>) -> Result<StepOutcome> {
        let page = self.upstream.comment_threads(video_id, page_token).await?;
        let new_comments = persist_new_comments(&self.db, video_id, &page.comments).await?;

        // only unseen comments go to the chunk grid, so a re-fetched page never repeats
        let chunk_index = if new_comments.is_empty() {
            None
        } else {
            Some(self.chunks.append(video_id, &new_comments).await?)
        };
        self.chunks
            .set_resume_token(video_id, page.next_page_token.as_deref())
            .await?;

        let outcome = StepOutcome {
            fetched: page.comments.len(),
            inserted: new_comments.len(),
            chunk_index,
            next_page_token: page.next_page_token.clone(),
        };

        let event = Event::load_more_comments(&LoadMoreComments {
            video_id: video_id.to_string(),
            new_comments,
            next_page_token: page.next_page_token,
        })?;
        self.in_flight.begin(video_id);
        if let Err(e) = self.publisher.publish(event).await {
            self.in_flight.finish(video_id);
            return Err(e);
        }

        info!(
            "Fetched {} comments for {} ({} new){}",
            outcome.fetched,
            video_id,
            outcome.inserted,
            if outcome.next_page_token.is_some() {
                ", more pages pending"
            } else {
                ""
            }
        );
        Ok(outcome)
    }

    /// Start the chain for a video that has never been ingested.
    ///
    /// Single-flight per video: concurrent callers wait for the first one and
    /// then find the chain already running. Returns `None` when nothing was started.
    pub async fn start_if_idle(&self, video_id: &str) -> Result<Option<StepOutcome>> {
        let _guard = self.steps.acquire(video_id).await;

        if self.chunks.state(video_id).await? != IngestionState::NotStarted {
            return Ok(None);
        }

        info!("Starting comment ingestion for {}", video_id);
        self.chunks.mark_started(video_id).await?;
        match self.fetch_page(video_id, None).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                if let Err(reset_err) = self.chunks.reset(video_id).await {
                    warn!("Could not reset ingestion markers for {}: {}", video_id, reset_err);
                }
                Err(e)
            }
        }
    }

    /// Run a step from an explicit page token supplied by the caller.
    ///
    /// Returns `None` without fetching when the chain is complete or already
    /// has a continuation queued.
    pub async fn continue_from(&self, video_id: &str, page_token: &str) -> Result<Option<StepOutcome>> {
        let _guard = self.steps.acquire(video_id).await;
        if self.in_flight.is_active(video_id) {
            debug!("Chain for {} is running; ignoring explicit page token", video_id);
            return Ok(None);
        }
        if self.chunks.state(video_id).await? == IngestionState::Complete {
            return Ok(None);
        }
        self.chunks.mark_started(video_id).await?;
        self.fetch_page(video_id, Some(page_token)).await.map(Some)
    }

    /// Handle one continuation event: run the next step, or close the chain
    /// when upstream had no further page
    pub async fn continue_chain(&self, payload: &LoadMoreComments) -> Result<()> {
        let video_id = payload.video_id.as_str();
        let _guard = self.steps.acquire(video_id).await;

        let result = match payload.next_page_token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => self.fetch_page(video_id, Some(token)).await.map(|_| ()),
            None => self.complete(video_id).await,
        };
        self.in_flight.finish(video_id);
        result
    }

    /// Finish the chain: no further pages upstream
    pub async fn complete(&self, video_id: &str) -> Result<()> {
        self.chunks.mark_complete(video_id).await?;
        info!("Comment ingestion complete for {}", video_id);
        Ok(())
    }

    /// Pick a stalled chain back up from its last recorded token
    pub async fn resume(&self, video_id: &str) -> Result<ResumeOutcome> {
        match self.chunks.state(video_id).await? {
            IngestionState::Complete => Ok(ResumeOutcome::AlreadyComplete),
            IngestionState::NotStarted => Ok(match self.start_if_idle(video_id).await? {
                Some(outcome) => ResumeOutcome::Started(outcome),
                None => ResumeOutcome::AlreadyRunning,
            }),
            IngestionState::InProgress => {
                let _guard = self.steps.acquire(video_id).await;
                if self.in_flight.is_active(video_id) {
                    return Ok(ResumeOutcome::AlreadyRunning);
                }
                // the last step may have closed the chain while we waited for the lock
                if self.chunks.state(video_id).await? == IngestionState::Complete {
                    return Ok(ResumeOutcome::AlreadyComplete);
                }
                match self.chunks.resume_cursor(video_id).await? {
                    ResumeCursor::Next(token) => {
                        info!("Resuming comment ingestion for {}", video_id);
                        Ok(ResumeOutcome::Resumed(self.fetch_page(video_id, Some(&token)).await?))
                    }
                    ResumeCursor::NotRecorded => {
                        info!("Restarting comment ingestion for {} from the first page", video_id);
                        Ok(ResumeOutcome::Resumed(self.fetch_page(video_id, None).await?))
                    }
                    ResumeCursor::Exhausted => {
                        self.complete(video_id).await?;
                        Ok(ResumeOutcome::MarkedComplete)
                    }
                }
            }
        }
    }
}
