//! Handler for `load-more-comments` events

use super::CommentIngestor;
use crate::error::Result;
use crate::events::{EventHandler, LoadMoreComments};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Drives the next step of a video's chain, or closes it when upstream is exhausted
pub struct ContinuationHandler {
    ingestor: Arc<CommentIngestor>,
}

impl ContinuationHandler {
    pub fn new(ingestor: Arc<CommentIngestor>) -> Self {
        Self { ingestor }
    }
}

#[async_trait]
impl EventHandler for ContinuationHandler {
    async fn execute(&self, payload: Value) -> Result<()> {
        let payload: LoadMoreComments = serde_json::from_value(payload)?;
        debug!(
            "Continuation for {} ({} new comments in previous page)",
            payload.video_id,
            payload.new_comments.len()
        );

        self.ingestor.continue_chain(&payload).await
    }
}
