//! Composition root: wires storage, cache, upstream client and the event bus

use crate::cache::{open_cache, CacheStore, CommentChunkCache};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::events::{EventResolver, LocalEventBus};
use crate::ingest::{CommentIngestor, ContinuationHandler};
use crate::meta::MetaDb;
use crate::models::IngestionState;
use crate::progress::add_spinner;
use crate::service::VideoService;
use crate::upstream::UpstreamClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// How a followed chain ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowOutcome {
    Complete,
    /// Bus drained while the chain was still in progress
    Stalled,
}

pub struct App {
    pub config: Config,
    pub db: MetaDb,
    pub cache: Arc<dyn CacheStore>,
    pub service: VideoService,
    bus: LocalEventBus,
    dispatcher: JoinHandle<()>,
}

impl App {
    pub async fn build(config: Config) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            Error::Config(format!(
                "No upstream API key configured. Set {} or upstream.api_key in the config file",
                config.upstream.api_key_env
            ))
        })?;
        let upstream = Arc::new(UpstreamClient::new(&config.upstream, api_key)?);
        Self::with_upstream(config, upstream).await
    }

    /// Build around an existing upstream client
    pub async fn with_upstream(config: Config, upstream: Arc<UpstreamClient>) -> Result<Self> {
        let db = MetaDb::connect(&config).await?;
        let cache = open_cache(&config, &db)?;
        let chunks = CommentChunkCache::new(cache.clone(), config.cache.chunk_size);

        let (bus, dispatcher) = LocalEventBus::new();
        let ingestor = Arc::new(CommentIngestor::new(
            db.clone(),
            chunks,
            upstream.clone(),
            Arc::new(bus.clone()),
        ));
        let resolver = Arc::new(EventResolver::new(Arc::new(ContinuationHandler::new(
            ingestor.clone(),
        ))));
        let dispatcher = dispatcher.run(resolver);

        let service = VideoService::new(
            db.clone(),
            cache.clone(),
            upstream,
            ingestor,
            config.comments.clone(),
        );

        Ok(Self {
            config,
            db,
            cache,
            service,
            bus,
            dispatcher,
        })
    }

    pub fn bus(&self) -> &LocalEventBus {
        &self.bus
    }

    /// Wait for a video's chain to finish, or for the bus to go quiet without it finishing
    pub async fn follow(&self, video_id: &str, show_progress: bool) -> Result<FollowOutcome> {
        let spinner = show_progress.then(|| {
            let pb = add_spinner();
            pb.set_message(format!("Ingesting comments for {}", video_id));
            pb
        });

        let outcome = loop {
            match self.service.ingestion_state(video_id).await? {
                IngestionState::Complete => break FollowOutcome::Complete,
                IngestionState::NotStarted => break FollowOutcome::Stalled,
                IngestionState::InProgress => {}
            }

            if self.bus.is_idle() {
                // a step may have finished between the state read and the idle check
                if self.service.ingestion_state(video_id).await? == IngestionState::Complete {
                    break FollowOutcome::Complete;
                }
                break FollowOutcome::Stalled;
            }

            if let Some(pb) = &spinner {
                let stored = self.service.stored_comment_count(video_id).await?;
                pb.set_message(format!("Ingesting comments for {} ({} stored)", video_id, stored));
            }
            tokio::time::sleep(FOLLOW_POLL_INTERVAL).await;
        };

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }
        if outcome == FollowOutcome::Stalled {
            warn!(
                "Ingestion for {} stopped before completing ({} handler failures)",
                video_id,
                self.bus.failures()
            );
        }
        Ok(outcome)
    }

    /// Stop the dispatcher; events still queued are dropped
    pub fn shutdown(self) {
        debug!("Shutting down event dispatcher ({} pending)", self.bus.pending());
        self.dispatcher.abort();
    }
}
