//! Event publishing and topic routing
//!
//! Topics form a closed set. Each topic maps to exactly one handler through
//! an exhaustive match in `EventResolver`, so adding a topic fails to compile
//! until it is routed.

mod bus;

pub use bus::*;

use crate::error::{Error, Result};
use crate::models::RawComment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Event topics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    #[serde(rename = "load-more-comments")]
    LoadMoreComments,
}

impl Topic {
    pub const ALL: [Topic; 1] = [Topic::LoadMoreComments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::LoadMoreComments => "load-more-comments",
        }
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Topic::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| Error::Event(format!("Unknown topic: {}", s)))
    }
}

/// Payload of a `load-more-comments` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadMoreComments {
    pub video_id: String,
    #[serde(default)]
    pub new_comments: Vec<RawComment>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// A published event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "eventId")]
    pub event_id: Uuid,
    #[serde(rename = "type")]
    pub topic: Topic,
    pub payload: Value,
}

impl Event {
    pub fn new<P: Serialize>(topic: Topic, payload: &P) -> Result<Self> {
        Ok(Self {
            event_id: Uuid::new_v4(),
            topic,
            payload: serde_json::to_value(payload)?,
        })
    }

    pub fn load_more_comments(payload: &LoadMoreComments) -> Result<Self> {
        Self::new(Topic::LoadMoreComments, payload)
    }
}

/// Fire-and-forget event sink
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: Event) -> Result<()>;
}

/// Something that processes the payload of one topic
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn execute(&self, payload: Value) -> Result<()>;
}

/// Routes events to their topic's handler
pub struct EventResolver {
    load_more_comments: Arc<dyn EventHandler>,
}

impl EventResolver {
    pub fn new(load_more_comments: Arc<dyn EventHandler>) -> Self {
        Self { load_more_comments }
    }

    pub fn handler_for(&self, topic: Topic) -> &Arc<dyn EventHandler> {
        match topic {
            Topic::LoadMoreComments => &self.load_more_comments,
        }
    }

    pub async fn process_event(&self, event: Event) -> Result<()> {
        debug!("Processing event {} on {}", event.event_id, event.topic);
        self.handler_for(event.topic).execute(event.payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<Value>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        async fn execute(&self, payload: Value) -> Result<()> {
            self.seen.lock().await.push(payload);
            Ok(())
        }
    }

    #[test]
    fn test_topic_names() {
        assert_eq!(Topic::LoadMoreComments.to_string(), "load-more-comments");
        assert_eq!(
            "load-more-comments".parse::<Topic>().unwrap(),
            Topic::LoadMoreComments
        );
        assert!("test-topic".parse::<Topic>().is_err());
    }

    #[test]
    fn test_event_wire_shape() {
        let event = Event::load_more_comments(&LoadMoreComments {
            video_id: "v".to_string(),
            new_comments: Vec::new(),
            next_page_token: Some("A".to_string()),
        })
        .unwrap();

        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire["type"], "load-more-comments");
        assert_eq!(wire["payload"]["videoId"], "v");
        assert_eq!(wire["payload"]["nextPageToken"], "A");
        assert!(wire["eventId"].is_string());

        let other = Event::load_more_comments(&LoadMoreComments {
            video_id: "v".to_string(),
            new_comments: Vec::new(),
            next_page_token: None,
        })
        .unwrap();
        assert_ne!(event.event_id, other.event_id);
    }

    #[tokio::test]
    async fn test_resolver_routes_by_topic() {
        let recorder = Arc::new(Recorder::default());
        let resolver = EventResolver::new(recorder.clone());

        let event = Event::new(Topic::LoadMoreComments, &json!({ "videoId": "v" })).unwrap();
        resolver.process_event(event).await.unwrap();

        let seen = recorder.seen.lock().await;
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0]["videoId"], "v");
    }
}
