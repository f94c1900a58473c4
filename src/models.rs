//! Canonical shapes shared by the cache, the store and the upstream client.

use serde::{Deserialize, Serialize};

/// Video metadata as served to callers and stored under `video:{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoDetails {
    pub video_id: String,
    pub title: String,
    pub description: String,
    pub view_count: i64,
    pub like_count: i64,
}

/// A comment as fetched from upstream, before it gets an internal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawComment {
    pub comment_id: String,
    pub video_id: String,
    pub text: String,
}

/// Where a video's continuation chain stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionState {
    NotStarted,
    InProgress,
    Complete,
}

impl std::fmt::Display for IngestionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestionState::NotStarted => write!(f, "not_started"),
            IngestionState::InProgress => write!(f, "in_progress"),
            IngestionState::Complete => write!(f, "complete"),
        }
    }
}
