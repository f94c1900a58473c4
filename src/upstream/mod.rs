//! Upstream video API client
//!
//! This module provides:
//! - Exponential backoff on HTTP 429
//! - A process-wide request quota
//! - Typed video and comment-thread endpoints

mod backoff;
mod rate_limit;

pub use backoff::*;
pub use rate_limit::*;

use crate::config::UpstreamConfig;
use crate::error::{Error, Result};
use crate::models::{RawComment, VideoDetails};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Counts arrive as decimal strings from the provider, but accept numbers too
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Count {
    Number(i64),
    Text(String),
}

impl Count {
    fn value(&self, field: &str) -> Result<i64> {
        match self {
            Count::Number(n) => Ok(*n),
            Count::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| Error::Upstream(format!("Malformed {}: {:?}", field, s))),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Clone, Deserialize)]
struct VideoItem {
    id: String,
    snippet: VideoSnippet,
    #[serde(default)]
    statistics: VideoStatistics,
}

#[derive(Debug, Clone, Deserialize)]
struct VideoSnippet {
    title: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    #[serde(default)]
    view_count: Option<Count>,
    #[serde(default)]
    like_count: Option<Count>,
}

/// Absent counts (hidden likes, say) read as zero; unparseable ones are errors
fn count_or_zero(count: Option<Count>, field: &str) -> Result<i64> {
    count.map_or(Ok(0), |c| c.value(field))
}

impl TryFrom<VideoItem> for VideoDetails {
    type Error = Error;

    fn try_from(item: VideoItem) -> Result<Self> {
        Ok(Self {
            view_count: count_or_zero(item.statistics.view_count, "viewCount")?,
            like_count: count_or_zero(item.statistics.like_count, "likeCount")?,
            video_id: item.id,
            title: item.snippet.title,
            description: item.snippet.description,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadListResponse {
    #[serde(default)]
    items: Vec<CommentThreadItem>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CommentThreadItem {
    id: String,
    snippet: CommentThreadSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentThreadSnippet {
    top_level_comment: TopLevelComment,
}

#[derive(Debug, Clone, Deserialize)]
struct TopLevelComment {
    snippet: CommentSnippet,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommentSnippet {
    #[serde(default)]
    text_display: String,
}

/// One page of comment threads
#[derive(Debug, Clone)]
pub struct CommentPage {
    pub comments: Vec<RawComment>,
    pub next_page_token: Option<String>,
}

pub struct UpstreamClient {
    fetcher: BackoffFetcher,
    base_url: Url,
    api_key: String,
    comments_page_size: u32,
}

impl UpstreamClient {
    /// Create a client from config and a resolved API key
    pub fn new(config: &UpstreamConfig, api_key: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let policy = RetryPolicy {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.backoff_base_ms),
        };
        let quota = Arc::new(RequestQuota::new(config.requests_per_second));

        // join() replaces the last segment unless the base ends with '/'
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }

        Ok(Self {
            fetcher: BackoffFetcher::new(client, policy, Some(quota)),
            base_url: Url::parse(&base)?,
            api_key,
            comments_page_size: config.comments_page_size,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid upstream URL: {}", e)))
    }

    /// Fetch metadata for one video. `None` when the provider has no such id.
    pub async fn video(&self, video_id: &str) -> Result<Option<VideoDetails>> {
        let mut url = self.endpoint("videos")?;
        url.query_pairs_mut()
            .append_pair("id", video_id)
            .append_pair("part", "snippet,statistics")
            .append_pair("key", &self.api_key);

        let response: VideoListResponse = self.fetcher.fetch_json(&url).await?;
        response
            .items
            .into_iter()
            .next()
            .map(VideoDetails::try_from)
            .transpose()
    }

    /// Fetch one page of top-level comment threads
    pub async fn comment_threads(
        &self,
        video_id: &str,
        page_token: Option<&str>,
    ) -> Result<CommentPage> {
        let mut url = self.endpoint("commentThreads")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("videoId", video_id)
                .append_pair("part", "snippet")
                .append_pair("maxResults", &self.comments_page_size.to_string());
            if let Some(token) = page_token.filter(|t| !t.trim().is_empty()) {
                query.append_pair("pageToken", token);
            }
            query.append_pair("key", &self.api_key);
        }

        let response: CommentThreadListResponse = self.fetcher.fetch_json(&url).await?;
        let comments = response
            .items
            .into_iter()
            .map(|item| RawComment {
                comment_id: item.id,
                video_id: video_id.to_string(),
                text: item.snippet.top_level_comment.snippet.text_display,
            })
            .collect();

        Ok(CommentPage {
            comments,
            next_page_token: response.next_page_token.filter(|t| !t.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> UpstreamClient {
        let config = UpstreamConfig {
            base_url: format!("{}/youtube/v3", server.uri()),
            backoff_base_ms: 5,
            requests_per_second: 1000,
            ..UpstreamConfig::default()
        };
        UpstreamClient::new(&config, "test-key".to_string()).unwrap()
    }

    #[tokio::test]
    async fn test_video_maps_payload() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .and(query_param("id", "abc"))
            .and(query_param("part", "snippet,statistics"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "abc",
                    "snippet": { "title": "A video", "description": "About things" },
                    "statistics": { "viewCount": "1200", "likeCount": 34 }
                }]
            })))
            .mount(&mock_server)
            .await;

        let details = client(&mock_server).video("abc").await.unwrap().unwrap();
        assert_eq!(details.video_id, "abc");
        assert_eq!(details.title, "A video");
        assert_eq!(details.view_count, 1200);
        assert_eq!(details.like_count, 34);
    }

    #[tokio::test]
    async fn test_malformed_count_is_upstream_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "abc",
                    "snippet": { "title": "A video" },
                    "statistics": { "viewCount": "abc" }
                }]
            })))
            .mount(&mock_server)
            .await;

        let err = client(&mock_server).video("abc").await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
    }

    #[tokio::test]
    async fn test_missing_like_count_reads_as_zero() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "abc",
                    "snippet": { "title": "A video" },
                    "statistics": { "viewCount": "5" }
                }]
            })))
            .mount(&mock_server)
            .await;

        let details = client(&mock_server).video("abc").await.unwrap().unwrap();
        assert_eq!(details.view_count, 5);
        assert_eq!(details.like_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_video_is_none() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
            .mount(&mock_server)
            .await;

        assert!(client(&mock_server).video("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_comment_threads_page_token() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/commentThreads"))
            .and(query_param("videoId", "abc"))
            .and(query_param("maxResults", "100"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{
                    "id": "t1",
                    "snippet": { "topLevelComment": { "snippet": { "textDisplay": "first!" } } }
                }],
                "nextPageToken": "NEXT"
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/commentThreads"))
            .and(query_param("pageToken", "NEXT"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [],
                "nextPageToken": ""
            })))
            .mount(&mock_server)
            .await;

        let client = client(&mock_server);
        let first = client.comment_threads("abc", None).await.unwrap();
        assert_eq!(first.comments.len(), 1);
        assert_eq!(first.comments[0].comment_id, "t1");
        assert_eq!(first.comments[0].text, "first!");
        assert_eq!(first.next_page_token.as_deref(), Some("NEXT"));

        let last = client.comment_threads("abc", Some("NEXT")).await.unwrap();
        assert!(last.comments.is_empty());
        assert_eq!(last.next_page_token, None);
    }
}
