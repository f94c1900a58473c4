//! Default values for configuration

/// Default upstream API base URL (YouTube Data API v3)
pub fn default_upstream_base_url() -> String {
    std::env::var("TUBECACHE_UPSTREAM_URL")
        .unwrap_or_else(|_| "https://www.googleapis.com/youtube/v3/".to_string())
}

/// Default environment variable holding the API key
pub fn default_api_key_env() -> String {
    "YOUTUBE_API_KEY".to_string()
}

/// Retries allowed on HTTP 429 before giving up
pub fn default_max_retries() -> u32 {
    5
}

/// Base delay for exponential backoff (milliseconds)
pub fn default_backoff_base_ms() -> u64 {
    1000
}

/// Client-side request quota
pub fn default_requests_per_second() -> u32 {
    10
}

/// Request timeout in seconds
pub fn default_timeout_secs() -> u64 {
    30
}

pub fn default_user_agent() -> String {
    format!("tubecache/{}", env!("CARGO_PKG_VERSION"))
}

/// Comment threads requested per upstream page (upstream maximum is 100)
pub fn default_comments_page_size() -> u32 {
    100
}

/// Default cache backend; sqlite keeps chain state across CLI invocations
pub fn default_cache_backend() -> String {
    "sqlite".to_string()
}

/// Comments per cache chunk
pub fn default_chunk_size() -> usize {
    100
}

pub fn default_per_page() -> u32 {
    10
}

pub fn default_max_per_page() -> u32 {
    100
}
