//! Status, listing and removal commands

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::{GlobalStats, MetaDb, Video};
use crate::service::VideoService;
use serde::Serialize;
use tracing::info;

/// Status information
#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub config_path: String,
    pub db_path: String,
    pub upstream_url: String,
    pub api_key_configured: bool,
    pub cache_backend: String,
    pub chunk_size: usize,
    pub db_stats: GlobalStats,
}

pub async fn cmd_status(config: &Config, db: &MetaDb) -> Result<StatusInfo> {
    info!("Getting status");

    Ok(StatusInfo {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
        upstream_url: config.upstream.base_url.clone(),
        api_key_configured: config.api_key().is_some(),
        cache_backend: config.cache.backend.clone(),
        chunk_size: config.cache.chunk_size,
        db_stats: db.global_stats().await?,
    })
}

/// Stored video with its comment count
#[derive(Debug, Clone, Serialize)]
pub struct VideoInfo {
    #[serde(flatten)]
    pub video: Video,
    pub comment_count: u64,
}

pub async fn cmd_list_videos(db: &MetaDb) -> Result<Vec<VideoInfo>> {
    let videos = db.list_videos().await?;
    let mut result = Vec::with_capacity(videos.len());
    for video in videos {
        let comment_count = db.count_comments(&video.video_id).await?;
        result.push(VideoInfo {
            video,
            comment_count,
        });
    }
    Ok(result)
}

pub async fn cmd_remove_video(service: &VideoService, video_id: &str) -> Result<()> {
    if !service.remove_video(video_id).await? {
        return Err(Error::NotFound(format!("Video not stored: {}", video_id)));
    }
    info!("Removed video {}", video_id);
    Ok(())
}

pub fn print_status(status: &StatusInfo) {
    println!("\n📊 tubecache Status\n");
    println!("Configuration: {}", status.config_path);
    println!("Database: {}", status.db_path);
    println!("\nUpstream:");
    println!("  URL: {}", status.upstream_url);
    println!(
        "  API key: {}",
        if status.api_key_configured {
            "✓ Configured"
        } else {
            "✗ Missing"
        }
    );
    println!("\nCache:");
    println!("  Backend: {}", status.cache_backend);
    println!("  Chunk size: {}", status.chunk_size);
    println!("\nDatabase Stats:");
    println!("  Videos: {}", status.db_stats.video_count);
    println!("  Comments: {}", status.db_stats.comment_count);
}

pub fn print_videos(videos: &[VideoInfo]) {
    println!("\n🎬 Stored Videos\n");

    if videos.is_empty() {
        println!("No videos stored. Use 'tubecache video <ID>' to add one.");
        return;
    }

    for info in videos {
        println!("• {} [{}]", info.video.title, info.video.video_id);
        println!(
            "    {} views, {} likes, {} comments stored",
            info.video.view_count, info.video.like_count, info.comment_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VideoDetails;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_list_videos_includes_comment_counts() {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("status.db")).await.unwrap();
        db.upsert_video(&VideoDetails {
            video_id: "v1".to_string(),
            title: "First".to_string(),
            description: String::new(),
            view_count: 1,
            like_count: 0,
        })
        .await
        .unwrap();

        let videos = cmd_list_videos(&db).await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].comment_count, 0);

        let json = serde_json::to_value(&videos[0]).unwrap();
        assert_eq!(json["video_id"], "v1");
    }
}
