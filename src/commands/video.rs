//! Video details command

use crate::error::Result;
use crate::models::VideoDetails;
use crate::service::VideoService;

pub async fn cmd_video(service: &VideoService, video_id: &str) -> Result<VideoDetails> {
    service.fetch_video_details(video_id).await
}

pub fn print_video(video: &VideoDetails) {
    println!("\n🎬 {}\n", video.title);
    println!("ID: {}", video.video_id);
    println!("Views: {}", video.view_count);
    println!("Likes: {}", video.like_count);
    if !video.description.is_empty() {
        println!("\n{}", video.description);
    }
}
