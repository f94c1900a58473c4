//! Comment listing commands

use crate::error::Result;
use crate::meta::Comment;
use crate::models::RawComment;
use crate::pagination::{PageMeta, Paginated};
use crate::service::VideoService;
use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct CommentsOptions {
    pub page_token: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

/// Serve a page of comments, starting ingestion if the video has none yet
pub async fn cmd_comments(
    service: &VideoService,
    video_id: &str,
    options: CommentsOptions,
) -> Result<Paginated<RawComment>> {
    info!("Fetching comments for {}", video_id);
    service
        .fetch_video_comments(
            video_id,
            options.page_token.as_deref(),
            options.per_page,
            options.page,
        )
        .await
}

/// Page through stored comments only
pub async fn cmd_stored_comments(
    service: &VideoService,
    video_id: &str,
    per_page: Option<u32>,
    page: Option<u32>,
) -> Result<Paginated<Comment>> {
    service.list_stored_comments(video_id, per_page, page).await
}

fn print_meta(meta: &PageMeta) {
    println!(
        "\nPage {} of {} ({} per page, {} total)",
        meta.page, meta.total_pages, meta.per_page, meta.total
    );
}

pub fn print_comment_page(video_id: &str, page: &Paginated<RawComment>) {
    println!("\n💬 Comments for {}\n", video_id);
    if page.data.is_empty() {
        println!("No cached comments for this page yet.");
    }
    for comment in &page.data {
        println!("• [{}] {}", comment.comment_id, comment.text);
    }
    print_meta(&page.meta);
}

pub fn print_stored_page(video_id: &str, page: &Paginated<Comment>) {
    println!("\n🗄  Stored comments for {}\n", video_id);
    if page.data.is_empty() {
        println!("No stored comments on this page.");
    }
    for comment in &page.data {
        println!("• [{}] {}", comment.comment_id, comment.text);
        println!("    stored {}", comment.created_at);
    }
    print_meta(&page.meta);
}
