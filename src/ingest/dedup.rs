//! Dedup & persist for fetched comments

use crate::error::Result;
use crate::meta::MetaDb;
use crate::models::RawComment;
use std::collections::HashSet;
use tracing::debug;

/// Store the comments whose ids are not yet persisted for the video.
///
/// One batched lookup, one batched insert. Ids repeated within the batch are
/// kept once. Returns the comments that were written.
pub async fn persist_new_comments(
    db: &MetaDb,
    video_id: &str,
    comments: &[RawComment],
) -> Result<Vec<RawComment>> {
    let ids: Vec<String> = comments.iter().map(|c| c.comment_id.clone()).collect();
    let existing = db.existing_comment_ids(video_id, &ids).await?;

    let mut seen: HashSet<&str> = HashSet::with_capacity(comments.len());
    let new_comments: Vec<RawComment> = comments
        .iter()
        .filter(|c| !existing.contains(&c.comment_id) && seen.insert(c.comment_id.as_str()))
        .cloned()
        .collect();

    if !new_comments.is_empty() {
        db.insert_comments(&new_comments).await?;
    }

    debug!(
        "Persisted {} of {} fetched comments for {}",
        new_comments.len(),
        comments.len(),
        video_id
    );
    Ok(new_comments)
}
