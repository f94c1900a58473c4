//! Ingestion state and resume commands

use crate::error::Result;
use crate::ingest::ResumeOutcome;
use crate::models::IngestionState;
use crate::service::VideoService;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StateInfo {
    pub video_id: String,
    pub state: IngestionState,
    pub stored_comments: u64,
}

pub async fn cmd_state(service: &VideoService, video_id: &str) -> Result<StateInfo> {
    Ok(StateInfo {
        video_id: video_id.to_string(),
        state: service.ingestion_state(video_id).await?,
        stored_comments: service.stored_comment_count(video_id).await?,
    })
}

pub async fn cmd_resume(service: &VideoService, video_id: &str) -> Result<ResumeOutcome> {
    service.resume(video_id).await
}

pub fn print_state(info: &StateInfo) {
    let label = match info.state {
        IngestionState::NotStarted => "not started",
        IngestionState::InProgress => "⏳ in progress",
        IngestionState::Complete => "✓ complete",
    };
    println!("{}: {} ({} comments stored)", info.video_id, label, info.stored_comments);
}

pub fn print_resume(video_id: &str, outcome: &ResumeOutcome) {
    match outcome {
        ResumeOutcome::AlreadyComplete => println!("✓ Ingestion for {} is already complete", video_id),
        ResumeOutcome::AlreadyRunning => println!("Ingestion for {} is already running", video_id),
        ResumeOutcome::MarkedComplete => {
            println!("✓ No pages left upstream; {} marked complete", video_id)
        }
        ResumeOutcome::Started(step) | ResumeOutcome::Resumed(step) => {
            println!(
                "Fetched {} comments for {} ({} new)",
                step.fetched, video_id, step.inserted
            );
            if step.next_page_token.is_some() {
                println!("  More pages pending");
            }
        }
    }
}
