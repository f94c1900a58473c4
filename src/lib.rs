//! tubecache: ingest and cache video metadata and comment threads from an
//! upstream video API.
//!
//! Video details are read cache-aside. Comments are walked page by page through
//! an event-driven chain, deduplicated into SQLite and mirrored into
//! fixed-size cache chunks that serve paginated reads.

pub mod app;
pub mod cache;
pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod ingest;
pub mod meta;
pub mod models;
pub mod pagination;
pub mod progress;
pub mod service;
pub mod upstream;
