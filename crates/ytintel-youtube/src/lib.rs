//! `YouTube` Data API v3 client implementing the pipeline's video source.
//!
//! Fetches video metadata and statistics, top-level comment threads, and
//! (for full-depth requests) the English timed-text transcript. Maps
//! platform failures onto the pipeline's [`ytintel_core::FetchError`]
//! taxonomy so the orchestrator can tell transient outages from permanent
//! failures.

pub mod client;
pub mod error;
pub mod transcript;
pub mod types;

pub use client::{YoutubeClient, MAX_COMMENT_PAGES};
pub use error::YoutubeError;
