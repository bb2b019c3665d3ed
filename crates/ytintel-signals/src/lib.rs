//! Deterministic, offline signal extraction for fetched video data.
//!
//! Scores comment and transcript sentiment with a general-purpose lexicon,
//! ranks keywords from title, description, and comments, computes the
//! engagement ratio, and buckets videos into coarse categories. The
//! [`market`] module aggregates the same signals over search samples.
//! Nothing here touches the network, and nothing here fails: empty or
//! malformed input collapses to neutral signals.

pub mod category;
pub mod extractor;
pub mod keywords;
pub mod lexicon;
pub mod market;

pub use category::categorize;
pub use extractor::{engagement_rate, SignalExtractor};
pub use keywords::top_keywords;
pub use lexicon::{score_text, TextScore};
pub use market::analyze_market;

/// Version tag of the derivation algorithm in this crate.
///
/// Bump whenever scoring, tokenization, or ranking changes so cached reports
/// computed by the old algorithm are no longer addressed.
pub const PIPELINE_VERSION: u32 = 2;
