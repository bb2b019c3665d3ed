//! Signal extraction over a fetched video.

use ytintel_core::{RawVideoData, SignalSet, VideoStatistics};

use crate::category::categorize;
use crate::keywords::top_keywords;
use crate::lexicon::score_text;

/// Default number of keywords kept per report.
pub const DEFAULT_TOP_K: usize = 10;

/// Derives a [`SignalSet`] from [`RawVideoData`]. Pure and infallible.
#[derive(Debug, Clone, Copy)]
pub struct SignalExtractor {
    top_k: usize,
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_TOP_K)
    }
}

impl SignalExtractor {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Compute sentiment, subjectivity, keywords, engagement, and category.
    ///
    /// Sentiment and subjectivity are the means of the per-text scores over
    /// every non-blank comment and transcript segment. Keywords come from the
    /// title, description, and comments. Missing text yields the neutral
    /// defaults from [`SignalSet::neutral`].
    #[must_use]
    pub fn extract(&self, data: &RawVideoData) -> SignalSet {
        let (sentiment_score, subjectivity_score) = mean_sentiment(data);

        let keyword_sources = std::iter::once(data.title.as_str())
            .chain(std::iter::once(data.description.as_str()))
            .chain(data.comments.iter().map(|c| c.text.as_str()));
        let top_keywords = top_keywords(keyword_sources, self.top_k);

        SignalSet {
            sentiment_score,
            subjectivity_score,
            top_keywords,
            engagement_rate: engagement_rate(&data.statistics),
            category: categorize(&data.title, &data.description),
        }
    }
}

fn mean_sentiment(data: &RawVideoData) -> (f64, f64) {
    let transcript = data.transcript.as_deref().unwrap_or_default();
    let texts = data
        .comments
        .iter()
        .map(|c| c.text.as_str())
        .chain(transcript.iter().map(String::as_str))
        .filter(|t| !t.trim().is_empty());

    let mut polarity_sum = 0.0_f64;
    let mut subjectivity_sum = 0.0_f64;
    let mut count = 0usize;
    for text in texts {
        let score = score_text(text);
        polarity_sum += score.polarity;
        subjectivity_sum += score.subjectivity;
        count += 1;
    }

    if count == 0 {
        return (0.0, 0.0);
    }

    #[allow(clippy::cast_precision_loss)]
    let denom = count as f64;
    (
        finite_or_zero(polarity_sum / denom).clamp(-1.0, 1.0),
        finite_or_zero(subjectivity_sum / denom).clamp(0.0, 1.0),
    )
}

/// `(likes + comment_count) / max(views, 1)`.
#[must_use]
pub fn engagement_rate(stats: &VideoStatistics) -> f64 {
    let interactions = stats.like_count.saturating_add(stats.comment_count);
    #[allow(clippy::cast_precision_loss)]
    let rate = interactions as f64 / stats.view_count.max(1) as f64;
    finite_or_zero(rate)
}

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}
