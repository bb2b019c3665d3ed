//! Aggregate statistics over a sample of search hits for one topic.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, TimeDelta, Utc};
use ytintel_core::{
    ChannelPerformance, CompetitionLevel, MarketAnalysis, TopVideo, VideoCategory, VideoSummary,
};

use crate::category::categorize;
use crate::extractor::engagement_rate;
use crate::lexicon::score_text;

const TOP_N: usize = 5;
const HIGH_ENGAGEMENT: f64 = 0.05;
const RECENT_WINDOW_DAYS: i64 = 7;
const RECENT_SHARE: f64 = 0.3;

/// More distinct creators than this is `High` competition.
const HIGH_COMPETITION_CREATORS: usize = 30;
/// More distinct creators than this is `Medium` competition.
const MEDIUM_COMPETITION_CREATORS: usize = 15;

#[must_use]
pub fn competition_level(unique_creators: usize) -> CompetitionLevel {
    if unique_creators > HIGH_COMPETITION_CREATORS {
        CompetitionLevel::High
    } else if unique_creators > MEDIUM_COMPETITION_CREATORS {
        CompetitionLevel::Medium
    } else {
        CompetitionLevel::Low
    }
}

/// Summarise `videos` as a market for `topic`.
///
/// `now` anchors the recent-activity insight. An empty sample yields zeros
/// and no insights.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn analyze_market(topic: &str, videos: &[VideoSummary], now: DateTime<Utc>) -> MarketAnalysis {
    let n = videos.len();
    let total_views = videos
        .iter()
        .fold(0u64, |acc, v| acc.saturating_add(v.statistics.view_count));
    let average_views = total_views.checked_div(n as u64).unwrap_or(0);

    let rates: Vec<f64> = videos.iter().map(|v| engagement_rate(&v.statistics)).collect();
    let average_engagement = mean(&rates);
    let market_sentiment = mean(
        &videos
            .iter()
            .map(|v| score_text(&v.title).polarity)
            .collect::<Vec<_>>(),
    )
    .clamp(-1.0, 1.0);

    let top_channels = rank_channels(videos);
    let unique_creators = channel_count(videos);
    let competition = competition_level(unique_creators);

    let mut by_views: Vec<&VideoSummary> = videos.iter().collect();
    by_views.sort_by(|a, b| b.statistics.view_count.cmp(&a.statistics.view_count));
    let top_videos = by_views
        .into_iter()
        .take(TOP_N)
        .map(|v| TopVideo {
            video_id: v.video_id.clone(),
            title: v.title.clone(),
            channel: v.channel_title.clone(),
            views: v.statistics.view_count,
        })
        .collect();

    let mut insights = Vec::new();
    if n > 0 {
        let views: Vec<f64> = videos
            .iter()
            .map(|v| v.statistics.view_count as f64)
            .collect();
        if std_dev(&views) > mean(&views) {
            insights.push(
                "High variance in video performance: room for breakout content".to_owned(),
            );
        }

        let engaged = rates.iter().filter(|r| **r > HIGH_ENGAGEMENT).count();
        if engaged > 0 {
            insights.push(format!(
                "{engaged} of {n} videos exceed {:.0}% engagement",
                HIGH_ENGAGEMENT * 100.0
            ));
        }

        match competition {
            CompetitionLevel::Low => {
                insights.push("Low competition: room to establish authority".to_owned());
            }
            CompetitionLevel::High => insights
                .push("High competition: focus on an underserved angle".to_owned()),
            CompetitionLevel::Medium => {}
        }

        let cutoff = now - TimeDelta::days(RECENT_WINDOW_DAYS);
        let recent = videos
            .iter()
            .filter(|v| v.published_at.is_some_and(|at| at > cutoff))
            .count();
        if recent as f64 > n as f64 * RECENT_SHARE {
            insights.push("High recent activity: the topic is trending now".to_owned());
        }
    }

    MarketAnalysis {
        topic: topic.to_owned(),
        videos_analyzed: n,
        total_views,
        average_views,
        average_engagement,
        unique_creators,
        competition_level: competition,
        market_sentiment,
        dominant_category: dominant_category(videos),
        top_videos,
        top_channels,
        insights,
    }
}

fn channel_count(videos: &[VideoSummary]) -> usize {
    let mut seen: Vec<&str> = videos.iter().map(|v| v.channel_title.as_str()).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Channels by total views, heaviest first; ties keep first appearance.
#[allow(clippy::cast_precision_loss)]
fn rank_channels(videos: &[VideoSummary]) -> Vec<ChannelPerformance> {
    // channel -> (first index, total views, video count, engagement sum)
    let mut stats: HashMap<&str, (usize, u64, usize, f64)> = HashMap::new();
    for (i, video) in videos.iter().enumerate() {
        let entry = stats
            .entry(video.channel_title.as_str())
            .or_insert((i, 0, 0, 0.0));
        entry.1 = entry.1.saturating_add(video.statistics.view_count);
        entry.2 += 1;
        entry.3 += engagement_rate(&video.statistics);
    }

    let mut ranked: Vec<_> = stats.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .1.cmp(&a.1 .1).then(a.1 .0.cmp(&b.1 .0)));
    ranked
        .into_iter()
        .take(TOP_N)
        .map(|(channel, (_, total, count, engagement))| ChannelPerformance {
            channel: channel.to_owned(),
            total_views: total,
            average_views: total / count as u64,
            video_count: count,
            average_engagement: engagement / count as f64,
        })
        .collect()
}

/// Most common category other than `Other`; ties go to the earlier variant.
fn dominant_category(videos: &[VideoSummary]) -> VideoCategory {
    let mut counts: BTreeMap<VideoCategory, usize> = BTreeMap::new();
    for video in videos {
        let category = categorize(&video.title, &video.description);
        if category != VideoCategory::Other {
            *counts.entry(category).or_default() += 1;
        }
    }
    counts
        .into_iter()
        .fold(None, |best: Option<(VideoCategory, usize)>, (cat, count)| match best {
            Some((_, top)) if top >= count => best,
            _ => Some((cat, count)),
        })
        .map_or(VideoCategory::Other, |(cat, _)| cat)
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = values.iter().sum::<f64>() / values.len() as f64;
    if m.is_finite() {
        m
    } else {
        0.0
    }
}

/// Population standard deviation.
#[allow(clippy::cast_precision_loss)]
fn std_dev(values: &[f64]) -> f64 {
    let m = mean(values);
    let variance = mean(&values.iter().map(|v| (v - m).powi(2)).collect::<Vec<_>>());
    variance.sqrt()
}
