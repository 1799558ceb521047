//! Channel-level aggregates over a fetched video set.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};

use crate::error::{InsightsError, InsightsResult};
use crate::models::{Channel, ChannelAnalytics, TimeRange, Video};

pub const VIEW_WEIGHT: f64 = 1.0;
pub const LIKE_WEIGHT: f64 = 2.0;
pub const COMMENT_WEIGHT: f64 = 3.0;

/// Size of the "most engaging" selection in both analytics and trends.
pub const TOP_VIDEO_COUNT: usize = 5;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn engagement_score(video: &Video) -> f64 {
    VIEW_WEIGHT * video.views as f64
        + LIKE_WEIGHT * video.likes as f64
        + COMMENT_WEIGHT * video.comments as f64
}

/// `numerator / denominator`, or 0 when the denominator is 0.
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Highest-scoring videos first. Equal scores keep their input order.
pub fn top_by_engagement(videos: &[Video], count: usize) -> Vec<Video> {
    let mut scored: Vec<(f64, &Video)> = videos
        .iter()
        .map(|video| (engagement_score(video), video))
        .collect();
    scored.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    scored
        .into_iter()
        .take(count)
        .map(|(_, video)| video.clone())
        .collect()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Totals {
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
}

impl Totals {
    pub(crate) fn of<'a>(videos: impl IntoIterator<Item = &'a Video>) -> Self {
        videos.into_iter().fold(Self::default(), |acc, video| Self {
            views: acc.views.saturating_add(video.views),
            likes: acc.likes.saturating_add(video.likes),
            comments: acc.comments.saturating_add(video.comments),
        })
    }
}

pub fn compute_analytics(
    channel: &Channel,
    videos: &[Video],
    now: DateTime<Utc>,
) -> InsightsResult<ChannelAnalytics> {
    let (Some(earliest), Some(latest)) = (
        videos.iter().map(|video| video.published_at).min(),
        videos.iter().map(|video| video.published_at).max(),
    ) else {
        return Err(InsightsError::NoData);
    };

    let totals = Totals::of(videos);
    Ok(ChannelAnalytics {
        channel_id: channel.id.clone(),
        channel_title: channel.title.clone(),
        subscriber_count: channel.subscriber_count,
        view_count: channel.view_count,
        video_count: channel.video_count,
        total_videos: videos.len(),
        average_views: totals.views as f64 / videos.len() as f64,
        like_to_view_ratio: ratio(totals.likes, totals.views),
        comment_to_view_ratio: ratio(totals.comments, totals.views),
        top_engaging_videos: top_by_engagement(videos, TOP_VIDEO_COUNT),
        time_range: TimeRange {
            start_date: earliest.format(DATE_FORMAT).to_string(),
            end_date: latest.format(DATE_FORMAT).to_string(),
        },
        timestamp: now,
    })
}
