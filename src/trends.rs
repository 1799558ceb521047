//! Time-series views over a channel's uploads.
//!
//! The engine takes the uploads in chronological order (oldest first) and is
//! parameterised by [`TrendsConfig`]:
//!
//! * `rolling_window` is the number of uploads averaged at each position.
//! * [`WindowDirection::Trailing`] averages `[max(0, i-W+1), i]`, the uploads
//!   up to and including `i`. [`WindowDirection::Leading`] averages
//!   `[i, min(n, i+W))`. Trailing is the default.
//! * [`BucketPolicy::Calendar`] groups uploads into ISO weeks (`2024-W07`)
//!   and calendar months (`2024-02`). [`BucketPolicy::Recent`] reports two
//!   fixed buckets, `week` and `month`, holding uploads from the last 7 and
//!   30 days. Upload frequency and engagement trends share the policy.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};

use crate::analytics::{TOP_VIDEO_COUNT, Totals, ratio, top_by_engagement};
use crate::models::{
    Channel, ChannelTrends, EngagementTrend, RollingAverage, UploadFrequency, Video,
    VideoPerformancePoint,
};

pub const DEFAULT_ROLLING_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WindowDirection {
    #[default]
    Trailing,
    Leading,
}

impl WindowDirection {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "trailing" | "backward" => Some(Self::Trailing),
            "leading" | "forward" => Some(Self::Leading),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BucketPolicy {
    #[default]
    Calendar,
    Recent,
}

impl BucketPolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "calendar" => Some(Self::Calendar),
            "recent" => Some(Self::Recent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrendsConfig {
    pub rolling_window: usize,
    pub direction: WindowDirection,
    pub buckets: BucketPolicy,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            rolling_window: DEFAULT_ROLLING_WINDOW,
            direction: WindowDirection::default(),
            buckets: BucketPolicy::default(),
        }
    }
}

/// Returns `None` for an empty upload list.
pub fn compute_trends(
    channel: &Channel,
    videos: &[Video],
    config: &TrendsConfig,
    now: DateTime<Utc>,
) -> Option<ChannelTrends> {
    if videos.is_empty() {
        return None;
    }

    let (weekly, monthly) = match config.buckets {
        BucketPolicy::Calendar => (
            calendar_buckets(videos, |at| {
                let week = at.iso_week();
                format!("{}-W{:02}", week.year(), week.week())
            }),
            calendar_buckets(videos, |at| at.format("%Y-%m").to_string()),
        ),
        BucketPolicy::Recent => (
            vec![recent_bucket(videos, "week", now - Duration::days(7))],
            vec![recent_bucket(videos, "month", now - Duration::days(30))],
        ),
    };

    Some(ChannelTrends {
        channel_id: channel.id.clone(),
        channel_title: channel.title.clone(),
        trending_videos: top_by_engagement(videos, TOP_VIDEO_COUNT),
        performance_over_time: videos.iter().map(performance_point).collect(),
        rolling_averages: rolling_averages(videos, config.rolling_window, config.direction),
        upload_frequency_weekly: weekly.iter().map(Bucket::frequency).collect(),
        upload_frequency_monthly: monthly.iter().map(Bucket::frequency).collect(),
        engagement_trends_weekly: weekly.iter().map(Bucket::engagement).collect(),
        engagement_trends_monthly: monthly.iter().map(Bucket::engagement).collect(),
        timestamp: now,
    })
}

fn performance_point(video: &Video) -> VideoPerformancePoint {
    VideoPerformancePoint {
        video_id: video.id.clone(),
        published_at: video.published_at,
        views: video.views,
        likes: video.likes,
        comments: video.comments,
        likes_to_views: ratio(video.likes, video.views),
        comments_to_views: ratio(video.comments, video.views),
    }
}

/// Mean views over the window at every upload position. A zero window is
/// treated as one.
pub fn rolling_averages(
    videos: &[Video],
    window: usize,
    direction: WindowDirection,
) -> Vec<RollingAverage> {
    let window = window.max(1);
    let mut prefix = Vec::with_capacity(videos.len() + 1);
    prefix.push(0u128);
    for video in videos {
        let last = prefix.last().copied().unwrap_or_default();
        prefix.push(last + u128::from(video.views));
    }

    (0..videos.len())
        .map(|index| {
            let (start, end) = match direction {
                WindowDirection::Trailing => ((index + 1).saturating_sub(window), index + 1),
                WindowDirection::Leading => (index, (index + window).min(videos.len())),
            };
            let sum = prefix[end] - prefix[start];
            RollingAverage {
                upload_index: index,
                average_views: sum as f64 / (end - start) as f64,
            }
        })
        .collect()
}

struct Bucket<'a> {
    period: String,
    videos: Vec<&'a Video>,
}

impl Bucket<'_> {
    fn frequency(&self) -> UploadFrequency {
        UploadFrequency {
            period: self.period.clone(),
            count: self.videos.len(),
        }
    }

    fn engagement(&self) -> EngagementTrend {
        let totals = Totals::of(self.videos.iter().copied());
        let count = self.videos.len() as u64;
        EngagementTrend {
            period: self.period.clone(),
            average_views: ratio(totals.views, count),
            average_likes: ratio(totals.likes, count),
            average_comments: ratio(totals.comments, count),
        }
    }
}

fn calendar_buckets<'a>(
    videos: &'a [Video],
    period_of: impl Fn(&DateTime<Utc>) -> String,
) -> Vec<Bucket<'a>> {
    let mut grouped: BTreeMap<String, Vec<&'a Video>> = BTreeMap::new();
    for video in videos {
        grouped
            .entry(period_of(&video.published_at))
            .or_default()
            .push(video);
    }
    grouped
        .into_iter()
        .map(|(period, videos)| Bucket { period, videos })
        .collect()
}

fn recent_bucket<'a>(videos: &'a [Video], period: &str, since: DateTime<Utc>) -> Bucket<'a> {
    Bucket {
        period: period.to_owned(),
        videos: videos
            .iter()
            .filter(|video| video.published_at > since)
            .collect(),
    }
}
