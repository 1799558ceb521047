//! Canonical in-memory records and the derived analytics payloads.
//!
//! Every struct here is serialized verbatim into HTTP responses and into the
//! snapshot table, so the camelCase field names are part of the wire format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on videos returned by the videos endpoint when the caller does
/// not ask for a specific amount.
pub const DEFAULT_MAX_VIDEOS: usize = 50;

/// A single uploaded video after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    #[serde(alias = "uploadDate")]
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub duration: String,
    #[serde(default, rename = "thumbnailUrl")]
    pub thumbnail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    #[serde(default, rename = "thumbnailUrl")]
    pub thumbnail: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Views,
    Likes,
    #[default]
    Recency,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "views" => Some(Self::Views),
            "likes" => Some(Self::Likes),
            "recency" => Some(Self::Recency),
            _ => None,
        }
    }
}

/// Post-fetch selection applied to a channel's uploads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoFilter {
    pub sort_by: SortBy,
    pub max_videos: usize,
    pub min_views: u64,
    pub min_likes: u64,
}

impl Default for VideoFilter {
    fn default() -> Self {
        Self {
            sort_by: SortBy::Recency,
            max_videos: DEFAULT_MAX_VIDEOS,
            min_views: 0,
            min_likes: 0,
        }
    }
}

impl VideoFilter {
    /// Filter used by the analytics and trends paths: every upload, newest
    /// first. A channel reporting zero videos is fetched without a bound.
    pub fn whole_channel(reported_video_count: u64) -> Self {
        let max_videos = match usize::try_from(reported_video_count) {
            Ok(0) | Err(_) => usize::MAX,
            Ok(count) => count,
        };
        Self {
            max_videos,
            ..Self::default()
        }
    }

    /// Builds a filter from raw query parameters. Malformed values are
    /// replaced by their defaults instead of failing the request.
    pub fn from_query(query: &VideoQuery) -> Self {
        let mut filter = Self::default();

        if let Some(raw) = query.sort_by.as_deref().filter(|raw| !raw.trim().is_empty()) {
            match SortBy::parse(raw) {
                Some(sort_by) => filter.sort_by = sort_by,
                None => log::warn!("ignoring unknown sortBy value {raw:?}"),
            }
        }

        if let Some(raw) = query.max_videos.as_deref() {
            match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => filter.max_videos = value,
                _ => log::warn!("ignoring invalid maxVideos value {raw:?}"),
            }
        }

        if let Some(value) = parse_threshold("minViews", query.min_views.as_deref()) {
            filter.min_views = value;
        }
        if let Some(value) = parse_threshold("minLikes", query.min_likes.as_deref()) {
            filter.min_likes = value;
        }

        filter
    }

    /// `views >= min_views AND likes >= min_likes`.
    pub fn retains(&self, video: &Video) -> bool {
        video.views >= self.min_views && video.likes >= self.min_likes
    }

    /// Stable sort by the configured key (descending) followed by truncation.
    pub fn sort_and_truncate(&self, videos: &mut Vec<Video>) {
        match self.sort_by {
            SortBy::Views => videos.sort_by(|a, b| b.views.cmp(&a.views)),
            SortBy::Likes => videos.sort_by(|a, b| b.likes.cmp(&a.likes)),
            SortBy::Recency => videos.sort_by(|a, b| b.published_at.cmp(&a.published_at)),
        }
        videos.truncate(self.max_videos);
    }
}

fn parse_threshold(name: &str, raw: Option<&str>) -> Option<u64> {
    let raw = raw?;
    match raw.trim().parse::<u64>() {
        Ok(value) => Some(value),
        Err(_) => {
            log::warn!("ignoring invalid {name} value {raw:?}");
            None
        }
    }
}

/// Raw `?sortBy=&maxVideos=&minViews=&minLikes=` parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoQuery {
    pub sort_by: Option<String>,
    pub max_videos: Option<String>,
    pub min_views: Option<String>,
    pub min_likes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelAnalytics {
    pub channel_id: String,
    pub channel_title: String,
    pub subscriber_count: u64,
    pub view_count: u64,
    pub video_count: u64,
    pub total_videos: usize,
    pub average_views: f64,
    pub like_to_view_ratio: f64,
    pub comment_to_view_ratio: f64,
    pub top_engaging_videos: Vec<Video>,
    pub time_range: TimeRange,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoPerformancePoint {
    pub video_id: String,
    pub published_at: DateTime<Utc>,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub likes_to_views: f64,
    pub comments_to_views: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RollingAverage {
    pub upload_index: usize,
    pub average_views: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFrequency {
    pub period: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementTrend {
    pub period: String,
    pub average_views: f64,
    pub average_likes: f64,
    pub average_comments: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelTrends {
    pub channel_id: String,
    pub channel_title: String,
    pub trending_videos: Vec<Video>,
    pub performance_over_time: Vec<VideoPerformancePoint>,
    pub rolling_averages: Vec<RollingAverage>,
    pub upload_frequency_weekly: Vec<UploadFrequency>,
    pub upload_frequency_monthly: Vec<UploadFrequency>,
    pub engagement_trends_weekly: Vec<EngagementTrend>,
    pub engagement_trends_monthly: Vec<EngagementTrend>,
    pub timestamp: DateTime<Utc>,
}

/// Which derived payload a snapshot row holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngagementKind {
    Analytics,
    Trends,
}

impl EngagementKind {
    pub const ALL: [EngagementKind; 2] = [EngagementKind::Analytics, EngagementKind::Trends];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Analytics => "analytics",
            Self::Trends => "trends",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "analytics" => Some(Self::Analytics),
            "trends" => Some(Self::Trends),
            _ => None,
        }
    }
}

impl fmt::Display for EngagementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
