//! Turns provider video records into canonical [`Video`]s.
//!
//! The provider reports the same logical field in different shapes depending
//! on the call path: counts arrive as decimal strings or as JSON numbers, and
//! publish times as RFC 3339 strings or as Unix seconds. Nothing here fails:
//! unparseable counts become 0 and unparseable timestamps become
//! [`ZERO_TIMESTAMP`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::models::Video;

/// Publish time used when the provider value is missing or unparseable.
pub const ZERO_TIMESTAMP: DateTime<Utc> = DateTime::<Utc>::UNIX_EPOCH;

/// Count field as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawCount {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Text(String),
}

impl RawCount {
    pub fn to_count(&self) -> u64 {
        match self {
            Self::Unsigned(value) => *value,
            Self::Signed(value) => u64::try_from(*value).unwrap_or(0),
            Self::Float(value) => float_to_count(*value),
            Self::Text(value) => parse_count_text(value),
        }
    }
}

fn parse_count_text(value: &str) -> u64 {
    let trimmed = value.trim();
    if let Ok(parsed) = trimmed.parse::<u64>() {
        return parsed;
    }
    trimmed.parse::<f64>().map(float_to_count).unwrap_or(0)
}

fn float_to_count(value: f64) -> u64 {
    if value.is_finite() && value >= 0.0 {
        value as u64
    } else {
        0
    }
}

/// Absent counts are zero.
pub fn count_or_zero(raw: Option<&RawCount>) -> u64 {
    raw.map(RawCount::to_count).unwrap_or(0)
}

/// Publish time as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    Text(String),
    UnixSeconds(i64),
}

impl RawTimestamp {
    pub fn to_timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Text(value) => DateTime::parse_from_rfc3339(value.trim())
                .map(|parsed| parsed.with_timezone(&Utc))
                .unwrap_or(ZERO_TIMESTAMP),
            Self::UnixSeconds(seconds) => {
                DateTime::from_timestamp(*seconds, 0).unwrap_or(ZERO_TIMESTAMP)
            }
        }
    }
}

pub fn timestamp_or_zero(raw: Option<&RawTimestamp>) -> DateTime<Utc> {
    raw.map(RawTimestamp::to_timestamp).unwrap_or(ZERO_TIMESTAMP)
}

/// Read access to one provider video record, whatever its concrete shape.
pub trait RawVideoRecord {
    fn video_id(&self) -> &str;
    fn title(&self) -> &str;
    fn description(&self) -> &str;
    fn view_count(&self) -> Option<&RawCount>;
    fn like_count(&self) -> Option<&RawCount>;
    fn comment_count(&self) -> Option<&RawCount>;
    fn published_at(&self) -> Option<&RawTimestamp>;
    fn duration(&self) -> &str;
    fn thumbnail_url(&self) -> &str;
}

pub fn normalize_video(raw: &impl RawVideoRecord) -> Video {
    Video {
        id: raw.video_id().to_owned(),
        title: raw.title().to_owned(),
        description: raw.description().to_owned(),
        views: count_or_zero(raw.view_count()),
        likes: count_or_zero(raw.like_count()),
        comments: count_or_zero(raw.comment_count()),
        published_at: timestamp_or_zero(raw.published_at()),
        duration: raw.duration().to_owned(),
        thumbnail: raw.thumbnail_url().to_owned(),
    }
}
