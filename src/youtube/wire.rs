//! Response shapes of the YouTube Data API v3 endpoints we call.
//!
//! Only the fields we read are modelled; everything defaults so a partially
//! populated item never fails the whole page.

use serde::Deserialize;

use crate::models::Channel;
use crate::normalize::{RawCount, RawTimestamp, RawVideoRecord, count_or_zero};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

impl<T> ListResponse<T> {
    /// Continuation token, treating an empty string as "no more pages".
    pub fn next_page(&self) -> Option<&str> {
        self.next_page_token
            .as_deref()
            .filter(|token| !token.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnails {
    #[serde(default)]
    pub default: Option<Thumbnail>,
}

impl Thumbnails {
    pub fn default_url(&self) -> &str {
        self.default
            .as_ref()
            .map(|thumbnail| thumbnail.url.as_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Thumbnail {
    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: ChannelSnippet,
    #[serde(default)]
    pub statistics: ChannelStatistics,
    #[serde(default)]
    pub content_details: ChannelContentDetails,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChannelSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelStatistics {
    #[serde(default)]
    pub subscriber_count: Option<RawCount>,
    #[serde(default)]
    pub view_count: Option<RawCount>,
    #[serde(default)]
    pub video_count: Option<RawCount>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelContentDetails {
    #[serde(default)]
    pub related_playlists: RelatedPlaylists,
}

#[derive(Debug, Default, Deserialize)]
pub struct RelatedPlaylists {
    #[serde(default)]
    pub uploads: Option<String>,
}

impl ChannelItem {
    pub fn uploads_playlist(&self) -> Option<&str> {
        self.content_details
            .related_playlists
            .uploads
            .as_deref()
            .filter(|id| !id.is_empty())
    }

    pub fn into_channel(self) -> Channel {
        Channel {
            subscriber_count: count_or_zero(self.statistics.subscriber_count.as_ref()),
            view_count: count_or_zero(self.statistics.view_count.as_ref()),
            video_count: count_or_zero(self.statistics.video_count.as_ref()),
            thumbnail: self.snippet.thumbnails.default_url().to_owned(),
            id: self.id,
            title: self.snippet.title,
            description: self.snippet.description,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub snippet: PlaylistItemSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaylistItemSnippet {
    #[serde(default)]
    pub resource_id: ResourceId,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
    #[serde(default)]
    pub video_id: Option<String>,
}

impl PlaylistItem {
    pub fn video_id(&self) -> Option<&str> {
        self.snippet
            .resource_id
            .video_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoItem {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub snippet: VideoSnippet,
    #[serde(default)]
    pub statistics: VideoStatistics,
    #[serde(default)]
    pub content_details: VideoContentDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub published_at: Option<RawTimestamp>,
    #[serde(default)]
    pub thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoStatistics {
    #[serde(default)]
    pub view_count: Option<RawCount>,
    #[serde(default)]
    pub like_count: Option<RawCount>,
    #[serde(default)]
    pub comment_count: Option<RawCount>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VideoContentDetails {
    #[serde(default)]
    pub duration: String,
}

impl RawVideoRecord for VideoItem {
    fn video_id(&self) -> &str {
        &self.id
    }

    fn title(&self) -> &str {
        &self.snippet.title
    }

    fn description(&self) -> &str {
        &self.snippet.description
    }

    fn view_count(&self) -> Option<&RawCount> {
        self.statistics.view_count.as_ref()
    }

    fn like_count(&self) -> Option<&RawCount> {
        self.statistics.like_count.as_ref()
    }

    fn comment_count(&self) -> Option<&RawCount> {
        self.statistics.comment_count.as_ref()
    }

    fn published_at(&self) -> Option<&RawTimestamp> {
        self.snippet.published_at.as_ref()
    }

    fn duration(&self) -> &str {
        &self.content_details.duration
    }

    fn thumbnail_url(&self) -> &str {
        self.snippet.thumbnails.default_url()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchItem {
    #[serde(default)]
    pub id: SearchId,
    #[serde(default)]
    pub snippet: SearchSnippet,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchId {
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchSnippet {
    #[serde(default)]
    pub title: String,
}
