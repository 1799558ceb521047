//! In-memory provider used by unit tests across the crate.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Value, json};

use super::MAX_PAGE_SIZE;
use super::transport::Transport;
use crate::error::{InsightsError, InsightsResult};
use crate::models::Video;

pub(crate) type Query = HashMap<String, String>;
type Handler = Box<dyn Fn(&str, &Query) -> InsightsResult<String> + Send + Sync>;

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub endpoint: String,
    pub query: Query,
}

pub(crate) struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&str, &Query) -> InsightsResult<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Every request fails with the given upstream status.
    pub fn failing(status: u16) -> Self {
        Self::new(move |_, _| {
            Err(InsightsError::fetch(
                Some(status),
                format!("YouTube API returned status code: {status}"),
            ))
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.endpoint == endpoint)
            .count()
    }
}

impl Transport for FakeTransport {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> InsightsResult<String> {
        let query: Query = query
            .iter()
            .map(|(name, value)| ((*name).to_owned(), (*value).to_owned()))
            .collect();
        self.calls.lock().push(RecordedCall {
            endpoint: endpoint.to_owned(),
            query: query.clone(),
        });
        (self.handler)(endpoint, &query)
    }
}

pub(crate) fn video(
    id: &str,
    views: u64,
    likes: u64,
    comments: u64,
    published_at: DateTime<Utc>,
) -> Video {
    Video {
        id: id.to_owned(),
        title: format!("Video {id}"),
        description: format!("Description of {id}"),
        views,
        likes,
        comments,
        published_at,
        duration: "PT5M".to_owned(),
        thumbnail: format!("https://i.ytimg.com/vi/{id}/default.jpg"),
    }
}

/// A single channel with its uploads, served the way the Data API would.
#[derive(Debug, Clone)]
pub(crate) struct FakeChannel {
    pub id: String,
    pub title: String,
    pub handle: Option<String>,
    pub username: Option<String>,
    pub subscribers: u64,
    pub reported_video_count: Option<u64>,
    pub videos: Vec<Video>,
}

impl FakeChannel {
    pub fn new(id: &str, title: &str) -> Self {
        Self {
            id: id.to_owned(),
            title: title.to_owned(),
            handle: None,
            username: None,
            subscribers: 1_000,
            reported_video_count: None,
            videos: Vec::new(),
        }
    }

    pub fn with_handle(mut self, handle: &str) -> Self {
        self.handle = Some(handle.to_owned());
        self
    }

    pub fn with_username(mut self, username: &str) -> Self {
        self.username = Some(username.to_owned());
        self
    }

    /// Overrides the `videoCount` statistic, which otherwise matches the
    /// number of uploads.
    pub fn with_reported_video_count(mut self, count: u64) -> Self {
        self.reported_video_count = Some(count);
        self
    }

    pub fn with_videos(mut self, videos: Vec<Video>) -> Self {
        self.videos = videos;
        self
    }

    /// Serves the channel through `channels`, `playlistItems` and `videos`.
    /// `forHandle` lookups miss so that handle resolution goes through
    /// `search` unless `handle_lookup` is set.
    pub fn into_transport(self, handle_lookup: bool) -> FakeTransport {
        FakeTransport::new(move |endpoint, query| self.respond(endpoint, query, handle_lookup))
    }

    fn uploads_playlist(&self) -> String {
        format!("UU{}", self.id.trim_start_matches("UC"))
    }

    fn respond(&self, endpoint: &str, query: &Query, handle_lookup: bool) -> InsightsResult<String> {
        let body = match endpoint {
            "channels" => {
                let lookup = |key: &str, expected: Option<&String>| {
                    expected.is_some() && query.get(key) == expected
                };
                let matches = lookup("id", Some(&self.id))
                    || (handle_lookup && lookup("forHandle", self.handle.as_ref()))
                    || lookup("forUsername", self.username.as_ref());
                let items = if matches { vec![self.channel_json()] } else { Vec::new() };
                json!({ "items": items })
            }
            "playlistItems" => {
                if query.get("playlistId") != Some(&self.uploads_playlist()) {
                    return Err(InsightsError::fetch(
                        Some(404),
                        "YouTube API returned status code: 404",
                    ));
                }
                let page_size = query
                    .get("maxResults")
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .unwrap_or(5)
                    .min(MAX_PAGE_SIZE);
                let offset = query
                    .get("pageToken")
                    .and_then(|raw| raw.parse::<usize>().ok())
                    .unwrap_or(0);
                let end = (offset + page_size).min(self.videos.len());
                let items: Vec<Value> = self.videos[offset.min(end)..end]
                    .iter()
                    .map(|video| json!({ "snippet": { "resourceId": { "videoId": video.id } } }))
                    .collect();
                if end < self.videos.len() {
                    json!({ "items": items, "nextPageToken": end.to_string() })
                } else {
                    json!({ "items": items })
                }
            }
            "videos" => {
                let ids: Vec<&str> = query
                    .get("id")
                    .map(|raw| raw.split(',').collect())
                    .unwrap_or_default();
                assert!(ids.len() <= MAX_PAGE_SIZE, "batch of {} ids", ids.len());
                let items: Vec<Value> = ids
                    .iter()
                    .filter_map(|id| self.videos.iter().find(|video| video.id == *id))
                    .map(video_json)
                    .collect();
                json!({ "items": items })
            }
            "search" => {
                let wanted = query.get("q").map(|q| q.to_lowercase()).unwrap_or_default();
                let by_handle = self
                    .handle
                    .as_ref()
                    .is_some_and(|handle| wanted == format!("@{}", handle.to_lowercase()));
                let items = if by_handle || wanted == self.title.to_lowercase() {
                    vec![json!({
                        "id": { "kind": "youtube#channel", "channelId": self.id },
                        "snippet": { "title": self.title },
                    })]
                } else {
                    Vec::new()
                };
                json!({ "items": items })
            }
            other => {
                return Err(InsightsError::fetch(
                    Some(404),
                    format!("unexpected endpoint {other}"),
                ));
            }
        };
        Ok(body.to_string())
    }

    fn channel_json(&self) -> Value {
        let total_views: u64 = self.videos.iter().map(|video| video.views).sum();
        let video_count = self
            .reported_video_count
            .unwrap_or(self.videos.len() as u64);
        json!({
            "id": self.id,
            "snippet": {
                "title": self.title,
                "description": format!("{} channel", self.title),
                "thumbnails": { "default": { "url": "https://yt3.ggpht.com/default.jpg" } },
            },
            "statistics": {
                "subscriberCount": self.subscribers.to_string(),
                "viewCount": total_views.to_string(),
                "videoCount": video_count.to_string(),
            },
            "contentDetails": { "relatedPlaylists": { "uploads": self.uploads_playlist() } },
        })
    }
}

fn video_json(video: &Video) -> Value {
    json!({
        "id": video.id,
        "snippet": {
            "title": video.title,
            "description": video.description,
            "publishedAt": video.published_at.to_rfc3339(),
            "thumbnails": { "default": { "url": video.thumbnail } },
        },
        "statistics": {
            "viewCount": video.views.to_string(),
            "likeCount": video.likes,
            "commentCount": video.comments.to_string(),
        },
        "contentDetails": { "duration": video.duration },
    })
}
