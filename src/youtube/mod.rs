//! Blocking client for the YouTube Data API v3.
//!
//! Every public operation is a sequence of plain GET requests issued through
//! a [`Transport`]. Failures are never retried. A fetch deadline, when set,
//! bounds the whole operation and is checked before each request.

mod locator;
mod transport;
mod wire;

#[cfg(test)]
pub(crate) mod fake;

use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;

pub use locator::{ChannelLocator, parse_channel_url};
pub use transport::{DEFAULT_API_BASE_URL, Transport, UreqTransport};

use crate::error::{InsightsError, InsightsResult};
use crate::models::{Channel, Video, VideoFilter};
use crate::normalize::normalize_video;
use wire::{ChannelItem, ListResponse, PlaylistItem, SearchItem, VideoItem};

/// Largest page and id batch the provider accepts.
pub const MAX_PAGE_SIZE: usize = 50;

const PAGE_SIZE_PARAM: &str = "50";
const CHANNEL_PARTS: &str = "snippet,statistics";
const VIDEO_PARTS: &str = "snippet,contentDetails,statistics";

pub struct YouTubeClient<T> {
    transport: T,
    fetch_deadline: Option<Duration>,
}

struct Deadline {
    expires_at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    fn check(&self, endpoint: &str) -> InsightsResult<()> {
        match self.expires_at {
            Some(expires_at) if Instant::now() >= expires_at => Err(InsightsError::fetch(
                None,
                format!(
                    "fetch deadline of {}s exceeded before calling {endpoint}",
                    self.budget.as_secs()
                ),
            )),
            _ => Ok(()),
        }
    }
}

impl<T: Transport> YouTubeClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            fetch_deadline: None,
        }
    }

    pub fn with_fetch_deadline(mut self, deadline: Duration) -> Self {
        self.fetch_deadline = Some(deadline);
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn deadline(&self) -> Deadline {
        Deadline {
            expires_at: self.fetch_deadline.map(|budget| Instant::now() + budget),
            budget: self.fetch_deadline.unwrap_or_default(),
        }
    }

    fn get_list<R: DeserializeOwned>(
        &self,
        deadline: &Deadline,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> InsightsResult<ListResponse<R>> {
        deadline.check(endpoint)?;
        let body = self.transport.get(endpoint, query)?;
        serde_json::from_str(&body).map_err(|err| {
            InsightsError::fetch(None, format!("failed to decode {endpoint} response: {err}"))
        })
    }

    /// Channel metadata and statistics for one channel id.
    pub fn fetch_channel(&self, channel_id: &str) -> InsightsResult<Channel> {
        let deadline = self.deadline();
        self.channel_by_id(&deadline, channel_id)
    }

    fn channel_by_id(&self, deadline: &Deadline, channel_id: &str) -> InsightsResult<Channel> {
        self.first_channel(deadline, &[("part", CHANNEL_PARTS), ("id", channel_id)])?
            .ok_or_else(|| InsightsError::not_found("channel not found"))
    }

    fn first_channel(
        &self,
        deadline: &Deadline,
        query: &[(&str, &str)],
    ) -> InsightsResult<Option<Channel>> {
        let response: ListResponse<ChannelItem> = self.get_list(deadline, "channels", query)?;
        Ok(response.items.into_iter().next().map(ChannelItem::into_channel))
    }

    /// Walks the channel's uploads playlist, hydrates the collected ids in
    /// batches, then applies `filter`. At most `filter.max_videos` ids are
    /// collected before thresholds are applied.
    pub fn fetch_all_videos(
        &self,
        channel_id: &str,
        filter: &VideoFilter,
    ) -> InsightsResult<Vec<Video>> {
        let deadline = self.deadline();
        let uploads = self.uploads_playlist(&deadline, channel_id)?;
        let ids = self.collect_upload_ids(&deadline, &uploads, filter.max_videos)?;

        let mut videos = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_PAGE_SIZE) {
            let joined = batch.join(",");
            let response: ListResponse<VideoItem> = self.get_list(
                &deadline,
                "videos",
                &[("part", VIDEO_PARTS), ("id", joined.as_str())],
            )?;
            log::debug!(
                "hydrated {} of {} requested videos for channel {channel_id}",
                response.items.len(),
                batch.len()
            );
            videos.extend(
                response
                    .items
                    .iter()
                    .map(|item| normalize_video(item))
                    .filter(|video| filter.retains(video)),
            );
        }

        filter.sort_and_truncate(&mut videos);
        log::info!(
            "fetched {} videos for channel {channel_id} ({} ids listed)",
            videos.len(),
            ids.len()
        );
        Ok(videos)
    }

    fn uploads_playlist(&self, deadline: &Deadline, channel_id: &str) -> InsightsResult<String> {
        let response: ListResponse<ChannelItem> = self.get_list(
            deadline,
            "channels",
            &[("part", "contentDetails"), ("id", channel_id)],
        )?;
        let item = response
            .items
            .first()
            .ok_or_else(|| InsightsError::not_found("channel not found"))?;
        item.uploads_playlist().map(str::to_owned).ok_or_else(|| {
            InsightsError::not_found(format!("uploads playlist not found for channel {channel_id}"))
        })
    }

    fn collect_upload_ids(
        &self,
        deadline: &Deadline,
        playlist_id: &str,
        max_videos: usize,
    ) -> InsightsResult<Vec<String>> {
        let mut ids = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let page: ListResponse<PlaylistItem> = {
                let mut query = vec![
                    ("part", "snippet"),
                    ("playlistId", playlist_id),
                    ("maxResults", PAGE_SIZE_PARAM),
                ];
                if let Some(token) = page_token.as_deref() {
                    query.push(("pageToken", token));
                }
                self.get_list(deadline, "playlistItems", &query)?
            };

            ids.extend(page.items.iter().filter_map(PlaylistItem::video_id).map(str::to_owned));
            log::debug!("listed {} upload ids from playlist {playlist_id}", ids.len());

            if ids.len() >= max_videos {
                break;
            }
            match page.next_page() {
                Some(token) => page_token = Some(token.to_owned()),
                None => break,
            }
        }

        ids.truncate(max_videos);
        Ok(ids)
    }

    /// Resolves a channel URL (`/channel/`, `/c/`, `/user/` or `/@handle`)
    /// to the channel it names.
    pub fn resolve_channel_url(&self, raw_url: &str) -> InsightsResult<Channel> {
        let locator = parse_channel_url(raw_url)?;
        let deadline = self.deadline();
        match locator {
            ChannelLocator::Id(id) => self.channel_by_id(&deadline, &id),
            ChannelLocator::Username(name) => self
                .first_channel(&deadline, &[("part", CHANNEL_PARTS), ("forUsername", name.as_str())])?
                .ok_or_else(|| {
                    InsightsError::not_found(format!("no channel found for username: {name}"))
                }),
            ChannelLocator::Handle(handle) => self.channel_by_handle(&deadline, &handle),
        }
    }

    fn channel_by_handle(&self, deadline: &Deadline, handle: &str) -> InsightsResult<Channel> {
        if let Some(channel) =
            self.first_channel(deadline, &[("part", CHANNEL_PARTS), ("forHandle", handle)])?
        {
            return Ok(channel);
        }

        log::debug!("forHandle lookup for @{handle} was empty, falling back to search");
        let channel_id = self
            .search_first_channel_id(deadline, &format!("@{handle}"))?
            .ok_or_else(|| InsightsError::not_found(format!("no channel found for handle: @{handle}")))?;
        let channel = self.channel_by_id(deadline, &channel_id)?;
        if !handle_matches_title(handle, &channel.title) {
            log::warn!(
                "handle @{handle} resolved through search to {} ({:?}); match may be inexact",
                channel.id,
                channel.title
            );
        }
        Ok(channel)
    }

    fn search_first_channel_id(
        &self,
        deadline: &Deadline,
        search_query: &str,
    ) -> InsightsResult<Option<String>> {
        let response: ListResponse<SearchItem> = self.get_list(
            deadline,
            "search",
            &[
                ("part", "snippet"),
                ("q", search_query),
                ("type", "channel"),
                ("maxResults", "1"),
            ],
        )?;
        Ok(response
            .items
            .into_iter()
            .find_map(|item| item.id.channel_id.filter(|id| !id.is_empty())))
    }

    /// Best channel search hit for a free-text title.
    pub fn search_channel_by_title(&self, title: &str) -> InsightsResult<Channel> {
        let title = title.trim();
        if title.is_empty() {
            return Err(InsightsError::validation("channel title is required"));
        }
        let deadline = self.deadline();
        let channel_id = self
            .search_first_channel_id(&deadline, title)?
            .ok_or_else(|| InsightsError::not_found(format!("no channels found with title: {title}")))?;
        self.channel_by_id(&deadline, &channel_id)
    }
}

/// Search hits for `@handle` are fuzzy; only a case-insensitive title match
/// counts as exact.
fn handle_matches_title(handle: &str, title: &str) -> bool {
    handle.to_lowercase() == title.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::fake::{FakeChannel, FakeTransport, video};
    use super::*;
    use crate::models::SortBy;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    fn uploads(count: usize) -> Vec<Video> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap();
        (0..count)
            .map(|index| {
                let views = (index as u64 + 1) * 10;
                video(
                    &format!("v{index:03}"),
                    views,
                    views / 10,
                    index as u64 % 4,
                    base + ChronoDuration::hours(index as i64),
                )
            })
            .collect()
    }

    fn client_for(channel: FakeChannel) -> YouTubeClient<FakeTransport> {
        YouTubeClient::new(channel.into_transport(false))
    }

    #[test]
    fn fetch_channel_maps_statistics() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(uploads(3)));
        let channel = client.fetch_channel("UCrust").unwrap();
        assert_eq!(channel.title, "Rust Talks");
        assert_eq!(channel.subscriber_count, 1_000);
        assert_eq!(channel.video_count, 3);
        assert_eq!(channel.view_count, 60);
    }

    #[test]
    fn unknown_channel_is_not_found() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks"));
        let err = client.fetch_channel("UCother").unwrap_err();
        assert!(matches!(err, InsightsError::NotFound(_)));
    }

    #[test]
    fn fetch_all_videos_pages_and_batches() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(uploads(120)));
        let videos = client
            .fetch_all_videos("UCrust", &VideoFilter::whole_channel(120))
            .unwrap();

        assert_eq!(videos.len(), 120);
        assert!(videos.windows(2).all(|pair| pair[0].published_at >= pair[1].published_at));
        assert_eq!(videos[0].id, "v119");

        let transport = client.transport();
        assert_eq!(transport.calls_to("playlistItems"), 3);
        assert_eq!(transport.calls_to("videos"), 3);
        for call in transport.calls().iter().filter(|call| call.endpoint == "videos") {
            let batch = call.query["id"].split(',').count();
            assert!(batch <= MAX_PAGE_SIZE);
        }
    }

    #[test]
    fn max_videos_stops_pagination_early() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(uploads(120)));
        let filter = VideoFilter {
            max_videos: 10,
            ..VideoFilter::default()
        };
        let videos = client.fetch_all_videos("UCrust", &filter).unwrap();

        assert_eq!(videos.len(), 10);
        let transport = client.transport();
        assert_eq!(transport.calls_to("playlistItems"), 1);
        let batches: Vec<_> = transport
            .calls()
            .into_iter()
            .filter(|call| call.endpoint == "videos")
            .collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].query["id"].split(',').count(), 10);
    }

    #[test]
    fn thresholds_apply_before_sorting() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(uploads(20)));
        let filter = VideoFilter {
            sort_by: SortBy::Views,
            min_views: 150,
            ..VideoFilter::default()
        };
        let videos = client.fetch_all_videos("UCrust", &filter).unwrap();

        assert_eq!(videos.len(), 6);
        assert!(videos.iter().all(|video| video.views >= 150));
        assert_eq!(videos.first().map(|video| video.views), Some(200));
        assert_eq!(videos.last().map(|video| video.views), Some(150));
    }

    #[test]
    fn fetched_videos_keep_their_normalized_fields() {
        let expected = uploads(2);
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(expected.clone()));
        let mut videos = client
            .fetch_all_videos("UCrust", &VideoFilter::whole_channel(2))
            .unwrap();
        videos.reverse();
        assert_eq!(videos, expected);
    }

    #[test]
    fn upstream_status_propagates_without_retry() {
        let client = YouTubeClient::new(FakeTransport::failing(403));
        let err = client
            .fetch_all_videos("UCrust", &VideoFilter::default())
            .unwrap_err();
        assert_eq!(err.upstream_status(), Some(403));
        assert_eq!(client.transport().call_count(), 1);
    }

    #[test]
    fn undecodable_body_is_a_fetch_error() {
        let client = YouTubeClient::new(FakeTransport::new(|_, _| Ok("<html>".to_owned())));
        let err = client.fetch_channel("UCrust").unwrap_err();
        assert!(matches!(err, InsightsError::Fetch { status: None, .. }));
    }

    #[test]
    fn expired_deadline_stops_before_any_request() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_videos(uploads(5)))
            .with_fetch_deadline(Duration::ZERO);
        let err = client
            .fetch_all_videos("UCrust", &VideoFilter::default())
            .unwrap_err();
        assert!(matches!(err, InsightsError::Fetch { status: None, .. }));
        assert_eq!(client.transport().call_count(), 0);
    }

    #[test]
    fn channel_without_uploads_playlist_is_not_found() {
        let client = YouTubeClient::new(FakeTransport::new(|_, _| {
            Ok(r#"{"items": [{"id": "UCbare", "contentDetails": {}}]}"#.to_owned())
        }));
        let err = client
            .fetch_all_videos("UCbare", &VideoFilter::default())
            .unwrap_err();
        assert!(matches!(err, InsightsError::NotFound(_)));
    }

    #[test]
    fn resolves_channel_id_and_username_urls() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_username("rusttalks"));
        let by_id = client
            .resolve_channel_url("https://www.youtube.com/channel/UCrust")
            .unwrap();
        assert_eq!(by_id.id, "UCrust");
        let by_name = client
            .resolve_channel_url("https://www.youtube.com/user/rusttalks")
            .unwrap();
        assert_eq!(by_name.id, "UCrust");
        let missing = client
            .resolve_channel_url("https://www.youtube.com/c/somebodyelse")
            .unwrap_err();
        assert!(matches!(missing, InsightsError::NotFound(_)));
    }

    #[test]
    fn handle_resolves_through_direct_lookup() {
        let channel = FakeChannel::new("UCrust", "Rust Talks").with_handle("rusttalks");
        let client = YouTubeClient::new(channel.into_transport(true));
        let resolved = client
            .resolve_channel_url("https://www.youtube.com/@rusttalks")
            .unwrap();
        assert_eq!(resolved.id, "UCrust");
        assert_eq!(client.transport().calls_to("search"), 0);
    }

    #[test]
    fn handle_falls_back_to_search() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_handle("rusttalks"));
        let resolved = client
            .resolve_channel_url("https://www.youtube.com/@rusttalks")
            .unwrap();
        assert_eq!(resolved.id, "UCrust");

        let transport = client.transport();
        assert_eq!(transport.calls_to("search"), 1);
        let search = transport
            .calls()
            .into_iter()
            .find(|call| call.endpoint == "search")
            .unwrap();
        assert_eq!(search.query["q"], "@rusttalks");
        assert_eq!(search.query["type"], "channel");
    }

    #[test]
    fn search_hit_with_a_different_title_still_resolves() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_handle("rusttalks"));
        let resolved = client
            .resolve_channel_url("https://youtube.com/@RustTalks")
            .unwrap();
        assert_eq!(resolved.id, "UCrust");
        assert!(!handle_matches_title("RustTalks", &resolved.title));
    }

    #[test]
    fn handle_title_comparison_ignores_case_only() {
        assert!(handle_matches_title("Café", "cAFÉ"));
        assert!(handle_matches_title("rusttalks", "RustTalks"));
        assert!(!handle_matches_title("rusttalks", "Rust Talks"));
    }

    #[test]
    fn non_ascii_handle_is_sent_decoded() {
        let client = client_for(FakeChannel::new("UCcafe", "Café").with_handle("café"));
        let resolved = client
            .resolve_channel_url("https://www.youtube.com/@caf%C3%A9")
            .unwrap();
        assert_eq!(resolved.id, "UCcafe");
        assert!(handle_matches_title("café", &resolved.title));

        let calls = client.transport().calls();
        let lookup = calls
            .iter()
            .find(|call| call.endpoint == "channels" && call.query.contains_key("forHandle"))
            .unwrap();
        assert_eq!(lookup.query["forHandle"], "café");
        let search = calls.iter().find(|call| call.endpoint == "search").unwrap();
        assert_eq!(search.query["q"], "@café");
    }

    #[test]
    fn unknown_handle_is_not_found() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks").with_handle("rusttalks"));
        let err = client
            .resolve_channel_url("https://www.youtube.com/@nobody")
            .unwrap_err();
        assert!(matches!(err, InsightsError::NotFound(_)));
    }

    #[test]
    fn short_links_are_rejected_without_requests() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks"));
        let err = client.resolve_channel_url("https://youtu.be/abc").unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
        assert_eq!(client.transport().call_count(), 0);
    }

    #[test]
    fn search_by_title_returns_first_hit() {
        let client = client_for(FakeChannel::new("UCrust", "Rust Talks"));
        let channel = client.search_channel_by_title("rust talks").unwrap();
        assert_eq!(channel.id, "UCrust");

        let err = client.search_channel_by_title("gardening").unwrap_err();
        assert!(matches!(err, InsightsError::NotFound(_)));
        let err = client.search_channel_by_title("  ").unwrap_err();
        assert!(matches!(err, InsightsError::Validation(_)));
    }
}
