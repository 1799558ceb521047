//! Request flows shared by the HTTP backend and the refresh CLI.
//!
//! Provider calls are blocking and run on tokio's blocking pool; the engines
//! are pure and run inline.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analytics::compute_analytics;
use crate::cache_gate::{CacheGate, Served};
use crate::error::{InsightsError, InsightsResult};
use crate::models::{Channel, ChannelAnalytics, ChannelTrends, EngagementKind, Video, VideoFilter};
use crate::snapshots::SnapshotStore;
use crate::trends::{TrendsConfig, compute_trends};
use crate::youtube::{Transport, YouTubeClient};

pub struct InsightsService<T, S> {
    client: Arc<YouTubeClient<T>>,
    gate: CacheGate<S>,
    trends_config: TrendsConfig,
}

impl<T, S> InsightsService<T, S>
where
    T: Transport + 'static,
    S: SnapshotStore,
{
    pub fn new(client: YouTubeClient<T>, store: S, trends_config: TrendsConfig) -> Self {
        Self {
            client: Arc::new(client),
            gate: CacheGate::new(store),
            trends_config,
        }
    }

    pub fn client(&self) -> &YouTubeClient<T> {
        &self.client
    }

    pub fn gate(&self) -> &CacheGate<S> {
        &self.gate
    }

    async fn blocking<R, F>(&self, op: F) -> InsightsResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&YouTubeClient<T>) -> InsightsResult<R> + Send + 'static,
    {
        let client = Arc::clone(&self.client);
        tokio::task::spawn_blocking(move || op(&client))
            .await
            .map_err(|err| InsightsError::Internal(format!("provider task failed: {err}")))?
    }

    pub async fn channel(&self, channel_id: &str) -> InsightsResult<Channel> {
        let channel_id = channel_id.to_owned();
        self.blocking(move |client| client.fetch_channel(&channel_id))
            .await
    }

    pub async fn channel_by_url(&self, url: &str) -> InsightsResult<Channel> {
        let url = url.to_owned();
        self.blocking(move |client| client.resolve_channel_url(&url))
            .await
    }

    pub async fn channel_by_title(&self, title: &str) -> InsightsResult<Channel> {
        let title = title.to_owned();
        self.blocking(move |client| client.search_channel_by_title(&title))
            .await
    }

    pub async fn videos(&self, channel_id: &str, filter: VideoFilter) -> InsightsResult<Vec<Video>> {
        let channel_id = channel_id.to_owned();
        self.blocking(move |client| client.fetch_all_videos(&channel_id, &filter))
            .await
    }

    /// Channel details plus every upload, newest first.
    async fn channel_with_uploads(&self, channel_id: &str) -> InsightsResult<(Channel, Vec<Video>)> {
        let channel_id = channel_id.to_owned();
        self.blocking(move |client| {
            let channel = client.fetch_channel(&channel_id)?;
            let filter = VideoFilter::whole_channel(channel.video_count);
            let videos = client.fetch_all_videos(&channel.id, &filter)?;
            Ok((channel, videos))
        })
        .await
    }

    pub async fn compute_analytics(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> InsightsResult<ChannelAnalytics> {
        let (channel, videos) = self.channel_with_uploads(channel_id).await?;
        compute_analytics(&channel, &videos, now)
    }

    /// Trends over the uploads in chronological order. A channel without
    /// uploads has no trends and reports [`InsightsError::NoData`].
    pub async fn compute_trends(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> InsightsResult<ChannelTrends> {
        let (channel, mut videos) = self.channel_with_uploads(channel_id).await?;
        videos.sort_by_key(|video| video.published_at);
        compute_trends(&channel, &videos, &self.trends_config, now).ok_or(InsightsError::NoData)
    }

    pub async fn analytics(&self, channel_id: &str) -> InsightsResult<Served<ChannelAnalytics>> {
        self.analytics_at(channel_id, Utc::now()).await
    }

    pub async fn analytics_at(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> InsightsResult<Served<ChannelAnalytics>> {
        self.gate
            .serve_at(channel_id, EngagementKind::Analytics, now, move || {
                self.compute_analytics(channel_id, now)
            })
            .await
    }

    pub async fn trends(&self, channel_id: &str) -> InsightsResult<Served<ChannelTrends>> {
        self.trends_at(channel_id, Utc::now()).await
    }

    pub async fn trends_at(
        &self,
        channel_id: &str,
        now: DateTime<Utc>,
    ) -> InsightsResult<Served<ChannelTrends>> {
        self.gate
            .serve_at(channel_id, EngagementKind::Trends, now, move || {
                self.compute_trends(channel_id, now)
            })
            .await
    }

    /// Recomputes one payload and stores it regardless of snapshot state.
    pub async fn refresh(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        now: DateTime<Utc>,
    ) -> InsightsResult<()> {
        match kind {
            EngagementKind::Analytics => {
                let analytics = self.compute_analytics(channel_id, now).await?;
                self.gate.store_value(channel_id, kind, &analytics, now).await
            }
            EngagementKind::Trends => {
                let trends = self.compute_trends(channel_id, now).await?;
                self.gate.store_value(channel_id, kind, &trends, now).await
            }
        }
    }
}
