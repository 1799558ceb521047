//! Once-per-UTC-day reuse of computed analytics and trends.
//!
//! Each (channel, kind) pair is in one of three states. A snapshot updated
//! on the current UTC calendar day is served verbatim. A missing snapshot,
//! one from an earlier day, or one whose payload no longer decodes is
//! recomputed and written back through an upsert.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{InsightsError, InsightsResult};
use crate::models::EngagementKind;
use crate::snapshots::{EngagementSnapshot, SnapshotStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    NoSnapshot,
    FreshToday,
    StaleOlderDay,
}

pub fn classify(snapshot: Option<&EngagementSnapshot>, now: DateTime<Utc>) -> SnapshotState {
    match snapshot {
        None => SnapshotState::NoSnapshot,
        Some(snapshot) if snapshot.updated_at.date_naive() == now.date_naive() => {
            SnapshotState::FreshToday
        }
        Some(_) => SnapshotState::StaleOlderDay,
    }
}

/// A served value and the state the snapshot was in when the request arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct Served<T> {
    pub value: T,
    pub state: SnapshotState,
}

impl<T> Served<T> {
    pub fn from_cache(&self) -> bool {
        self.state == SnapshotState::FreshToday
    }
}

pub struct CacheGate<S> {
    store: S,
}

impl<S: SnapshotStore> CacheGate<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub async fn serve<T, F, Fut>(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        compute: F,
    ) -> InsightsResult<Served<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = InsightsResult<T>>,
    {
        self.serve_at(channel_id, kind, Utc::now(), compute).await
    }

    /// Serves today's snapshot when there is one, otherwise runs `compute`
    /// and stores its result. Store failures never fail the request.
    pub async fn serve_at<T, F, Fut>(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        now: DateTime<Utc>,
        compute: F,
    ) -> InsightsResult<Served<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = InsightsResult<T>>,
    {
        let snapshot = match self.store.latest(channel_id, kind).await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                log::warn!("could not read {kind} snapshot for {channel_id}, recomputing: {err:#}");
                None
            }
        };

        let state = classify(snapshot.as_ref(), now);
        if let Some(snapshot) = snapshot.as_ref()
            && state == SnapshotState::FreshToday
        {
            match decode::<T>(&snapshot.payload) {
                Ok(value) => {
                    log::info!(
                        "serving {kind} for {channel_id} from snapshot updated {}",
                        snapshot.updated_at
                    );
                    return Ok(Served { value, state });
                }
                Err(err) => log::warn!("{err} ({kind} for {channel_id}); recomputing"),
            }
        }

        log::info!("{kind} for {channel_id}: {state:?}, computing");
        let value = compute().await?;
        if let Err(err) = self.store_value(channel_id, kind, &value, now).await {
            log::error!("{err}; serving {kind} for {channel_id} without caching it");
        }
        Ok(Served { value, state })
    }

    /// State of the stored snapshot without computing anything.
    pub async fn state_at(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        now: DateTime<Utc>,
    ) -> InsightsResult<SnapshotState> {
        let snapshot = self
            .store
            .latest(channel_id, kind)
            .await
            .map_err(InsightsError::storage)?;
        Ok(classify(snapshot.as_ref(), now))
    }

    /// Encodes and upserts `value` unconditionally.
    pub async fn store_value<T: Serialize>(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        value: &T,
        now: DateTime<Utc>,
    ) -> InsightsResult<()> {
        let payload = serde_json::to_string(value)
            .map_err(|err| InsightsError::Internal(format!("encoding {kind} snapshot: {err}")))?;
        self.store
            .upsert(channel_id, kind, &payload, now)
            .await
            .map_err(InsightsError::storage)
    }
}

fn decode<T: DeserializeOwned>(payload: &str) -> InsightsResult<T> {
    serde_json::from_str(payload).map_err(|err| InsightsError::Decode(err.to_string()))
}
