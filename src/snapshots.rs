//! Persisted analytics and trends payloads, one row per channel and kind.
//!
//! Rows live in the `channel_engagement` table. Writes go through a single
//! `INSERT ... ON CONFLICT DO UPDATE`, so a (channel, kind) pair never has more
//! than one row and `create_date` survives later refreshes.

use std::future::Future;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use libsql::{Builder, Connection, Row, params};

use crate::models::EngagementKind;
use crate::normalize::ZERO_TIMESTAMP;

/// Date layout written by older deployments of the snapshot table.
const LEGACY_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngagementSnapshot {
    pub channel_id: String,
    pub kind: EngagementKind,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// JSON-encoded `ChannelAnalytics` or `ChannelTrends`.
    pub payload: String,
}

/// Storage used by the cache gate.
pub trait SnapshotStore: Send + Sync {
    fn latest(
        &self,
        channel_id: &str,
        kind: EngagementKind,
    ) -> impl Future<Output = Result<Option<EngagementSnapshot>>> + Send;

    fn upsert(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        payload: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

async fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS channel_engagement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            channel_id TEXT NOT NULL,
            engagement_type TEXT NOT NULL CHECK (engagement_type IN ('analytics', 'trends')),
            create_date TEXT NOT NULL,
            update_date TEXT NOT NULL,
            json_response TEXT NOT NULL,
            UNIQUE (channel_id, engagement_type)
        );
        "#,
    )
    .await?;
    Ok(())
}

/// Cloneable handle on the local SQLite snapshot database.
#[derive(Clone)]
pub struct SnapshotDb {
    conn: Connection,
}

impl SnapshotDb {
    /// Opens (and if necessary creates) the database file and its schema.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating snapshot directory {}", parent.display()))?;
        }

        let db = Builder::new_local(path)
            .build()
            .await
            .with_context(|| format!("opening snapshot DB {}", path.display()))?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn)
            .await
            .context("creating channel_engagement table")?;
        Ok(Self { conn })
    }

    /// Distinct channel ids that have at least one snapshot, sorted.
    pub async fn list_channels(&self) -> Result<Vec<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT DISTINCT channel_id FROM channel_engagement ORDER BY channel_id",
                params![],
            )
            .await?;
        let mut channels = Vec::new();
        while let Some(row) = rows.next().await? {
            channels.push(row.get::<String>(0)?);
        }
        Ok(channels)
    }
}

impl SnapshotStore for SnapshotDb {
    async fn latest(
        &self,
        channel_id: &str,
        kind: EngagementKind,
    ) -> Result<Option<EngagementSnapshot>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT channel_id, engagement_type, create_date, update_date, json_response
                FROM channel_engagement
                WHERE channel_id = ?1 AND engagement_type = ?2
                "#,
                params![channel_id, kind.as_str()],
            )
            .await
            .with_context(|| format!("reading {kind} snapshot for {channel_id}"))?;

        let Some(row) = rows.next().await? else {
            return Ok(None);
        };
        row_to_snapshot(&row).map(Some)
    }

    async fn upsert(
        &self,
        channel_id: &str,
        kind: EngagementKind,
        payload: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let stamp = format_date(now);
        self.conn
            .execute(
                r#"
                INSERT INTO channel_engagement (
                    channel_id, engagement_type, create_date, update_date, json_response
                ) VALUES (?1, ?2, ?3, ?3, ?4)
                ON CONFLICT(channel_id, engagement_type) DO UPDATE SET
                    update_date = excluded.update_date,
                    json_response = excluded.json_response
                "#,
                params![channel_id, kind.as_str(), stamp, payload],
            )
            .await
            .with_context(|| format!("writing {kind} snapshot for {channel_id}"))?;
        Ok(())
    }
}

fn row_to_snapshot(row: &Row) -> Result<EngagementSnapshot> {
    let channel_id: String = row.get(0)?;
    let kind_text: String = row.get(1)?;
    let kind = EngagementKind::parse(&kind_text)
        .with_context(|| format!("unknown engagement_type {kind_text:?}"))?;
    let created_text: String = row.get(2)?;
    let updated_text: String = row.get(3)?;

    Ok(EngagementSnapshot {
        created_at: parse_date(&created_text),
        updated_at: parse_date(&updated_text),
        payload: row.get(4)?,
        channel_id,
        kind,
    })
}

fn format_date(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Unreadable dates map to the epoch so the row reads as stale.
fn parse_date(raw: &str) -> DateTime<Utc> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return parsed.with_timezone(&Utc);
    }
    match NaiveDateTime::parse_from_str(trimmed, LEGACY_DATE_FORMAT) {
        Ok(naive) => naive.and_utc(),
        Err(_) => {
            log::warn!("unreadable snapshot date {raw:?}; treating snapshot as stale");
            ZERO_TIMESTAMP
        }
    }
}
