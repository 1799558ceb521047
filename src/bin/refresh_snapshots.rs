#![forbid(unsafe_code)]

//! Recomputes stored analytics and trends snapshots. Meant to run from cron
//! shortly after midnight UTC so the first requests of the day hit the cache.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use yt_insights::{
    cache_gate::SnapshotState,
    config::{RuntimeOverrides, resolve_settings},
    models::EngagementKind,
    service::InsightsService,
    snapshots::SnapshotDb,
    youtube::{UreqTransport, YouTubeClient},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Analytics,
    Trends,
    All,
}

impl KindArg {
    fn kinds(self) -> &'static [EngagementKind] {
        match self {
            KindArg::Analytics => &[EngagementKind::Analytics],
            KindArg::Trends => &[EngagementKind::Trends],
            KindArg::All => &EngagementKind::ALL,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "refresh_snapshots")]
#[command(about = "Recompute cached channel analytics and trends", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to the .env file")]
    env_file: Option<PathBuf>,

    #[arg(long, help = "Snapshot database path")]
    db_path: Option<PathBuf>,

    #[arg(
        long = "channel",
        help = "Channel id to refresh; repeatable. Defaults to every stored channel"
    )]
    channels: Vec<String>,

    #[arg(long, value_enum, default_value = "all", help = "Which payloads to recompute")]
    kind: KindArg,

    #[arg(long, help = "Skip snapshots already updated today")]
    stale_only: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failed) => {
            log::error!("{failed} refresh(es) failed");
            ExitCode::FAILURE
        }
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns the number of failed (channel, kind) refreshes.
async fn run(cli: Cli) -> Result<usize> {
    let settings = resolve_settings(RuntimeOverrides {
        env_path: cli.env_file.clone(),
        db_path: cli.db_path.clone(),
        ..RuntimeOverrides::default()
    })?;
    log::info!("resolved settings: {settings:?}");

    let store = SnapshotDb::open(&settings.db_path)
        .await
        .context("initializing snapshot store")?;
    let channels = if cli.channels.is_empty() {
        store
            .list_channels()
            .await
            .context("listing stored channels")?
    } else {
        cli.channels.clone()
    };
    if channels.is_empty() {
        log::info!("no channels to refresh in {}", settings.db_path.display());
        return Ok(0);
    }

    let transport = UreqTransport::new(
        settings.api_base_url.as_str(),
        settings.api_key.as_str(),
        settings.request_timeout,
    );
    let client = YouTubeClient::new(transport).with_fetch_deadline(settings.fetch_deadline);
    let service = InsightsService::new(client, store, settings.trends.clone());

    log::info!("refreshing {} channel(s)", channels.len());
    let mut failed = 0;
    for (index, channel_id) in channels.iter().enumerate() {
        for &kind in cli.kind.kinds() {
            let now = Utc::now();
            if cli.stale_only {
                match service.gate().state_at(channel_id, kind, now).await {
                    Ok(SnapshotState::FreshToday) => {
                        log::info!("[{}/{}] {kind} for {channel_id} is current, skipping", index + 1, channels.len());
                        continue;
                    }
                    Ok(_) => {}
                    Err(err) => log::warn!("{err}; refreshing {kind} for {channel_id} anyway"),
                }
            }

            match service.refresh(channel_id, kind, now).await {
                Ok(()) => log::info!("[{}/{}] refreshed {kind} for {channel_id}", index + 1, channels.len()),
                Err(err) => {
                    failed += 1;
                    log::error!("[{}/{}] {kind} for {channel_id} failed: {err}", index + 1, channels.len());
                }
            }
        }
    }
    Ok(failed)
}
