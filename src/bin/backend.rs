#![forbid(unsafe_code)]

//! Axum backend exposing channel lookups, video listings and the cached
//! analytics/trends payloads.
//!
//! Lookups and video listings always go to the YouTube Data API. Analytics and
//! trends are computed at most once per channel per UTC day; later requests
//! that day are answered from the SQLite snapshot table.

use std::{
    net::{IpAddr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result, anyhow};
use axum::{
    Json, Router,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tokio::signal;
use yt_insights::{
    InsightsError,
    config::{RuntimeOverrides, resolve_settings},
    models::{Channel, ChannelAnalytics, ChannelTrends, Video, VideoFilter, VideoQuery},
    service::InsightsService,
    snapshots::SnapshotDb,
    youtube::{UreqTransport, YouTubeClient},
};

#[derive(Debug, Clone, Default, PartialEq)]
struct BackendArgs {
    env_path: Option<PathBuf>,
    db_path: Option<PathBuf>,
    port: Option<u16>,
    host: Option<IpAddr>,
}

impl BackendArgs {
    fn parse() -> Result<Self> {
        Self::from_iter(std::env::args().skip(1))
    }

    fn from_iter<I>(iter: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Self::default();
        let mut args = iter.into_iter();
        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };
            let mut value = || {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| anyhow!("{flag} requires a value"))
            };

            match flag.as_str() {
                "--env-file" => parsed.env_path = Some(PathBuf::from(value()?)),
                "--db-path" => parsed.db_path = Some(PathBuf::from(value()?)),
                "--port" => parsed.port = Some(parse_port_arg(&value()?)?),
                "--host" => parsed.host = Some(parse_host_arg(&value()?)?),
                _ => return Err(anyhow!("unknown argument: {arg}")),
            }
        }
        Ok(parsed)
    }

    fn overrides(&self) -> RuntimeOverrides {
        RuntimeOverrides {
            env_path: self.env_path.clone(),
            db_path: self.db_path.clone(),
            host: self.host.map(|host| host.to_string()),
            port: self.port,
        }
    }
}

fn parse_port_arg(value: &str) -> Result<u16> {
    value
        .parse::<u16>()
        .context("expected a numeric port between 0 and 65535")
}

fn parse_host_arg(value: &str) -> Result<IpAddr> {
    value
        .parse::<IpAddr>()
        .context("expected a valid IPv4 or IPv6 address for --host/HOST")
}

type Service = InsightsService<UreqTransport, SnapshotDb>;

#[derive(Clone)]
struct AppState {
    service: Arc<Service>,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<InsightsError> for ApiError {
    fn from(err: InsightsError) -> Self {
        let status = match &err {
            InsightsError::NotFound(_) | InsightsError::NoData => StatusCode::NOT_FOUND,
            InsightsError::Validation(_) => StatusCode::BAD_REQUEST,
            InsightsError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            InsightsError::Decode(_) | InsightsError::Storage(_) | InsightsError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            log::error!("request failed: {err}");
        } else {
            log::debug!("request rejected ({status}): {err}");
        }
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "error": self.message,
        });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = BackendArgs::parse()?;
    let settings = resolve_settings(args.overrides())?;
    log::info!("resolved settings: {settings:?}");

    let host = parse_host_arg(&settings.host)?;
    let store = SnapshotDb::open(&settings.db_path)
        .await
        .context("initializing snapshot store")?;
    let transport = UreqTransport::new(
        settings.api_base_url.as_str(),
        settings.api_key.as_str(),
        settings.request_timeout,
    );
    let client = YouTubeClient::new(transport).with_fetch_deadline(settings.fetch_deadline);
    let state = AppState {
        service: Arc::new(InsightsService::new(client, store, settings.trends.clone())),
    };

    let addr = SocketAddr::new(host, settings.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;
    log::info!("API server listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/channel/url", get(get_channel_by_url))
        .route("/channel/title/{title}", get(get_channel_by_title))
        .route("/channel/{id}", get(get_channel))
        .route("/channel/{id}/videos", get(get_channel_videos))
        .route("/channel/{id}/analytics", get(get_channel_analytics))
        .route("/channel/{id}/trends", get(get_channel_trends))
        .fallback(endpoint_not_found)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        log::error!("failed to install Ctrl+C handler: {err}");
    }
}

async fn endpoint_not_found() -> ApiError {
    ApiError::not_found("endpoint not found")
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Deserialize)]
struct ChannelUrlQuery {
    url: Option<String>,
}

async fn get_channel_by_url(
    State(state): State<AppState>,
    Query(query): Query<ChannelUrlQuery>,
) -> ApiResult<Json<Channel>> {
    let url = query
        .url
        .filter(|url| !url.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("url query parameter is required"))?;
    Ok(Json(state.service.channel_by_url(&url).await?))
}

async fn get_channel_by_title(
    State(state): State<AppState>,
    AxumPath(title): AxumPath<String>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.service.channel_by_title(&title).await?))
}

async fn get_channel(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Channel>> {
    Ok(Json(state.service.channel(&id).await?))
}

async fn get_channel_videos(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<VideoQuery>,
) -> ApiResult<Json<Vec<Video>>> {
    let filter = VideoFilter::from_query(&query);
    Ok(Json(state.service.videos(&id, filter).await?))
}

async fn get_channel_analytics(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ChannelAnalytics>> {
    let served = state.service.analytics(&id).await?;
    Ok(Json(served.value))
}

async fn get_channel_trends(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<ChannelTrends>> {
    let served = state.service.trends(&id).await?;
    Ok(Json(served.value))
}
