//! Channel URL recognition.

use url::Url;

use crate::error::{InsightsError, InsightsResult};

/// What a channel URL points at, before any provider lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelLocator {
    /// `youtube.com/channel/<id>`
    Id(String),
    /// `youtube.com/c/<name>` or `youtube.com/user/<name>`
    Username(String),
    /// `youtube.com/@<handle>`, stored without the `@`.
    Handle(String),
}

pub fn parse_channel_url(raw: &str) -> InsightsResult<ChannelLocator> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(InsightsError::validation("channel URL is required"));
    }

    let parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => Url::parse(&format!("https://{trimmed}"))
            .map_err(|err| InsightsError::validation(format!("invalid channel URL: {err}")))?,
    };

    let host = parsed.host_str().unwrap_or_default().to_ascii_lowercase();
    if host == "youtu.be" || host.ends_with(".youtu.be") {
        return Err(InsightsError::validation(
            "youtu.be links point at videos, not channels",
        ));
    }
    if host != "youtube.com" && !host.ends_with(".youtube.com") {
        return Err(InsightsError::validation(format!(
            "unsupported YouTube URL format: {trimmed}"
        )));
    }

    let segments = decoded_segments(&parsed, trimmed)?;
    let segments: Vec<&str> = segments.iter().map(String::as_str).collect();

    let locator = match segments.as_slice() {
        ["channel", id, ..] => Some(ChannelLocator::Id((*id).to_owned())),
        ["c" | "user", name, ..] => Some(ChannelLocator::Username((*name).to_owned())),
        [first, ..] => first
            .strip_prefix('@')
            .filter(|handle| !handle.is_empty())
            .map(|handle| ChannelLocator::Handle(handle.to_owned())),
        [] => None,
    };

    locator.ok_or_else(|| {
        InsightsError::validation(format!("unsupported YouTube URL format: {trimmed}"))
    })
}

/// Non-empty path segments with percent-escapes resolved, so handles and
/// names reach the provider exactly once encoded.
fn decoded_segments(parsed: &Url, raw: &str) -> InsightsResult<Vec<String>> {
    let Some(segments) = parsed.path_segments() else {
        return Ok(Vec::new());
    };
    segments
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            urlencoding::decode(segment)
                .map(|decoded| decoded.into_owned())
                .map_err(|_| {
                    InsightsError::validation(format!("channel URL is not valid UTF-8: {raw}"))
                })
        })
        .collect()
}
