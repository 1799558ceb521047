//! HTTP seam between the client and the provider.

use std::time::Duration;

use crate::error::{InsightsError, InsightsResult};

pub const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Performs one GET against a provider endpoint and returns the body of a
/// successful response. Implementations never retry.
pub trait Transport: Send + Sync {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> InsightsResult<String>;
}

/// Blocking transport backed by a shared `ureq` agent. The API key is
/// appended to every request.
pub struct UreqTransport {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl UreqTransport {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }
}

impl Transport for UreqTransport {
    fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> InsightsResult<String> {
        let mut request = self.agent.get(&self.endpoint_url(endpoint));
        for (name, value) in query {
            request = request.query(name, value);
        }
        request = request.query("key", &self.api_key);

        match request.call() {
            Ok(response) => response.into_string().map_err(|err| {
                InsightsError::fetch(None, format!("reading {endpoint} response: {err}"))
            }),
            Err(ureq::Error::Status(code, _)) => Err(InsightsError::fetch(
                Some(code),
                format!("YouTube API returned status code: {code}"),
            )),
            // The transport error's Display starts with the request URL,
            // which carries the API key.
            Err(ureq::Error::Transport(err)) => Err(InsightsError::fetch(
                None,
                format!("failed to reach YouTube API ({endpoint}): {}", err.kind()),
            )),
        }
    }
}
