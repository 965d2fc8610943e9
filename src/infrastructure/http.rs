//! Blocking JSON client shared by the service adapters.

use std::time::Duration;

use reqwest::Url;
use serde::de::DeserializeOwned;

use crate::domain::{AppError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("collab-archiver/", env!("CARGO_PKG_VERSION"));

/// Authenticated client for one remote service.
pub struct ApiClient {
    client: reqwest::blocking::Client,
    base_url: Url,
    token: String,
    service: &'static str,
}

impl ApiClient {
    /// Create a client sending `token` as bearer credentials.
    ///
    /// # Errors
    /// Returns error if `base_url` is not a valid base URL or the HTTP
    /// client cannot be built.
    pub fn new(service: &'static str, base_url: &str, token: String) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| AppError::config(format!("invalid {service} API URL: {base_url}")))?;

        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .map_err(AppError::http)?;

        Ok(Self {
            client,
            base_url,
            token,
            service,
        })
    }

    /// URL for `segments` below the base URL. Each segment is percent-encoded,
    /// so identifiers containing `/`, `#` or `?` stay a single segment.
    ///
    /// # Errors
    /// Returns error if the base URL cannot take path segments.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| AppError::config(format!("invalid {} API URL", self.service)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// GET the endpoint at `segments` with query parameters and decode the
    /// JSON body.
    ///
    /// # Errors
    /// Returns error on transport failure, non-success status or undecodable
    /// body.
    pub fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        tracing::trace!(service = self.service, %url, "GET");

        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .send()
            .map_err(AppError::http)?;

        let status = response.status();
        let body = response.text().map_err(AppError::http)?;

        if !status.is_success() {
            return Err(AppError::Http {
                message: format!("{} returned {status}: {}", self.service, snippet(&body)),
                source: None,
            });
        }

        decode(&body)
    }
}

/// Decode a JSON body.
///
/// # Errors
/// Returns error if the body does not match `T`.
pub fn decode<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(AppError::json_parse)
}

/// First line of an error body, bounded for log output.
fn snippet(body: &str) -> String {
    let line = body.lines().next().unwrap_or_default().trim();
    line.chars().take(200).collect()
}
