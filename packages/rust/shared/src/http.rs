//! HTTP plumbing shared by the external clients.
//!
//! Responses are mapped onto the [`BriefError`] taxonomy here, once:
//! 404 is "absent", 429 is [`BriefError::RateLimited`] (with `Retry-After`),
//! 5xx and network failures are [`BriefError::Transient`], 401/403 are
//! [`BriefError::Config`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::{BriefError, Result};

/// User-Agent string for all outbound requests.
pub const USER_AGENT: &str = concat!("MorningBrief/", env!("CARGO_PKG_VERSION"));

/// Build a client with the per-call timeout applied to every request.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .redirect(reqwest::redirect::Policy::limited(5))
        .timeout(timeout)
        .build()
        .map_err(|e| BriefError::config(format!("failed to build HTTP client: {e}")))
}

/// Send a request and decode a JSON body. `Ok(None)` means HTTP 404.
pub async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder, what: &str) -> Result<Option<T>> {
    let response = request
        .send()
        .await
        .map_err(|e| BriefError::Transient(format!("{what}: {e}")))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = parse_retry_after(response.headers());
        return Err(BriefError::rate_limited(format!("{what}: HTTP 429"), retry_after));
    }
    if status.is_server_error() {
        return Err(BriefError::Transient(format!("{what}: HTTP {status}")));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(BriefError::config(format!("{what}: HTTP {status}, check credentials")));
    }
    if !status.is_success() {
        return Err(BriefError::validation(format!("{what}: HTTP {status}")));
    }

    response
        .json::<T>()
        .await
        .map(Some)
        .map_err(|e| BriefError::parse(format!("{what}: invalid response body: {e}")))
}

/// `Retry-After` as either delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

    if let Ok(secs) = raw.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    (at - Utc::now()).to_std().ok()
}
