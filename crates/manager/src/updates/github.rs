// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort release-note enrichment from GitHub.
//!
//! The cache is the source of truth; a failed or rate-limited lookup never
//! fails a check run, it only leaves metadata absent.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("rate limited")]
    RateLimited,
    #[error("lookup failed: {0}")]
    Other(String),
}

/// Release metadata for one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseInfo {
    pub notes: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub url: Option<String>,
}

/// Upstream release metadata lookup.
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    /// Fetch release metadata for `tag`. `Ok(None)` means the tag has no
    /// release (memoized by the caller per run).
    async fn release(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<ReleaseInfo>, ReleaseError>;
}

/// Parse a GitHub `owner/repo` pair out of a source location.
///
/// Accepts `https://github.com/owner/repo(.git)` and
/// `git@github.com:owner/repo(.git)` shapes; anything else is not GitHub.
pub fn parse_github_repo(location: &str) -> Option<(String, String)> {
    let rest = location
        .strip_prefix("https://github.com/")
        .or_else(|| location.strip_prefix("http://github.com/"))
        .or_else(|| location.strip_prefix("git@github.com:"))?;
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.splitn(2, '/');
    let owner = parts.next()?.trim();
    let repo = parts.next()?.trim().trim_end_matches('/');
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    html_url: Option<String>,
}

/// GitHub API client with a strict request timeout.
pub struct GithubReleaseClient {
    http: reqwest::Client,
}

impl GithubReleaseClient {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(4))
            .user_agent("dogeboxd")
            .build()
            .unwrap_or_default();
        Self { http }
    }
}

impl Default for GithubReleaseClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ReleaseLookup for GithubReleaseClient {
    async fn release(
        &self,
        owner: &str,
        repo: &str,
        tag: &str,
    ) -> Result<Option<ReleaseInfo>, ReleaseError> {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/releases/tags/{tag}");
        let response = self
            .http
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .send()
            .await
            .map_err(|e| ReleaseError::Other(e.to_string()))?;

        match response.status().as_u16() {
            200..=299 => {
                let body: ReleaseResponse =
                    response.json().await.map_err(|e| ReleaseError::Other(e.to_string()))?;
                Ok(Some(ReleaseInfo {
                    notes: body.body,
                    date: body.published_at,
                    url: body.html_url,
                }))
            }
            404 => Ok(None),
            403 | 429 => Err(ReleaseError::RateLimited),
            status => Err(ReleaseError::Other(format!("unexpected status {status}"))),
        }
    }
}

/// Scripted release lookup for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeReleaseLookup {
    releases: parking_lot::Mutex<std::collections::HashMap<String, ReleaseInfo>>,
    rate_limited: parking_lot::Mutex<bool>,
    pub lookups: parking_lot::Mutex<Vec<String>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeReleaseLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_release(&self, tag: &str, notes: &str) {
        self.releases.lock().insert(
            tag.to_string(),
            ReleaseInfo {
                notes: Some(notes.to_string()),
                date: None,
                url: Some(format!("https://github.com/x/y/releases/tag/{tag}")),
            },
        );
    }

    pub fn set_rate_limited(&self, limited: bool) {
        *self.rate_limited.lock() = limited;
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl ReleaseLookup for FakeReleaseLookup {
    async fn release(
        &self,
        _owner: &str,
        _repo: &str,
        tag: &str,
    ) -> Result<Option<ReleaseInfo>, ReleaseError> {
        self.lookups.lock().push(tag.to_string());
        if *self.rate_limited.lock() {
            return Err(ReleaseError::RateLimited);
        }
        Ok(self.releases.lock().get(tag).cloned())
    }
}

#[cfg(test)]
#[path = "github_tests.rs"]
mod tests;
