// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the delegated key manager.

use async_trait::async_trait;
use dbx_core::{DelegateKeys, DelegatedKeyManager, DkmError, PupId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct DelegateRequest<'a> {
    id: &'a str,
}

#[derive(Deserialize)]
struct DelegateResponse {
    priv_extended: String,
    wif: String,
}

pub struct DkmClient {
    base_url: String,
    http: reqwest::Client,
}

impl DkmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { base_url: base_url.into(), http }
    }
}

#[async_trait]
impl DelegatedKeyManager for DkmClient {
    async fn make_delegate(
        &self,
        pup_id: &PupId,
        session_token: &str,
    ) -> Result<DelegateKeys, DkmError> {
        let url = format!("{}/create/delegate", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(session_token)
            .json(&DelegateRequest { id: pup_id.as_str() })
            .send()
            .await
            .map_err(|e| DkmError::Unavailable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DkmError::Rejected(format!("status {}", response.status())));
        }
        let body: DelegateResponse =
            response.json().await.map_err(|e| DkmError::Rejected(e.to_string()))?;
        Ok(DelegateKeys { extended_priv: body.priv_extended, wif: body.wif })
    }
}
