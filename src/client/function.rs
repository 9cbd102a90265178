//! Push through a hosted function instead of the multipart endpoint

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use reqwest::Client;
use serde::Serialize;

use super::{check_status, PushDirective, PushPackResult, PushResponseBody};
use crate::error::Result;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionPushRequest<'a> {
    org: &'a str,
    repo: &'a str,
    updates: &'a [PushDirective],
    dry_run: bool,
    options: &'a BTreeMap<String, String>,
    /// base64
    pack: String,
}

pub struct FunctionPush {
    http: Client,
    url: String,
    service_key: String,
}

impl FunctionPush {
    pub fn new(http: Client, url: String, service_key: String) -> Self {
        Self {
            http,
            url,
            service_key,
        }
    }

    pub async fn push(
        &self,
        org: &str,
        repo: &str,
        updates: &[PushDirective],
        pack: &Bytes,
        dry_run: bool,
        options: &BTreeMap<String, String>,
    ) -> Result<PushPackResult> {
        tracing::debug!(
            "pushing {} update(s), {} pack bytes via {}",
            updates.len(),
            pack.len(),
            self.url
        );

        let body = FunctionPushRequest {
            org,
            repo,
            updates,
            dry_run,
            options,
            pack: STANDARD.encode(pack),
        };

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;

        let body: PushResponseBody = response.json().await?;
        Ok(body.into())
    }
}
