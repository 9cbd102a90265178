//! HTTP client for the relay git endpoints
//!
//! All paths are relative to the remote's API base:
//! - `GET  orgs/{org}/repos/{repo}/refs`
//! - `POST orgs/{org}/repos/{repo}/git/fetch`
//! - `POST orgs/{org}/repos/{repo}/git/push` (multipart/form-data)
//!
//! The bearer token is resolved only when a request is about to be sent without
//! an `Authorization` header.

mod function;
mod multipart;
mod types;

use std::{collections::BTreeMap, sync::Arc};

use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use futures_util::{StreamExt, TryStreamExt};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE},
    Body, Client, RequestBuilder, Response,
};

pub use function::FunctionPush;
pub use multipart::MultipartWriter;
pub(crate) use types::PushResponseBody;
pub use types::{
    FetchPackResult, FetchRequest, ListRefsResult, PushDirective, PushMetadata, PushPackResult,
    RefResult,
};
use types::FetchResponseBody;

use crate::{
    auth::TokenResolver,
    error::{Error, Result},
    pack::{ByteStream, PackPayload},
};

pub struct PushRequest<'a> {
    pub org: &'a str,
    pub repo: &'a str,
    pub updates: &'a [PushDirective],
    pub pack: PackPayload,
    pub dry_run: bool,
    pub options: &'a BTreeMap<String, String>,
}

pub struct SyncClient {
    http: Client,
    base_url: String,
    tokens: Arc<TokenResolver>,
}

impl SyncClient {
    pub fn new(http: Client, base_url: impl Into<String>, tokens: Arc<TokenResolver>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn repo_url(&self, org: &str, repo: &str, suffix: &str) -> String {
        format!(
            "{}/orgs/{}/repos/{}/{}",
            self.base_url,
            utf8_percent_encode(org, NON_ALPHANUMERIC),
            utf8_percent_encode(repo, NON_ALPHANUMERIC),
            suffix
        )
    }

    /// Send a request, attaching the bearer token unless one is already set
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let mut request = builder.build()?;
        if !request.headers().contains_key(AUTHORIZATION) {
            if let Some(token) = self.tokens.resolve_token().await {
                let value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| Error::Config(format!("invalid token: {}", e)))?;
                request.headers_mut().insert(AUTHORIZATION, value);
            }
        }
        let response = self.http.execute(request).await?;
        check_status(response).await
    }

    pub async fn list_refs(&self, org: &str, repo: &str) -> Result<ListRefsResult> {
        let url = self.repo_url(org, repo, "refs");
        tracing::debug!("listing refs from {}", url);
        let response = self.send(self.http.get(url)).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_pack(
        &self,
        org: &str,
        repo: &str,
        request: FetchRequest,
    ) -> Result<FetchPackResult> {
        let request = FetchRequest {
            wants: dedupe(request.wants),
            haves: dedupe(request.haves),
            shallow: dedupe(request.shallow),
            depth: request.depth,
        };
        let url = self.repo_url(org, repo, "git/fetch");
        tracing::debug!("fetching {} want(s) from {}", request.wants.len(), url);

        let response = self.send(self.http.post(url).json(&request)).await?;

        if !is_json(&response) {
            return Ok(FetchPackResult {
                size_hint: response.content_length(),
                payload: PackPayload::Lazy(body_stream(response)),
                keep: None,
            });
        }

        let body: FetchResponseBody = response.json().await?;

        if let Some(pack) = body.pack {
            let bytes = decode_pack(&pack, body.pack_encoding.as_deref())?;
            tracing::debug!("received inline pack of {} bytes", bytes.len());
            return Ok(FetchPackResult {
                size_hint: Some(bytes.len() as u64),
                payload: PackPayload::InMemory(bytes),
                keep: body.keep,
            });
        }

        if let Some(pack_url) = body.pack_url {
            tracing::debug!("downloading pack from {}", pack_url);
            let mut download = self.http.get(&pack_url);
            for (name, value) in body.pack_headers.iter().flatten() {
                download = download.header(name, value);
            }
            let response = check_status(download.send().await?).await?;
            return Ok(FetchPackResult {
                size_hint: response.content_length(),
                payload: PackPayload::Lazy(body_stream(response)),
                keep: body.keep,
            });
        }

        Err(Error::protocol("unexpected fetch response"))
    }

    pub async fn push_pack(&self, request: PushRequest<'_>) -> Result<PushPackResult> {
        let url = self.repo_url(request.org, request.repo, "git/push");
        let metadata = PushMetadata {
            updates: request.updates,
            dry_run: request.dry_run,
            options: request.options,
        };

        let writer = MultipartWriter::new();
        let content_type = writer.content_type();
        let content_length = writer.content_length(&metadata, &request.pack)?;
        let body = writer.into_stream(&metadata, request.pack)?;

        tracing::debug!("pushing {} update(s) to {}", request.updates.len(), url);
        let mut builder = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(Body::wrap_stream(body));
        if let Some(len) = content_length {
            builder = builder.header(CONTENT_LENGTH, len);
        }

        let response = self.send(builder).await?;
        let body: PushResponseBody = response.json().await?;
        Ok(body.into())
    }
}

/// Fail with `Error::Http` unless the status is 2xx
pub(crate) async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::Http {
        status: status.as_u16(),
        body,
    })
}

fn is_json(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim_start().to_ascii_lowercase().starts_with("application/json"))
        .unwrap_or(false)
}

fn body_stream(response: Response) -> ByteStream {
    response.bytes_stream().map_err(Error::from).boxed()
}

fn decode_pack(pack: &str, encoding: Option<&str>) -> Result<Bytes> {
    let bytes = match encoding.unwrap_or("base64") {
        "base64" => STANDARD
            .decode(pack.trim())
            .map_err(|e| Error::Decode(format!("invalid base64 pack: {}", e)))?,
        "hex" => hex::decode(pack.trim())
            .map_err(|e| Error::Decode(format!("invalid hex pack: {}", e)))?,
        other => {
            return Err(Error::protocol(format!("unsupported pack encoding: {}", other)));
        }
    };
    Ok(Bytes::from(bytes))
}

/// Drop repeats, keeping first-occurrence order
pub fn dedupe(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
