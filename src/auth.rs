//! Bearer token resolution
//!
//! A directly configured token always wins. Otherwise one request is made to the
//! token-mint function and its outcome, success or not, is reused for the rest of
//! the process. Failures resolve to no token; the request then goes out
//! unauthenticated and the server answers with its own 401.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MintRequest<'a> {
    remote_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct MintResponse {
    token: Option<String>,
}

/// Where and how to mint a token
#[derive(Debug, Clone)]
pub struct MintEndpoint {
    pub url: String,
    pub service_key: String,
}

pub struct TokenResolver {
    direct: Option<String>,
    mint: Option<MintEndpoint>,
    remote_url: String,
    http: Client,
    minted: OnceCell<Option<String>>,
}

impl TokenResolver {
    pub fn new(
        direct: Option<String>,
        mint: Option<MintEndpoint>,
        remote_url: String,
        http: Client,
    ) -> Self {
        Self {
            direct: direct.filter(|token| !token.is_empty()),
            mint,
            remote_url,
            http,
            minted: OnceCell::new(),
        }
    }

    /// Resolver that only ever returns `token`
    #[cfg(test)]
    pub fn fixed(token: Option<&str>) -> Self {
        Self::new(token.map(str::to_string), None, String::new(), Client::new())
    }

    pub async fn resolve_token(&self) -> Option<String> {
        if let Some(token) = &self.direct {
            return Some(token.clone());
        }

        self.minted
            .get_or_init(|| async {
                match self.mint().await {
                    Ok(token) => token,
                    Err(e) => {
                        tracing::warn!("token mint failed, continuing unauthenticated: {}", e);
                        None
                    }
                }
            })
            .await
            .clone()
    }

    async fn mint(&self) -> crate::error::Result<Option<String>> {
        let Some(endpoint) = &self.mint else {
            tracing::debug!("no token mint endpoint configured");
            return Ok(None);
        };

        tracing::debug!("minting token for {}", self.remote_url);
        let response = self
            .http
            .post(&endpoint.url)
            .bearer_auth(&endpoint.service_key)
            .header("apikey", &endpoint.service_key)
            .json(&MintRequest {
                remote_url: &self.remote_url,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(crate::error::Error::Http {
                status: status.as_u16(),
                body,
            });
        }

        let minted: MintResponse = response.json().await?;
        if minted.token.is_some() {
            tracing::info!("minted access token for {}", self.remote_url);
        }
        Ok(minted.token.filter(|token| !token.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use wiremock::{
        matchers::{body_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;

    fn resolver(server: &MockServer, direct: Option<&str>) -> TokenResolver {
        TokenResolver::new(
            direct.map(str::to_string),
            Some(MintEndpoint {
                url: format!("{}/functions/v1/git-token", server.uri()),
                service_key: "service".to_string(),
            }),
            "https://h/orgs/acme/repos/infra".to_string(),
            Client::new(),
        )
    }

    #[tokio::test]
    async fn test_direct_token_skips_mint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let resolver = resolver(&server, Some("direct"));
        assert_eq!(resolver.resolve_token().await.as_deref(), Some("direct"));
        assert_eq!(resolver.resolve_token().await.as_deref(), Some("direct"));
    }

    #[tokio::test]
    async fn test_mint_called_once() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/functions/v1/git-token"))
            .and(header("authorization", "Bearer service"))
            .and(body_json(serde_json::json!({
                "remoteUrl": "https://h/orgs/acme/repos/infra"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"token": "minted"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server, None);
        assert_eq!(resolver.resolve_token().await.as_deref(), Some("minted"));
        assert_eq!(resolver.resolve_token().await.as_deref(), Some("minted"));
    }

    #[tokio::test]
    async fn test_mint_failure_yields_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let resolver = resolver(&server, None);
        assert_eq!(resolver.resolve_token().await, None);
        assert_eq!(resolver.resolve_token().await, None);
    }

    #[tokio::test]
    async fn test_no_mint_endpoint() {
        let resolver = TokenResolver::fixed(None);
        assert_eq!(resolver.resolve_token().await, None);
    }
}
