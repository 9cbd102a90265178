use std::{collections::BTreeMap, sync::Arc};

use crate::{
    auth::{MintEndpoint, TokenResolver},
    client::SyncClient,
    config::RelayConfig,
    error::{Error, Result},
    pack::PackSink,
    remote::RemoteReference,
};

/// State for one helper invocation: the remote, its client, and git's options.
///
/// The remote is resolved from the first `relay::` token seen and never changes
/// afterwards. A remote without a usable API base leaves `client` empty and the
/// commands fall back to their disconnected replies.
pub struct Session {
    config: RelayConfig,
    http: reqwest::Client,
    indexer: Box<dyn PackSink>,
    remote: Option<RemoteReference>,
    client: Option<SyncClient>,
    options: BTreeMap<String, String>,
}

impl Session {
    pub fn new(config: RelayConfig, indexer: Box<dyn PackSink>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("git-remote-relay/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(config.connect_timeout());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;

        Ok(Self {
            config,
            http,
            indexer,
            remote: None,
            client: None,
            options: BTreeMap::new(),
        })
    }

    /// Offer candidate tokens for remote resolution; a no-op once resolved
    pub fn observe<I, S>(&mut self, tokens: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if self.remote.is_some() {
            return;
        }
        let Some(remote) = RemoteReference::resolve(tokens) else {
            return;
        };

        tracing::info!("resolved remote {}/{}", remote.org, remote.repo);
        self.client = self.connect(&remote);
        if self.client.is_none() {
            tracing::warn!("remote {} has no reachable endpoint", remote);
        }
        self.remote = Some(remote);
    }

    fn connect(&self, remote: &RemoteReference) -> Option<SyncClient> {
        let base = remote.api_base().or_else(|| {
            self.config
                .service()
                .map(|(url, _)| format!("{}{}", url, remote.base_path))
        })?;

        let remote_url = format!("{}/orgs/{}/repos/{}", base, remote.org, remote.repo);
        let mint = self.config.service().and_then(|(_, key)| {
            self.config
                .function_url(self.config.token_function())
                .map(|url| MintEndpoint {
                    url,
                    service_key: key.to_string(),
                })
        });
        let tokens = TokenResolver::new(
            self.config.token.clone(),
            mint,
            remote_url,
            self.http.clone(),
        );

        Some(SyncClient::new(self.http.clone(), base, Arc::new(tokens)))
    }

    pub fn remote(&self) -> Option<&RemoteReference> {
        self.remote.as_ref()
    }

    /// Remote and client together, or why they are unavailable
    pub fn connection(&self) -> Result<(&RemoteReference, &SyncClient)> {
        match (&self.remote, &self.client) {
            (Some(remote), Some(client)) => Ok((remote, client)),
            (None, _) => Err(Error::ReferenceUnresolved),
            (Some(remote), None) => Err(Error::Config(format!(
                "no endpoint for remote {}; set SUPABASE_URL or use a full URL",
                remote
            ))),
        }
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn indexer(&self) -> &dyn PackSink {
        self.indexer.as_ref()
    }

    pub fn set_option(&mut self, name: &str, value: &str) {
        self.options.insert(name.to_string(), value.to_string());
    }

    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    pub fn dry_run(&self) -> bool {
        self.options.get("dry-run").map(String::as_str) == Some("true")
    }

    pub fn depth(&self) -> Option<u32> {
        self.options.get("depth").and_then(|depth| depth.parse().ok())
    }

    /// git sends `option verbosity <n>`; 1 is the default, 0 is `--quiet`
    pub fn show_progress(&self) -> bool {
        self.options
            .get("verbosity")
            .and_then(|v| v.parse::<u32>().ok())
            .is_some_and(|v| v > 1)
            || self.options.get("progress").map(String::as_str) == Some("true")
    }
}
