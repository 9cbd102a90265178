use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const DEFAULT_TOKEN_FUNCTION: &str = "git-token";
const DEFAULT_PUSH_FUNCTION: &str = "git-push";

/// Direct token overrides, checked in order.
const TOKEN_ENV_VARS: &[&str] = &[
    "GIT_REMOTE_RELAY_TOKEN",
    "RELAY_TOKEN",
    "RELAY_ACCESS_TOKEN",
];

const SERVICE_KEY_ENV_VARS: &[&str] = &["SUPABASE_SERVICE_ROLE_KEY", "SUPABASE_SERVICE_KEY"];

/// How the push pipeline delivers the pack to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PushTransport {
    /// `POST .../git/push` as multipart/form-data on the remote endpoint
    Multipart,
    /// JSON call to a hosted function with the pack base64-encoded
    Function,
}

/// Configuration for git-remote-relay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Bearer token used as-is, bypassing the mint endpoint
    #[serde(default)]
    pub token: Option<String>,
    /// Base URL of the hosted functions service
    #[serde(default)]
    pub service_url: Option<String>,
    /// Service key for the hosted functions service
    #[serde(default)]
    pub service_key: Option<String>,
    #[serde(default)]
    pub token_function: Option<String>,
    #[serde(default)]
    pub push_function: Option<String>,
    /// Forced push transport; derived from the service settings when unset
    #[serde(default)]
    pub push_transport: Option<PushTransport>,
    #[serde(default = "defaults::connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    /// Git binary used to spawn `index-pack`
    #[serde(default)]
    pub git_binary: Option<PathBuf>,
}

impl RelayConfig {
    /// Load configuration from the optional config file, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        tracing::debug!("loading git-remote-relay config from {:?}", config_path);
        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(token) = first_env(TOKEN_ENV_VARS) {
            self.token = Some(token);
        }

        if let Ok(url) = env::var("SUPABASE_URL") {
            self.service_url = Some(url);
        }

        if let Some(key) = first_env(SERVICE_KEY_ENV_VARS) {
            self.service_key = Some(key);
        }

        if let Ok(name) = env::var("RELAY_TOKEN_FUNCTION") {
            self.token_function = Some(name);
        }

        if let Ok(name) = env::var("RELAY_PUSH_FUNCTION") {
            self.push_function = Some(name);
        }

        if let Ok(transport) = env::var("RELAY_PUSH_TRANSPORT") {
            self.push_transport = Some(match transport.as_str() {
                "multipart" => PushTransport::Multipart,
                "function" => PushTransport::Function,
                other => anyhow::bail!("Unknown RELAY_PUSH_TRANSPORT: {}", other),
            });
        }

        if let Ok(secs) = env::var("RELAY_CONNECT_TIMEOUT_SECS") {
            self.connect_timeout_secs = secs
                .parse()
                .context("Failed to parse RELAY_CONNECT_TIMEOUT_SECS as u64")?;
        }

        if let Ok(secs) = env::var("RELAY_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = Some(
                secs.parse()
                    .context("Failed to parse RELAY_REQUEST_TIMEOUT_SECS as u64")?,
            );
        }

        if let Ok(path) = env::var("RELAY_GIT_BINARY") {
            self.git_binary = Some(PathBuf::from(path));
        }

        Ok(())
    }

    /// Get default config file path
    pub fn config_file_path() -> Result<PathBuf> {
        dirs::home_dir()
            .map(|home| home.join(".config/git-remote-relay/config.yaml"))
            .context("Could not determine home directory for config file")
    }

    /// Service base URL and key, when both are configured
    pub fn service(&self) -> Option<(&str, &str)> {
        match (self.service_url.as_deref(), self.service_key.as_deref()) {
            (Some(url), Some(key)) if !url.is_empty() && !key.is_empty() => {
                Some((url.trim_end_matches('/'), key))
            }
            _ => None,
        }
    }

    /// URL of a hosted function, e.g. `{service_url}/functions/v1/git-token`
    pub fn function_url(&self, name: &str) -> Option<String> {
        self.service()
            .map(|(url, _)| format!("{}/functions/v1/{}", url, name))
    }

    pub fn token_function(&self) -> &str {
        self.token_function
            .as_deref()
            .unwrap_or(DEFAULT_TOKEN_FUNCTION)
    }

    pub fn push_function(&self) -> &str {
        self.push_function.as_deref().unwrap_or(DEFAULT_PUSH_FUNCTION)
    }

    pub fn push_transport(&self) -> PushTransport {
        match self.push_transport {
            Some(transport) => transport,
            None if self.service().is_some() => PushTransport::Function,
            None => PushTransport::Multipart,
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn git_binary(&self) -> &Path {
        self.git_binary
            .as_deref()
            .unwrap_or_else(|| Path::new("git"))
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            token: None,
            service_url: None,
            service_key: None,
            token_function: None,
            push_function: None,
            push_transport: None,
            connect_timeout_secs: defaults::connect_timeout_secs(),
            request_timeout_secs: None,
            git_binary: None,
        }
    }
}

fn first_env(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|value| !value.is_empty())
}

mod defaults {
    pub(crate) fn connect_timeout_secs() -> u64 {
        30
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_from_file() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(
            &config_path,
            r#"
service_url: https://example.supabase.co/
service_key: secret
push_function: custom-push
"#,
        )
        .unwrap();

        let config = RelayConfig::load_from_file(&config_path).unwrap();
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.push_function(), "custom-push");
        assert_eq!(config.token_function(), "git-token");
        assert_eq!(
            config.function_url("git-token").as_deref(),
            Some("https://example.supabase.co/functions/v1/git-token")
        );
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("config.yaml");
        std::fs::write(&config_path, "bogus: 1\n").unwrap();

        assert!(RelayConfig::load_from_file(&config_path).is_err());
    }

    #[test]
    fn test_push_transport_follows_service() {
        let mut config = RelayConfig::default();
        assert_eq!(config.push_transport(), PushTransport::Multipart);

        config.service_url = Some("https://example.supabase.co".to_string());
        assert_eq!(config.push_transport(), PushTransport::Multipart);

        config.service_key = Some("key".to_string());
        assert_eq!(config.push_transport(), PushTransport::Function);

        config.push_transport = Some(PushTransport::Multipart);
        assert_eq!(config.push_transport(), PushTransport::Multipart);
    }

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.git_binary(), Path::new("git"));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
        assert_eq!(config.request_timeout(), None);
        assert!(config.service().is_none());
    }
}
