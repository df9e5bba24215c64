// Where the API key comes from. The key is never part of a config file itself.

use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const DEFAULT_KEY_VAR: &str = "DEEPSEEK_API_KEY";
pub const DEFAULT_VAULT_TOKEN_VAR: &str = "VAULT_TOKEN";
pub const DEFAULT_VAULT_FIELD: &str = "api_key";

/// Bearer credential for the chat API
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Result<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(ChatError::Credential("API key is empty".to_string()));
        }
        Ok(Self { key })
    }

    pub fn to_header(&self) -> String {
        format!("Bearer {}", self.key)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Configured origin of the API key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum CredentialSource {
    /// Read from an environment variable
    Env {
        #[serde(default = "default_key_var")]
        var: String,
    },

    /// First non-empty line of a file
    File { path: PathBuf },

    /// Vault KV secret, read over HTTP with a token taken from the environment
    Vault {
        addr: String,
        path: String,
        #[serde(default = "default_vault_field")]
        field: String,
        #[serde(default = "default_vault_token_var")]
        token_var: String,
    },
}

fn default_key_var() -> String {
    DEFAULT_KEY_VAR.to_string()
}

fn default_vault_field() -> String {
    DEFAULT_VAULT_FIELD.to_string()
}

fn default_vault_token_var() -> String {
    DEFAULT_VAULT_TOKEN_VAR.to_string()
}

impl Default for CredentialSource {
    fn default() -> Self {
        CredentialSource::Env {
            var: default_key_var(),
        }
    }
}

impl CredentialSource {
    pub async fn resolve(&self) -> Result<ApiKey> {
        match self {
            CredentialSource::Env { var } => {
                let key = std::env::var(var).map_err(|_| {
                    ChatError::Credential(format!("{} environment variable is required", var))
                })?;
                ApiKey::new(key)
            }
            CredentialSource::File { path } => {
                let text = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ChatError::Credential(format!("Failed to read {}: {}", path.display(), e))
                })?;
                let key = text
                    .lines()
                    .map(str::trim)
                    .find(|line| !line.is_empty())
                    .ok_or_else(|| {
                        ChatError::Credential(format!("{} contains no key", path.display()))
                    })?;
                ApiKey::new(key)
            }
            CredentialSource::Vault {
                addr,
                path,
                field,
                token_var,
            } => resolve_vault(addr, path, field, token_var).await,
        }
    }
}

async fn resolve_vault(addr: &str, path: &str, field: &str, token_var: &str) -> Result<ApiKey> {
    let token = std::env::var(token_var).map_err(|_| {
        ChatError::Credential(format!("{} environment variable is required", token_var))
    })?;

    let url = format!(
        "{}/v1/{}",
        addr.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    tracing::debug!("Reading API key from vault at {}", url);

    let response = reqwest::Client::new()
        .get(&url)
        .header("X-Vault-Token", token)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(ChatError::Credential(format!(
            "Vault returned {} for {}: {}",
            status, path, body
        )));
    }

    let secret: serde_json::Value = response
        .json()
        .await
        .map_err(|e| ChatError::Credential(format!("Invalid vault response: {}", e)))?;

    // KV v2 nests the secret one level deeper than KV v1
    let value = secret
        .pointer(&format!("/data/data/{}", field))
        .or_else(|| secret.pointer(&format!("/data/{}", field)))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            ChatError::Credential(format!("Vault secret {} has no field {}", path, field))
        })?;

    ApiKey::new(value)
}
