use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::clients::google::DEFAULT_API_BASE_URL;
use crate::clients::secrets::{KeyVaultClient, SecretError};

const DEFAULT_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set in environment")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
    #[error("failed to read Google credentials file {path:?}: {source}")]
    CredentialsFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Secret(#[from] SecretError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

/// Where the Google service-account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialsSource {
    Inline(String),
    File(PathBuf),
    KeyVault {
        vault_uri: String,
        secret_name: String,
        access_token: String,
    },
}

impl CredentialsSource {
    pub async fn resolve(&self) -> Result<String, ConfigError> {
        match self {
            Self::Inline(json) => Ok(json.clone()),
            Self::File(path) => tokio::fs::read_to_string(path).await.map_err(|source| {
                ConfigError::CredentialsFile {
                    path: path.clone(),
                    source,
                }
            }),
            Self::KeyVault {
                vault_uri,
                secret_name,
                access_token,
            } => {
                let vault = KeyVaultClient::new(vault_uri, access_token.clone());
                Ok(vault.get_secret(secret_name).await?)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub store: StoreBackend,
    pub credentials: CredentialsSource,
    pub google_api_base_url: String,
    /// `None` disables the periodic sweep.
    pub sync_interval: Option<Duration>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let host = var("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = match var("PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { name: "PORT", value: raw })?,
            None => 8084,
        };

        let store = match var("STORE_BACKEND").as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("postgres") => StoreBackend::Postgres {
                database_url: var("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
            },
            Some("memory") => StoreBackend::Memory,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    name: "STORE_BACKEND",
                    value: other.to_string(),
                })
            }
        };

        let credentials = if let Some(json) = var("GOOGLE_CREDENTIALS_JSON") {
            CredentialsSource::Inline(json)
        } else if let Some(path) = var("GOOGLE_CREDENTIALS_FILE") {
            CredentialsSource::File(PathBuf::from(path))
        } else if let Some(secret_name) = var("GOOGLE_CREDENTIALS_SECRET") {
            CredentialsSource::KeyVault {
                vault_uri: var("KEY_VAULT_URI").ok_or(ConfigError::Missing("KEY_VAULT_URI"))?,
                secret_name,
                access_token: var("KEY_VAULT_TOKEN")
                    .ok_or(ConfigError::Missing("KEY_VAULT_TOKEN"))?,
            }
        } else {
            return Err(ConfigError::Missing("GOOGLE_CREDENTIALS_JSON"));
        };

        let google_api_base_url =
            var("GOOGLE_API_BASE_URL").unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        let sync_interval_secs = match var("SYNC_INTERVAL_SECS") {
            Some(raw) => raw.parse::<u64>().map_err(|_| ConfigError::Invalid {
                name: "SYNC_INTERVAL_SECS",
                value: raw,
            })?,
            None => DEFAULT_SYNC_INTERVAL_SECS,
        };

        Ok(Self {
            host,
            port,
            store,
            credentials,
            google_api_base_url,
            sync_interval: (sync_interval_secs > 0).then(|| Duration::from_secs(sync_interval_secs)),
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
