use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const KEY_VAULT_API_VERSION: &str = "7.4";

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("key vault request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("key vault returned {status} for secret '{name}': {body}")]
    Status {
        name: String,
        status: u16,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

/// Reads secrets from an Azure Key Vault over its REST API.
///
/// The bearer token is acquired outside this service and passed in as-is.
#[derive(Clone)]
pub struct KeyVaultClient {
    client: Client,
    vault_uri: String,
    access_token: String,
}

impl KeyVaultClient {
    pub fn new(vault_uri: &str, access_token: String) -> Self {
        Self {
            client: Client::new(),
            vault_uri: vault_uri.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    fn secret_url(&self, name: &str) -> String {
        format!("{}/secrets/{}", self.vault_uri, name)
    }

    pub async fn get_secret(&self, name: &str) -> Result<String, SecretError> {
        let response = self
            .client
            .get(self.secret_url(name))
            .query(&[("api-version", KEY_VAULT_API_VERSION)])
            .bearer_auth(&self.access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(SecretError::Status {
                name: name.to_string(),
                status,
                body,
            });
        }

        let bundle: SecretBundle = response.json().await?;
        log::info!("Resolved secret '{}' from key vault", name);
        Ok(bundle.value)
    }
}
