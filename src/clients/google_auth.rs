// OAuth2 for Google service accounts: sign a JWT with the account's private
// key, exchange it at the token endpoint, cache the bearer token until shortly
// before it expires.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::GoogleApiError;

pub const BUSINESS_PROFILE_SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/business.manage",
    "https://www.googleapis.com/auth/businessprofileperformance",
];

const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const ASSERTION_LIFETIME_SECS: u64 = 3600;
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.to_string()
}

/// The subset of a service-account JSON key this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    #[serde(rename = "type", default)]
    pub account_type: Option<String>,
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct JwtClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now() + REFRESH_MARGIN
    }
}

pub struct ServiceAccountAuth {
    credentials: ServiceAccountCredentials,
    scopes: Vec<String>,
    client: Client,
    cached_token: RwLock<Option<CachedToken>>,
}

impl ServiceAccountAuth {
    pub fn from_json(json: &str) -> Result<Self, GoogleApiError> {
        let credentials: ServiceAccountCredentials = serde_json::from_str(json)
            .map_err(|err| GoogleApiError::Credentials(err.to_string()))?;

        if let Some(kind) = credentials.account_type.as_deref() {
            if kind != "service_account" {
                return Err(GoogleApiError::Credentials(format!(
                    "expected a service_account key, got '{kind}'"
                )));
            }
        }

        Ok(Self {
            credentials,
            scopes: BUSINESS_PROFILE_SCOPES.iter().map(|s| s.to_string()).collect(),
            client: Client::new(),
            cached_token: RwLock::new(None),
        })
    }

    pub fn client_email(&self) -> &str {
        &self.credentials.client_email
    }

    /// Returns a bearer token, exchanging a fresh assertion when the cached one is stale.
    pub async fn access_token(&self) -> Result<String, GoogleApiError> {
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
                return Ok(token.token.clone());
            }
        }

        let mut cached = self.cached_token.write().await;
        // Another task may have refreshed while we waited for the write lock.
        if let Some(token) = cached.as_ref().filter(|token| token.is_fresh()) {
            return Ok(token.token.clone());
        }

        let response = self.exchange_assertion().await?;
        let lifetime = Duration::from_secs(response.expires_in.unwrap_or(ASSERTION_LIFETIME_SECS));
        let token = response.access_token;
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        log::debug!("Refreshed Google access token for {}", self.credentials.client_email);
        Ok(token)
    }

    fn signed_assertion(&self, now: u64) -> Result<String, GoogleApiError> {
        let claims = JwtClaims {
            iss: &self.credentials.client_email,
            scope: self.scopes.join(" "),
            aud: &self.credentials.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };

        let key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())?;
        Ok(encode(&Header::new(Algorithm::RS256), &claims, &key)?)
    }

    async fn exchange_assertion(&self) -> Result<TokenResponse, GoogleApiError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let assertion = self.signed_assertion(now)?;

        let response = self
            .client
            .post(&self.credentials.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GoogleApiError::TokenExchange { status, body });
        }

        Ok(response.json().await?)
    }
}
