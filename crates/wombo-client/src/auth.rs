//! Anonymous credential acquisition
//!
//! Dream's web app signs every visitor up anonymously against its identity
//! provider. We repeat the same three steps:
//! 1. Scrape the `_app-<token>` bundle name from the creation page
//! 2. Scrape the `"AI…"` API key out of that bundle
//! 3. Exchange the key for an `idToken` via anonymous sign-up
//!
//! Nothing is cached: every [`CredentialSource::acquire`] call performs all
//! three round trips.

use async_trait::async_trait;
use serde::Deserialize;
use std::env;
use tracing::{debug, info, instrument};
use wombo_core::config::{Endpoints, Timeouts};
use wombo_core::{Credential, DreamConfig, DreamError, Result};

use crate::headers;
use crate::retry::{with_retries, RetryPolicy};
use crate::scrape::{extract_api_key, extract_bundle_token};
use crate::transport::{HttpRequest, Transport};

/// Environment variable holding a pre-obtained token
pub const TOKEN_ENV_VAR: &str = "WOMBO_ID_TOKEN";

/// Anything that can hand out a bearer credential
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn acquire(&self) -> Result<Credential>;
}

/// Fixed, caller-supplied credential
#[derive(Debug, Clone)]
pub struct StaticCredential {
    credential: Credential,
}

impl StaticCredential {
    pub fn new(id_token: impl Into<String>) -> Self {
        Self {
            credential: Credential::new(id_token),
        }
    }
}

#[async_trait]
impl CredentialSource for StaticCredential {
    async fn acquire(&self) -> Result<Credential> {
        Ok(self.credential.clone())
    }
}

/// Read a token from `WOMBO_ID_TOKEN`, if set and non-empty
pub fn token_from_env() -> Option<StaticCredential> {
    match env::var(TOKEN_ENV_VAR) {
        Ok(token) if !token.trim().is_empty() => {
            info!("Using {} token", TOKEN_ENV_VAR);
            Some(StaticCredential::new(token.trim()))
        }
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: Option<String>,
}

/// Scrapes and exchanges a fresh anonymous credential on every call
#[derive(Debug, Clone)]
pub struct AnonymousCredentials<T: Transport> {
    transport: T,
    endpoints: Endpoints,
    timeouts: Timeouts,
    retry: RetryPolicy,
}

impl<T: Transport> AnonymousCredentials<T> {
    pub fn new(transport: T, config: &DreamConfig) -> Self {
        Self {
            transport,
            endpoints: config.endpoints.clone(),
            timeouts: config.timeouts.clone(),
            retry: RetryPolicy::from(&config.retry),
        }
    }

    async fn fetch_page(&self, url: &str) -> Result<String> {
        let response = with_retries(self.retry, "page fetch", || {
            self.transport
                .execute(HttpRequest::get(url).timeout(self.timeouts.page()))
        })
        .await?;

        if !response.is_success() {
            return Err(DreamError::Network(format!(
                "GET {} returned {}",
                url, response.status
            )));
        }
        Ok(response.text())
    }

    /// Step 1: bundle token from the creation page
    pub async fn bundle_token(&self) -> Result<String> {
        let html = self.fetch_page(&self.endpoints.create_page).await?;
        let token = extract_bundle_token(&html)?;
        debug!("Found app bundle token {}", token);
        Ok(token)
    }

    /// Step 2: API key from the app bundle
    pub async fn api_key(&self, bundle_token: &str) -> Result<String> {
        let bundle = self
            .fetch_page(&self.endpoints.bundle_url(bundle_token))
            .await?;
        extract_api_key(&bundle)
    }

    /// Step 3: exchange the API key for an `idToken`
    pub async fn exchange(&self, api_key: &str) -> Result<Credential> {
        let request = HttpRequest::post(&self.endpoints.identity_url)
            .query("key", api_key)
            .headers(headers::identity_headers())
            .timeout(self.timeouts.identity())
            .json(&serde_json::json!({ "returnSecureToken": true }))?;

        let response = with_retries(self.retry, "identity exchange", || {
            self.transport.execute(request.clone())
        })
        .await?;

        if !response.is_success() {
            return Err(DreamError::Auth(format!(
                "identity exchange rejected with {}: {}",
                response.status,
                response.snippet()
            )));
        }

        let body: SignUpResponse = response
            .json()
            .map_err(|e| DreamError::Auth(format!("malformed identity response: {}", e)))?;

        body.id_token
            .filter(|t| !t.is_empty())
            .map(Credential::new)
            .ok_or_else(|| DreamError::Auth("identity response has no idToken".to_string()))
    }
}

#[async_trait]
impl<T: Transport> CredentialSource for AnonymousCredentials<T> {
    #[instrument(skip(self))]
    async fn acquire(&self) -> Result<Credential> {
        let token = self.bundle_token().await?;
        let api_key = self.api_key(&token).await?;
        let credential = self.exchange(&api_key).await?;
        info!("Acquired anonymous credential");
        Ok(credential)
    }
}
