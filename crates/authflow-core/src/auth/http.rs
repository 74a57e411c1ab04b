//! REST credential client.
//!
//! Registration and login post the transport secret as a form field and
//! expect a JSON body carrying the session token. Logout revokes the token
//! the client is currently holding.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::{header, Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::config::HttpClientConfig;
use crate::error::CredentialError;
use crate::models::SessionToken;

use super::{CredentialClient, CredentialResult};

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    token: Option<String>,
}

/// HTTP client for the credential service.
/// The underlying reqwest::Client is shared; only the held token is mutable.
pub struct HttpCredentialClient {
    client: Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl HttpCredentialClient {
    pub fn new(config: &HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: Mutex::new(None),
        })
    }

    fn user_url(&self, username: &str, action: &str) -> String {
        format!("{}/users/{}/{}", self.base_url, username, action)
    }

    fn held_token(&self) -> Option<String> {
        self.token
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn hold_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn check_response(response: Response) -> CredentialResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CredentialError::from_status(status, &body))
    }

    async fn authenticate(
        &self,
        username: &str,
        secret: &str,
        action: &str,
    ) -> CredentialResult<Option<SessionToken>> {
        let url = self.user_url(username, action);
        debug!(%url, "Sending credential request");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(&[("secret", secret)])
            .send()
            .await?;

        let response = Self::check_response(response).await?;

        let body = response.text().await?;
        let token = if body.trim().is_empty() {
            None
        } else {
            let auth: AuthResponse = serde_json::from_str(&body)
                .map_err(|e| CredentialError::InvalidResponse(e.to_string()))?;
            auth.token
        };

        if token.is_some() {
            self.hold_token(token.clone());
        }
        Ok(token.map(SessionToken::new))
    }

    async fn revoke(&self) -> CredentialResult<()> {
        let url = format!("{}/logout", self.base_url);
        let mut request = self.client.post(&url);
        if let Some(token) = self.held_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        Self::check_response(response).await?;
        self.hold_token(None);
        Ok(())
    }
}

impl CredentialClient for HttpCredentialClient {
    fn register<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.authenticate(username, secret, "register").boxed()
    }

    fn login<'a>(
        &'a self,
        username: &'a str,
        secret: &'a str,
    ) -> BoxFuture<'a, CredentialResult<Option<SessionToken>>> {
        self.authenticate(username, secret, "authenticate").boxed()
    }

    fn logout(&self) -> BoxFuture<'_, CredentialResult<()>> {
        self.revoke().boxed()
    }
}
