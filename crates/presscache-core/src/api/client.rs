//! Client for the remote content API.
//!
//! `RemoteClient` is the capability the session manager and fetch cache are
//! written against; `HttpClient` is the reqwest implementation used in
//! production.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::auth::Credential;
use crate::config::{Endpoints, HttpOptions};
use crate::models::{ContentItem, ContentPath, ContentResponse};

use super::ApiError;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 500;

/// The three remote calls the core depends on.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Exchange a username/password for a bearer token.
    async fn request_token(&self, credential: &Credential) -> Result<String, ApiError>;

    /// Ask the remote about a token and return the status code it reports.
    async fn validate_token(&self, token: &str) -> Result<String, ApiError>;

    /// Fetch one content item with the given bearer token.
    async fn fetch_content(&self, token: &str, path: &ContentPath) -> Result<ContentItem, ApiError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    code: String,
}

/// reqwest-backed `RemoteClient`.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
    rate_limit_retries: u32,
}

impl HttpClient {
    pub fn new(base_url: &str, endpoints: Endpoints, options: &HttpOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            endpoints,
            rate_limit_retries: options.rate_limit_retries,
        })
    }

    fn url(&self, prefix: &str, rest: &str) -> String {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}", self.base_url, rest)
        } else {
            format!("{}/{}/{}", self.base_url, prefix, rest)
        }
    }

    fn token_url(&self) -> String {
        self.url(&self.endpoints.auth, "token")
    }

    fn validate_url(&self) -> String {
        self.url(&self.endpoints.auth, "token/validate")
    }

    fn content_url(&self, path: &ContentPath) -> String {
        self.url(&self.endpoints.content, &path.to_string())
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: Response) -> Result<Option<Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request, backing off and resending while the remote answers 429.
    async fn send(&self, url: &str, build: impl Fn() -> RequestBuilder) -> Result<Response, ApiError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > self.rate_limit_retries {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

#[async_trait]
impl RemoteClient for HttpClient {
    async fn request_token(&self, credential: &Credential) -> Result<String, ApiError> {
        let url = self.token_url();
        debug!(url = %url, username = %credential.username, "Requesting token");

        let response = self
            .send(&url, || {
                self.client
                    .post(&url)
                    .header(header::ACCEPT, "application/json")
                    .json(credential)
            })
            .await?;

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("token response: {}", e)))?;

        if parsed.token.is_empty() {
            return Err(ApiError::InvalidResponse("token response: empty token".to_string()));
        }
        Ok(parsed.token)
    }

    async fn validate_token(&self, token: &str) -> Result<String, ApiError> {
        let url = self.validate_url();
        debug!(url = %url, "Validating token");

        let response = self
            .send(&url, || self.client.post(&url).bearer_auth(token))
            .await?;

        let parsed: ValidateResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("validate response: {}", e)))?;
        Ok(parsed.code)
    }

    async fn fetch_content(&self, token: &str, path: &ContentPath) -> Result<ContentItem, ApiError> {
        let url = self.content_url(path);
        debug!(url = %url, "Fetching content");

        let response = self
            .send(&url, || self.client.get(&url).bearer_auth(token))
            .await?;

        let text = response.text().await?;
        let parsed: ContentResponse = serde_json::from_str(&text)
            .map_err(|e| ApiError::InvalidResponse(format!("content response for {}: {}", path, e)))?;
        Ok(parsed.into())
    }
}
