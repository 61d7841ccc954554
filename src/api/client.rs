//! HTTP client for the shop API.
//!
//! Every remote call in the crate goes through [`ApiClient`], which owns the
//! base URL, the timeouts, and the credential transport policy.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::{ApiConfig, CredentialMode};
use crate::{CellarError, Result};

/// Shared HTTP client bound to one API base URL.
#[derive(Debug)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    credentials: CredentialMode,
    /// Bearer token attached in `Include` mode.
    token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a client from configuration.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        let http = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .cookie_store(config.credentials.is_include())
            .build()
            .map_err(|e| CellarError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            credentials: config.credentials,
            token: RwLock::new(None),
        })
    }

    /// Create a client for `base_url` with default timeouts.
    pub fn with_base_url(base_url: &str, credentials: CredentialMode) -> Result<Self> {
        Self::new(&ApiConfig {
            base_url: base_url.to_string(),
            credentials,
            ..ApiConfig::default()
        })
    }

    /// Base URL all paths are resolved against.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Credential transport mode.
    pub fn credentials(&self) -> CredentialMode {
        self.credentials
    }

    /// Install or clear the bearer token sent in `Include` mode.
    pub fn set_bearer_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
    }

    /// Check if a bearer token is installed.
    pub fn has_bearer_token(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Resolve an endpoint path against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| CellarError::Config(format!("invalid endpoint path {path}: {e}")))
    }

    /// Start a request carrying the stored credentials (if the mode allows).
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let builder = self.http.request(method, self.url(path)?);
        if !self.credentials.is_include() {
            return Ok(builder);
        }
        let token = self
            .token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Ok(match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    /// Start a request authenticated with an explicit bearer token.
    ///
    /// The stored token is not sent.
    pub fn request_with_token(
        &self,
        method: Method,
        path: &str,
        token: &str,
    ) -> Result<RequestBuilder> {
        Ok(self.http.request(method, self.url(path)?).bearer_auth(token))
    }

    /// Send a prepared request.
    ///
    /// Non-success statuses are turned into [`CellarError::Http`] with the
    /// message and code the server put in the body.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            warn!("API request failed: {}", e);
            CellarError::Transport(e.to_string())
        })?;

        let status = response.status();
        let url = response.url().path().to_string();
        if status.is_success() {
            debug!(%status, path = %url, "API response");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = CellarError::from_response(status, &body);
        debug!(%status, path = %url, error = %err, "API error response");
        Err(err)
    }

    /// Send a request with an optional JSON body.
    pub async fn execute<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Response>
    where
        B: Serialize + ?Sized,
    {
        debug!(%method, path, "API request");
        let builder = self.request(method, path)?;
        let builder = match body {
            Some(body) => builder.json(body),
            None => builder,
        };
        self.send(builder).await
    }

    /// `GET` a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.execute::<()>(Method::GET, path, None).await?;
        decode(response).await
    }

    /// `POST` a JSON body and decode the response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        decode(response).await
    }

    /// `PUT` a JSON body and decode the response.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(Method::PUT, path, Some(body)).await?;
        decode(response).await
    }

    /// `PATCH` a JSON body and decode the response.
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(Method::PATCH, path, Some(body)).await?;
        decode(response).await
    }

    /// `DELETE` a resource, optionally with a JSON body.
    pub async fn delete<B>(&self, path: &str, body: Option<&B>) -> Result<Value>
    where
        B: Serialize + ?Sized,
    {
        let response = self.execute(Method::DELETE, path, body).await?;
        decode(response).await
    }
}

/// Decode a response body.
///
/// An empty body decodes as JSON `null` and a non-JSON body as a JSON
/// string, so `Value`, `String`, `Option<_>` and `()` targets accept the
/// plain-text and `204 No Content` answers the backend sometimes gives.
pub async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let text = response.text().await?;
    decode_text(&text)
}

fn decode_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    match serde_json::from_str(trimmed) {
        Ok(value) => Ok(value),
        Err(json_err) => serde_json::from_value(Value::String(trimmed.to_string()))
            .map_err(|_| CellarError::from(json_err)),
    }
}

/// Parse a base URL and make sure its path ends with `/` so joins append.
fn normalize_base_url(base_url: &str) -> Result<Url> {
    let mut url = Url::parse(base_url)
        .map_err(|e| CellarError::Config(format!("invalid api.base_url: {e}")))?;
    if url.cannot_be_a_base() {
        return Err(CellarError::Config(format!(
            "api.base_url cannot be a base: {base_url}"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}
