//! HTTP implementation of `RemoteSessionService`.
//!
//! Routes, relative to the configured base URL:
//!
//! | Operation | Request |
//! |-----------|---------|
//! | list      | `GET /sessions` |
//! | get       | `GET /sessions/{key}` (`?refresh=true` when forced) |
//! | create    | `POST /sessions` |
//! | update    | `PUT /sessions/{key}` |
//! | delete    | `DELETE /sessions/{key}` |
//!
//! Status mapping: 404 is `NotFound`, transport failures and 5xx are
//! `Network`, any other non-success status or an undecodable body is
//! `Validation`.

use crate::credentials::StaticCredentialProvider;
use crate::dto::{SaveResponseBody, SessionBody, SessionListBody};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use sidechat_core::config::SyncConfig;
use sidechat_core::error::{Result, SidechatError};
use sidechat_core::remote::{CredentialProvider, RemoteSessionService, SaveIntent, SaveResponse};
use sidechat_core::session::Session;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub struct HttpRemoteSessionService {
    client: Client,
    base_url: Url,
    credentials: Arc<dyn CredentialProvider>,
}

impl HttpRemoteSessionService {
    /// Creates a client for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns a `Config` error if `base_url` is not an absolute http(s) URL
    /// or the HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        credentials: Arc<dyn CredentialProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        let mut base_url = Url::parse(base_url.trim())
            .map_err(|e| SidechatError::config(format!("Invalid base URL '{}': {}", base_url, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(SidechatError::config(format!(
                "Unsupported base URL scheme: {}",
                base_url.scheme()
            )));
        }
        // Joining relies on a trailing slash; "/api" would otherwise lose its last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SidechatError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    /// Builds the client from `[sync]` settings, using the configured token.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let base_url = config
            .base_url
            .as_deref()
            .ok_or_else(|| SidechatError::config("sync.base_url is not set"))?;
        let credentials = Arc::new(StaticCredentialProvider::new(config.api_token.clone()));
        Self::new(base_url, credentials, config.request_timeout())
    }

    fn collection_url(&self) -> Result<Url> {
        self.base_url
            .join("sessions")
            .map_err(|e| SidechatError::internal(format!("Failed to build URL: {}", e)))
    }

    fn session_url(&self, key: &str) -> Result<Url> {
        if key.trim().is_empty() {
            return Err(SidechatError::validation("Session key must not be empty"));
        }
        let mut url = self.collection_url()?;
        url.path_segments_mut()
            .map_err(|_| SidechatError::internal("Base URL cannot carry a path"))?
            .push(key);
        Ok(url)
    }

    /// Attaches the credential headers to a request.
    fn auth_request(&self, mut request: RequestBuilder) -> RequestBuilder {
        for (name, value) in self.credentials.headers() {
            request = request.header(name, value);
        }
        request
    }

    async fn send(&self, request: RequestBuilder, key: &str) -> Result<Response> {
        let response = self
            .auth_request(request)
            .send()
            .await
            .map_err(|e| SidechatError::network(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(status_error(status, key, &body))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| SidechatError::network(format!("Failed to read response: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SidechatError::validation(format!("Malformed response body: {}", e)))
    }
}

fn status_error(status: StatusCode, key: &str, body: &str) -> SidechatError {
    if status == StatusCode::NOT_FOUND {
        SidechatError::not_found("Session", key)
    } else if status.is_server_error() {
        SidechatError::network(format!("Service returned {}: {}", status, body))
    } else {
        SidechatError::validation(format!("Service rejected request ({}): {}", status, body))
    }
}

#[async_trait]
impl RemoteSessionService for HttpRemoteSessionService {
    async fn list(&self) -> Result<Vec<Session>> {
        let url = self.collection_url()?;
        let response = self.send(self.client.get(url), "*").await?;
        let sessions = Self::decode::<SessionListBody>(response).await?.into_sessions();
        tracing::debug!("[HttpRemote] Listed {} sessions", sessions.len());
        Ok(sessions)
    }

    async fn get(&self, key: &str, force_refresh: bool) -> Result<Session> {
        let url = self.session_url(key)?;
        let mut request = self.client.get(url);
        if force_refresh {
            request = request.query(&[("refresh", "true")]);
        }
        let response = self.send(request, key).await?;
        Ok(Self::decode::<SessionBody>(response).await?.into_session())
    }

    async fn save(&self, session: &Session, intent: SaveIntent) -> Result<SaveResponse> {
        let request = match intent {
            SaveIntent::Create => self.client.post(self.collection_url()?),
            SaveIntent::Update => self.client.put(self.session_url(&session.key)?),
        };
        let response = self.send(request.json(session), &session.key).await?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SidechatError::network(format!("Failed to read response: {}", e)))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SaveResponse::default());
        }
        let body: SaveResponseBody = serde_json::from_slice(&bytes).unwrap_or_else(|e| {
            tracing::debug!("[HttpRemote] Ignoring unrecognised save response: {}", e);
            SaveResponseBody::default()
        });
        tracing::debug!("[HttpRemote] Saved {} ({:?})", session.key, intent);
        Ok(SaveResponse {
            session: body.session,
        })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let url = self.session_url(key)?;
        self.send(self.client.delete(url), key).await?;
        tracing::debug!("[HttpRemote] Deleted {}", key);
        Ok(())
    }
}
