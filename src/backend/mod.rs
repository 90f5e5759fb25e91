//! HTTP client for the clipboard backend.
//!
//! The backend is an external service; this module only knows the handful of
//! endpoints the companion consumes: append a value, fetch the latest value,
//! and list the user's history.

pub mod errors;
pub mod schemas;

pub use errors::BackendError;
pub use schemas::{HistoryEntry, HistoryResponse, LatestValue};

use async_trait::async_trait;
use clap::ValueEnum;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::utils::text::preview;
use schemas::{LatestResponse, StatusResponse, SubmitTextRequest};

pub const CLIENT_ID_HEADER: &str = "X-Clipsync-Client";

/// Which of the user's two remote lists a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum HistoryKind {
    /// Values captured from the clipboard
    #[default]
    Copied,
    /// Manually saved entries
    History,
}

impl HistoryKind {
    fn submit_segment(self) -> &'static str {
        match self {
            HistoryKind::Copied => "submit_copied_text",
            HistoryKind::History => "submit",
        }
    }
}

/// Delivery of a locally detected clipboard change.
#[async_trait]
pub trait SubmitChange: Send + Sync {
    async fn submit_change(&self, text: &str) -> Result<(), BackendError>;
}

/// Lookup of the newest server-side clipboard value.
#[async_trait]
pub trait FetchLatest: Send + Sync {
    async fn fetch_latest(&self) -> Result<Option<LatestValue>, BackendError>;
}

#[derive(Debug, Clone)]
pub struct BackendClient {
    client: Client,
    base: Url,
    username: String,
    token: String,
    client_id: Uuid,
}

impl BackendClient {
    pub fn new(server: &ServerConfig, client_id: Uuid) -> Result<Self, BackendError> {
        let base = server
            .base_url()
            .map_err(|e| BackendError::Endpoint(e.to_string()))?;
        let client = Client::builder().timeout(server.request_timeout()).build()?;

        Ok(Self {
            client,
            base,
            username: server.username.clone(),
            token: server.token.clone(),
            client_id,
        })
    }

    pub fn client_id(&self) -> Uuid {
        self.client_id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// `{base}/api/{action}/{username}`, with the username percent-encoded.
    fn endpoint(&self, action: &str) -> Result<Url, BackendError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| BackendError::Endpoint(format!("'{}' cannot be a base URL", self.base)))?
            .pop_if_empty()
            .extend(["api", action, self.username.as_str()]);
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request.header(CLIENT_ID_HEADER, self.client_id.to_string());
        if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        }
    }

    pub async fn submit_text(&self, kind: HistoryKind, text: &str) -> Result<(), BackendError> {
        let url = self.endpoint(kind.submit_segment())?;
        debug!(url = %url, chars = text.chars().count(), "Submitting text");

        let response = self
            .authorized(self.client.post(url))
            .json(&SubmitTextRequest { text })
            .send()
            .await?;

        read_json::<StatusResponse>(response).await?.into_result()
    }

    pub async fn latest(&self) -> Result<Option<LatestValue>, BackendError> {
        let url = self.endpoint("latest")?;
        let response = self.authorized(self.client.get(url)).send().await?;

        read_json::<LatestResponse>(response).await?.into_latest()
    }

    pub async fn history(&self) -> Result<HistoryResponse, BackendError> {
        let url = self.endpoint("history")?;
        let response = self.authorized(self.client.get(url)).send().await?;

        read_json::<HistoryResponse>(response).await?.into_checked()
    }
}

#[async_trait]
impl SubmitChange for BackendClient {
    async fn submit_change(&self, text: &str) -> Result<(), BackendError> {
        self.submit_text(HistoryKind::Copied, text).await
    }
}

#[async_trait]
impl FetchLatest for BackendClient {
    async fn fetch_latest(&self) -> Result<Option<LatestValue>, BackendError> {
        self.latest().await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(BackendError::Api {
            code: status.as_u16(),
            message: preview(&message, 200),
        });
    }

    let body = response.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| BackendError::Parse(format!("{e}: {}", preview(&body, 200))))
}
