use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::types::{DetailPollResponse, ListPollResponse, ListingId};

/// Every way a poll can go wrong. The pollers fold all variants into one
/// failure outcome; the variants only exist for logging.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {0}")]
    Status(u16),
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("server reported success = false")]
    Rejected,
}

impl From<reqwest::Error> for PollError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            PollError::Status(status.as_u16())
        } else if err.is_decode() {
            PollError::Decode(err.to_string())
        } else {
            PollError::Transport(err.to_string())
        }
    }
}

/// The two polling endpoints. Implemented over HTTP in production and by
/// scripted sources in tests.
#[async_trait]
pub trait PollSource: Send + Sync {
    async fn poll_listings(&self) -> Result<ListPollResponse, PollError>;

    async fn poll_listing(&self, id: &ListingId) -> Result<DetailPollResponse, PollError>;
}

pub struct HttpPollSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPollSource {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, PollError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.into(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, PollError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "polling");

        let response = self.client.get(&url).send().await?.error_for_status()?;
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|err| PollError::Decode(err.to_string()))
    }
}

#[async_trait]
impl PollSource for HttpPollSource {
    async fn poll_listings(&self) -> Result<ListPollResponse, PollError> {
        self.get_json("/api/products/poll/").await
    }

    async fn poll_listing(&self, id: &ListingId) -> Result<DetailPollResponse, PollError> {
        self.get_json(&format!("/api/products/{id}/poll/")).await
    }
}
