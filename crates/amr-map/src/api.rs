//! Data source for robot state, map images and localization commands.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response, Url};
use tracing::{debug, warn};

use crate::error::{CommitError, LoadError};
use crate::state::{AmrState, CommitAck, InitializeRequest, InitializeResponse};

const STATE_PATH: &str = "/node-api/edge/state";
const MAPS_PATH: &str = "/node-api/environment-server/maps";
const INITIALIZE_PATH: &str = "/node-api/edge/localization/initialize";

/// The robot-side services the viewer talks to.
///
/// Implemented over HTTP by [`HttpEdgeApi`]; tests provide in-memory doubles.
pub trait EdgeApi: Send + Sync {
    /// Current AMR state including the localization block.
    fn fetch_state(&self) -> impl Future<Output = Result<AmrState, LoadError>> + Send;

    /// Raw encoded map image for `map_id`.
    fn fetch_map_image(&self, map_id: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send;

    /// Ask the robot to (re)initialize its localization at the given pose.
    fn initialize_localization(
        &self,
        request: &InitializeRequest,
    ) -> impl Future<Output = Result<CommitAck, CommitError>> + Send;
}

impl<T: EdgeApi> EdgeApi for Arc<T> {
    fn fetch_state(&self) -> impl Future<Output = Result<AmrState, LoadError>> + Send {
        (**self).fetch_state()
    }

    fn fetch_map_image(&self, map_id: &str) -> impl Future<Output = Result<Vec<u8>, LoadError>> + Send {
        (**self).fetch_map_image(map_id)
    }

    fn initialize_localization(
        &self,
        request: &InitializeRequest,
    ) -> impl Future<Output = Result<CommitAck, CommitError>> + Send {
        (**self).initialize_localization(request)
    }
}

/// reqwest-backed [`EdgeApi`].
#[derive(Debug, Clone)]
pub struct HttpEdgeApi {
    client: Client,
    base_url: String,
}

impl HttpEdgeApi {
    /// Build a client for the service rooted at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Use an already configured client.
    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `map_id` becomes a single percent-encoded path segment.
    fn map_image_url(&self, map_id: &str) -> Option<Url> {
        let mut url = Url::parse(&self.url(MAPS_PATH)).ok()?;
        url.path_segments_mut().ok()?.push(map_id);
        Some(url)
    }

    async fn get_checked(&self, resource: &str, url: Url) -> Result<Response, LoadError> {
        debug!(%url, "GET");
        let response = self.client.get(url).send().await.map_err(|err| LoadError::Network {
            resource: resource.to_string(),
            reason: err.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(LoadError::Status {
                resource: resource.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response)
    }
}

fn invalid_url(resource: &str, base_url: &str) -> LoadError {
    LoadError::Network {
        resource: resource.to_string(),
        reason: format!("invalid service URL '{}'", base_url),
    }
}

impl EdgeApi for HttpEdgeApi {
    async fn fetch_state(&self) -> Result<AmrState, LoadError> {
        let resource = "edge state";
        let url = Url::parse(&self.url(STATE_PATH)).map_err(|_| invalid_url(resource, &self.base_url))?;
        let response = self.get_checked(resource, url).await?;
        let body = response.bytes().await.map_err(|err| LoadError::Network {
            resource: resource.to_string(),
            reason: err.to_string(),
        })?;
        serde_json::from_slice(&body).map_err(|err| LoadError::Malformed {
            resource: resource.to_string(),
            reason: err.to_string(),
        })
    }

    async fn fetch_map_image(&self, map_id: &str) -> Result<Vec<u8>, LoadError> {
        let resource = format!("map image '{}'", map_id);
        let url = self
            .map_image_url(map_id)
            .ok_or_else(|| invalid_url(&resource, &self.base_url))?;
        let response = self.get_checked(&resource, url).await?;
        let bytes = response.bytes().await.map_err(|err| LoadError::Network {
            resource: resource.clone(),
            reason: err.to_string(),
        })?;
        debug!(map_id, len = bytes.len(), "Map image downloaded");
        Ok(bytes.to_vec())
    }

    async fn initialize_localization(&self, request: &InitializeRequest) -> Result<CommitAck, CommitError> {
        let url = self.url(INITIALIZE_PATH);
        debug!(%url, x = request.x, y = request.y, theta = request.theta, "PUT");
        let response = self
            .client
            .put(&url)
            .json(request)
            .send()
            .await
            .map_err(|err| CommitError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "Localization initialization refused");
            return Err(CommitError::from_status(status.as_u16()));
        }

        // Some firmware answers with an empty body.
        let body = response
            .bytes()
            .await
            .map_err(|err| CommitError::Network(err.to_string()))?;
        if body.is_empty() {
            return Ok(CommitAck::Confirmed);
        }
        match serde_json::from_slice::<InitializeResponse>(&body) {
            Ok(InitializeResponse { success: true, .. }) => Ok(CommitAck::Confirmed),
            Ok(InitializeResponse { message, .. }) => Err(CommitError::Rejected(
                message.unwrap_or_else(|| "no reason given".to_string()),
            )),
            Err(err) => {
                warn!(%err, "Unparseable initialize response");
                Ok(CommitAck::Unconfirmed)
            }
        }
    }
}
