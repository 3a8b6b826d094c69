//! EC2 instance metadata client.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::BootstrapError;
use crate::retry::{with_retry_async, RetryConfig};

/// Link-local address of the instance metadata service.
pub const DEFAULT_METADATA_ENDPOINT: &str = "http://169.254.169.254";

/// Metadata is local; anything slower than this means we are not on EC2.
const DEFAULT_TIMEOUT_SECS: u64 = 2;

/// Lifetime requested for IMDSv2 session tokens.
const SESSION_TOKEN_TTL_SECS: u32 = 21_600;

const TOKEN_PATH: &str = "latest/api/token";
const TOKEN_TTL_HEADER: &str = "X-aws-ec2-metadata-token-ttl-seconds";
const TOKEN_HEADER: &str = "X-aws-ec2-metadata-token";

/// Subset of the instance identity document.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceIdentityDocument {
    /// Region the instance runs in (e.g. `us-west-2`).
    pub region: String,
    /// Instance ID.
    #[serde(default)]
    pub instance_id: Option<String>,
    /// Availability zone.
    #[serde(default)]
    pub availability_zone: Option<String>,
}

/// Client for the EC2 instance metadata service (IMDS).
#[derive(Debug, Clone)]
pub struct Ec2Metadata {
    client: Client,
    endpoint: String,
    retry: RetryConfig,
}

impl Ec2Metadata {
    /// Create a client for the given IMDS base URL.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, BootstrapError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(1))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::metadata(),
        })
    }

    /// Override the retry policy for metadata reads.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// IMDS base URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    /// Request an IMDSv2 session token; `None` falls back to IMDSv1.
    async fn session_token(&self) -> Option<String> {
        let response = self
            .client
            .put(self.url(TOKEN_PATH))
            .header(TOKEN_TTL_HEADER, SESSION_TOKEN_TTL_SECS.to_string())
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            debug!("IMDSv2 token unavailable ({}), using IMDSv1", response.status());
            return None;
        }
        response.text().await.ok().filter(|t| !t.is_empty())
    }

    /// Single GET of a metadata path.
    async fn fetch(&self, path: &str) -> Result<String, BootstrapError> {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = self.session_token().await {
            request = request.header(TOKEN_HEADER, token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BootstrapError::MetadataStatus {
                path: path.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(response.text().await?)
    }

    /// Whether the metadata service answers at all. A single short attempt.
    pub async fn available(&self) -> bool {
        match self.fetch("latest/meta-data/instance-id").await {
            Ok(_) => true,
            Err(e) => {
                debug!("EC2 metadata not available: {e}");
                false
            }
        }
    }

    /// Read a path under `latest/meta-data/`, retrying transient failures.
    pub async fn get_metadata(&self, name: &str) -> Result<String, BootstrapError> {
        let path = format!("latest/meta-data/{}", name.trim_start_matches('/'));
        self.fetch_with_retry(&path).await
    }

    /// Fetch and parse the instance identity document.
    pub async fn instance_identity(&self) -> Result<InstanceIdentityDocument, BootstrapError> {
        let body = self
            .fetch_with_retry("latest/dynamic/instance-identity/document")
            .await?;
        serde_json::from_str(&body).map_err(|e| {
            BootstrapError::Metadata(format!("Invalid instance identity document: {e}"))
        })
    }

    /// Region of the running instance.
    pub async fn region(&self) -> Result<String, BootstrapError> {
        Ok(self.instance_identity().await?.region)
    }

    async fn fetch_with_retry(&self, path: &str) -> Result<String, BootstrapError> {
        with_retry_async(
            &self.retry,
            &format!("GET {path}"),
            is_retryable,
            move || self.fetch(path),
        )
        .await
    }
}

/// Transport failures and server errors are retried; 4xx answers are final.
fn is_retryable(err: &BootstrapError) -> bool {
    match err {
        BootstrapError::MetadataHttp(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        BootstrapError::MetadataStatus { status, .. } => {
            StatusCode::from_u16(*status).is_ok_and(|s| s.is_server_error())
        }
        _ => false,
    }
}
