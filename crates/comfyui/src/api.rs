//! HTTP endpoints of a ComfyUI server: availability, conversion,
//! submission, queue, history and file download.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::ComfyUIConfig;

/// Thin async client over one ComfyUI server's REST surface.
#[derive(Debug, Clone)]
pub struct ComfyUIApi {
    client: reqwest::Client,
    api_url: String,
}

/// Body of a successful `POST /prompt`.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    /// Server-assigned id used for history and queue lookups.
    pub prompt_id: String,
    /// Queue number assigned by the server.
    #[serde(default)]
    pub number: i64,
    /// Validation warnings for nodes that were still accepted.
    #[serde(default)]
    pub node_errors: serde_json::Value,
}

/// Snapshot of the `/queue` endpoint.
///
/// Each entry is ComfyUI's raw queue tuple
/// `[number, prompt_id, prompt, extra_data, outputs_to_execute]`.
#[derive(Debug, Default, Deserialize)]
pub struct QueueStatus {
    /// Prompts currently executing (at most one on a stock server).
    #[serde(default)]
    pub queue_running: Vec<serde_json::Value>,
    /// Prompts waiting for execution, in queue order.
    #[serde(default)]
    pub queue_pending: Vec<serde_json::Value>,
}

impl QueueStatus {
    fn contains(entries: &[serde_json::Value], prompt_id: &str) -> bool {
        entries
            .iter()
            .any(|entry| entry.get(1).and_then(|v| v.as_str()) == Some(prompt_id))
    }

    pub fn is_running(&self, prompt_id: &str) -> bool {
        Self::contains(&self.queue_running, prompt_id)
    }

    pub fn is_pending(&self, prompt_id: &str) -> bool {
        Self::contains(&self.queue_pending, prompt_id)
    }
}

/// Failures talking to the ComfyUI REST endpoints.
#[derive(Debug, thiserror::Error)]
pub enum ComfyUIApiError {
    /// Transport-level failure: connect, timeout, or an undecodable body.
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("ComfyUI API error ({status}): {body}")]
    ApiError {
        /// HTTP status code returned by the server.
        status: u16,
        /// Response body text, kept for diagnostics.
        body: String,
    },
}

impl ComfyUIApi {
    /// Client with default `reqwest` settings for the server at `api_url`
    /// (e.g. `http://host:8188`).
    pub fn new(api_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Client that shares an existing connection pool.
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build a client honouring the configured request timeout.
    pub fn from_config(config: &ComfyUIConfig) -> Result<Self, ComfyUIApiError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client, config.base_url.clone()))
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// `GET /system_stats`. Any transport failure or non-2xx status counts
    /// as unavailable.
    pub async fn is_available(&self) -> bool {
        match self.client.get(self.url("/system_stats")).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(api_url = %self.api_url, error = %e, "ComfyUI availability probe failed");
                false
            }
        }
    }

    /// `POST /workflow/convert`: display format in, execution format out.
    ///
    /// Served by the workflow-converter extension, not by stock ComfyUI.
    pub async fn convert_workflow(
        &self,
        display: &serde_json::Value,
    ) -> Result<serde_json::Value, ComfyUIApiError> {
        self.post_json("/workflow/convert", display).await
    }

    /// `POST /prompt`. Queues `prompt` on behalf of `client_id`.
    pub async fn submit_workflow(
        &self,
        prompt: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        let body = serde_json::json!({ "prompt": prompt, "client_id": client_id });
        self.post_json("/prompt", &body).await
    }

    /// `GET /queue`.
    pub async fn get_queue_status(&self) -> Result<QueueStatus, ComfyUIApiError> {
        self.get_json("/queue").await
    }

    /// `GET /history/{prompt_id}`. The object is keyed by prompt id and
    /// stays empty until the prompt stops running.
    pub async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        self.get_json(&format!("/history/{prompt_id}")).await
    }

    /// `GET /history` for every prompt the server remembers.
    pub async fn get_all_history(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        self.get_json("/history").await
    }

    /// `GET /view`: raw bytes of one output file.
    pub async fn view(
        &self,
        filename: &str,
        subfolder: &str,
        output_type: &str,
    ) -> Result<Vec<u8>, ComfyUIApiError> {
        let response = self
            .client
            .get(self.url("/view"))
            .query(&[
                ("filename", filename),
                ("subfolder", subfolder),
                ("type", output_type),
            ])
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }

    // ---- private helpers ----

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ComfyUIApiError> {
        let response = self.client.get(self.url(path)).send().await?;
        Ok(Self::check_status(response).await?.json::<T>().await?)
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ComfyUIApiError> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Ok(Self::check_status(response).await?.json::<T>().await?)
    }

    /// Turn a non-2xx response into [`ComfyUIApiError::ApiError`], keeping
    /// the body text for diagnostics.
    async fn check_status(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComfyUIApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        Err(ComfyUIApiError::ApiError {
            status: status.as_u16(),
            body,
        })
    }
}
