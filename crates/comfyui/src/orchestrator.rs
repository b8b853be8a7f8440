//! Submission and polling of workflows against one ComfyUI server.
//!
//! A job moves `Created -> Submitted -> Polling` and ends in one of
//! `Succeeded`, `Failed` or `TimedOut`. There is no cancellation; the only
//! bound on a poll loop is its timeout.
//!
//! Failures before the prompt is accepted (server unreachable, rejected
//! submission) are returned as errors by every entry point. After
//! submission, [`Orchestrator::submit_and_wait`] returns failures as
//! errors while [`Orchestrator::submit_and_wait_async`] folds them into an
//! [`ExecutionResult`] with `status == Error`.

use std::path::Path;
use std::time::Duration;

use commander_core::{
    CoreError, ExecutionResult, ExecutionStatus, MediaCollection, MediaOutput, NodeInfo, Workflow,
};
use tokio::time::Instant;

use crate::api::{ComfyUIApi, ComfyUIApiError};
use crate::config::ComfyUIConfig;
use crate::history::{prompt_state, HistoryEntry, PromptState};

/// Errors raised while driving a prompt through ComfyUI.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// The availability probe failed before anything was submitted.
    #[error("ComfyUI server at {0} is not available")]
    Unavailable(String),

    /// A request to ComfyUI failed or returned a non-2xx status.
    #[error("Remote request failed: {0}")]
    RemoteRequestFailed(#[from] ComfyUIApiError),

    /// The prompt did not reach a terminal state in time.
    #[error("Prompt {prompt_id} did not finish within {timeout:?}")]
    ExecutionTimeout { prompt_id: String, timeout: Duration },

    /// ComfyUI reported the prompt as failed.
    #[error("Prompt {prompt_id} failed: {message}")]
    ExecutionFailed { prompt_id: String, message: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    /// The blocking entry point could not start its runtime.
    #[error("Failed to start runtime: {0}")]
    Runtime(std::io::Error),

    /// The blocking entry point was called from inside an async runtime.
    #[error("submit_and_wait cannot run inside an async runtime; use submit_and_wait_async")]
    BlockingInAsyncContext,
}

/// Drives workflows through one ComfyUI instance.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    api: ComfyUIApi,
    config: ComfyUIConfig,
    client_id: String,
}

impl Orchestrator {
    pub fn new(config: ComfyUIConfig) -> Result<Self, ExecutionError> {
        let api = ComfyUIApi::from_config(&config)?;
        Ok(Self {
            api,
            config,
            client_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn api(&self) -> &ComfyUIApi {
        &self.api
    }

    pub fn config(&self) -> &ComfyUIConfig {
        &self.config
    }

    /// Client id sent with every submission from this orchestrator.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    // ---- loading ----

    /// Load a workflow file and make sure it has an execution graph,
    /// converting a display-only file through the server.
    pub async fn load_workflow(&self, path: impl AsRef<Path>) -> Result<Workflow, ExecutionError> {
        let mut workflow = Workflow::from_file(path)?;
        self.ensure_execution_graph(&mut workflow).await?;
        Ok(workflow)
    }

    /// Populate the execution graph of a display-only workflow via
    /// `/workflow/convert`. No-op when one is already present.
    pub async fn ensure_execution_graph(&self, workflow: &mut Workflow) -> Result<(), ExecutionError> {
        if workflow.has_execution_graph() {
            return Ok(());
        }
        let api_json = self.convert(workflow).await?;
        workflow.set_api_json(serde_json::from_value(api_json).map_err(CoreError::from)?);
        Ok(())
    }

    async fn convert(&self, workflow: &Workflow) -> Result<serde_json::Value, ExecutionError> {
        let gui = workflow
            .gui_json()
            .ok_or_else(|| CoreError::Malformed("Workflow has no graph to convert".to_string()))?;
        let gui_json = gui.to_value().map_err(CoreError::from)?;
        let converted = self.api.convert_workflow(&gui_json).await?;
        tracing::info!(
            nodes = converted.as_object().map(|o| o.len()).unwrap_or(0),
            "Converted display workflow to execution format",
        );
        Ok(converted)
    }

    /// Execution-format JSON to submit, converting when necessary.
    async fn payload(&self, workflow: &Workflow) -> Result<serde_json::Value, ExecutionError> {
        match workflow.api_json() {
            Some(api) => Ok(api.to_value().map_err(CoreError::from)?),
            None => self.convert(workflow).await,
        }
    }

    // ---- submission ----

    /// Submit a workflow and return its prompt id without waiting.
    pub async fn queue(&self, workflow: &Workflow) -> Result<String, ExecutionError> {
        let payload = self.payload(workflow).await?;
        let response = self.api.submit_workflow(&payload, &self.client_id).await?;

        tracing::info!(
            prompt_id = %response.prompt_id,
            queue_number = response.number,
            "Workflow submitted to ComfyUI",
        );
        Ok(response.prompt_id)
    }

    /// Probe availability, then submit.
    async fn submit_checked(&self, workflow: &Workflow) -> Result<String, ExecutionError> {
        if !self.api.is_available().await {
            return Err(ExecutionError::Unavailable(self.api.api_url().to_string()));
        }
        self.queue(workflow).await
    }

    /// Current status of a prompt from history and queue.
    pub async fn status(&self, prompt_id: &str) -> Result<ExecutionStatus, ExecutionError> {
        let history = self.api.get_history(prompt_id).await?;
        match prompt_state(&history, prompt_id).map_err(CoreError::from)? {
            PromptState::Succeeded(_) => return Ok(ExecutionStatus::Success),
            PromptState::Failed(_) => return Ok(ExecutionStatus::Error),
            PromptState::InProgress => {}
        }

        let queue = self.api.get_queue_status().await?;
        if queue.is_running(prompt_id) {
            Ok(ExecutionStatus::Running)
        } else {
            Ok(ExecutionStatus::Pending)
        }
    }

    // ---- waiting ----

    /// Submit and block the calling thread until the prompt finishes.
    ///
    /// Runs on a private single-threaded runtime. Called from inside an
    /// async context it returns [`ExecutionError::BlockingInAsyncContext`]
    /// without submitting anything. Post-submission failures are returned
    /// as [`ExecutionError::ExecutionFailed`] / [`ExecutionError::ExecutionTimeout`].
    pub fn submit_and_wait(
        &self,
        workflow: &Workflow,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        if tokio::runtime::Handle::try_current().is_ok() {
            return Err(ExecutionError::BlockingInAsyncContext);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ExecutionError::Runtime)?;

        // Connection pools are tied to the runtime that opened them.
        let local = Self {
            api: ComfyUIApi::from_config(&self.config)?,
            config: self.config.clone(),
            client_id: self.client_id.clone(),
        };

        runtime.block_on(async move {
            let prompt_id = local.submit_checked(workflow).await?;
            let media = local
                .wait_for_completion(&prompt_id, Some(workflow), poll_interval, timeout)
                .await?;
            Ok::<_, ExecutionError>(ExecutionResult::success(prompt_id, media))
        })
    }

    /// Submit and wait cooperatively, yielding between polls.
    ///
    /// Errors before the prompt is accepted are returned; every failure
    /// after that (timeout, remote error, download failure) becomes an
    /// [`ExecutionResult`] with `status == Error` and no media.
    pub async fn submit_and_wait_async(
        &self,
        workflow: &Workflow,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<ExecutionResult, ExecutionError> {
        let prompt_id = self.submit_checked(workflow).await?;

        match self
            .wait_for_completion(&prompt_id, Some(workflow), poll_interval, timeout)
            .await
        {
            Ok(media) => Ok(ExecutionResult::success(prompt_id, media)),
            Err(e) => {
                tracing::warn!(prompt_id = %prompt_id, error = %e, "Prompt did not succeed");
                Ok(ExecutionResult::failed(prompt_id, e.to_string()))
            }
        }
    }

    /// [`submit_and_wait_async`](Self::submit_and_wait_async) with the
    /// configured poll interval and timeout.
    pub async fn run(&self, workflow: &Workflow) -> Result<ExecutionResult, ExecutionError> {
        self.submit_and_wait_async(workflow, self.config.poll_interval, self.config.execution_timeout)
            .await
    }

    /// Poll history until the prompt is terminal or `timeout` elapses.
    async fn wait_for_completion(
        &self,
        prompt_id: &str,
        workflow: Option<&Workflow>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<MediaCollection, ExecutionError> {
        // `None` when `timeout` is too large to represent: wait without bound.
        let deadline = Instant::now().checked_add(timeout);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let history = self.api.get_history(prompt_id).await?;

            match prompt_state(&history, prompt_id).map_err(CoreError::from)? {
                PromptState::Succeeded(entry) => {
                    let media = self.download_outputs(&entry, workflow).await?;
                    tracing::info!(prompt_id, attempt, outputs = media.len(), "Prompt succeeded");
                    return Ok(media);
                }
                PromptState::Failed(message) => {
                    tracing::warn!(prompt_id, attempt, error = %message, "Prompt failed");
                    return Err(ExecutionError::ExecutionFailed {
                        prompt_id: prompt_id.to_string(),
                        message,
                    });
                }
                PromptState::InProgress => {
                    tracing::debug!(prompt_id, attempt, "Prompt still in progress");
                }
            }

            let delay = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ExecutionError::ExecutionTimeout {
                            prompt_id: prompt_id.to_string(),
                            timeout,
                        });
                    }
                    poll_interval.min(deadline.saturating_duration_since(now))
                }
                None => poll_interval,
            };
            tokio::time::sleep(delay).await;
        }
    }

    // ---- outputs ----

    /// Fetch the finished outputs of `prompt_id`.
    ///
    /// With a workflow, each artifact carries the producing node's identity,
    /// or a placeholder when the workflow lacks that node. Without one, no
    /// node information is attached. Unknown prompts yield an empty
    /// collection.
    pub async fn collect_outputs(
        &self,
        prompt_id: &str,
        workflow: Option<&Workflow>,
    ) -> Result<MediaCollection, ExecutionError> {
        let history = self.api.get_history(prompt_id).await?;
        let Some(raw) = history.get(prompt_id) else {
            tracing::debug!(prompt_id, "No history for prompt");
            return Ok(MediaCollection::new());
        };
        let entry: HistoryEntry = serde_json::from_value(raw.clone()).map_err(CoreError::from)?;
        self.download_outputs(&entry, workflow).await
    }

    async fn download_outputs(
        &self,
        entry: &HistoryEntry,
        workflow: Option<&Workflow>,
    ) -> Result<MediaCollection, ExecutionError> {
        let mut media = MediaCollection::new();
        for (node_id, file) in entry.output_files() {
            let data = self
                .api
                .view(&file.filename, &file.subfolder, &file.output_type)
                .await?;
            let node = workflow.map(|w| {
                w.node_info(&node_id)
                    .unwrap_or_else(|| NodeInfo::placeholder(node_id.clone()))
            });

            tracing::debug!(
                node_id = %node_id,
                filename = %file.filename,
                bytes = data.len(),
                "Downloaded output",
            );
            media.push(MediaOutput {
                data,
                filename: file.filename,
                subfolder: file.subfolder,
                output_type: file.output_type,
                node,
            });
        }
        Ok(media)
    }
}
