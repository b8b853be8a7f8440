//! Connection and polling settings for a ComfyUI server.

use std::time::Duration;

/// Default server address for a local ComfyUI install.
pub const DEFAULT_COMFYUI_URL: &str = "http://127.0.0.1:8188";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 600;

/// Settings for talking to one ComfyUI instance.
#[derive(Debug, Clone, PartialEq)]
pub struct ComfyUIConfig {
    /// Base HTTP URL, without a trailing slash.
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub request_timeout: Duration,
    /// Delay between history polls.
    pub poll_interval: Duration,
    /// Upper bound on waiting for a prompt to finish.
    pub execution_timeout: Duration,
}

impl Default for ComfyUIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_COMFYUI_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            execution_timeout: Duration::from_secs(DEFAULT_EXECUTION_TIMEOUT_SECS),
        }
    }
}

impl ComfyUIConfig {
    /// Config for `base_url` with default timings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                 |
    /// |----------------------------------|-------------------------|
    /// | `COMFYUI_URL`                    | `http://127.0.0.1:8188` |
    /// | `COMFYUI_REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `COMFYUI_POLL_INTERVAL_MS`       | `1000`                  |
    /// | `COMFYUI_EXECUTION_TIMEOUT_SECS` | `600`                   |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = lookup("COMFYUI_URL").unwrap_or_else(|| DEFAULT_COMFYUI_URL.to_string());

        let number = |key: &str, default: u64| -> u64 {
            match lookup(key) {
                None => default,
                Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
                    tracing::warn!(key, value = %raw, default, "Invalid number, using default");
                    default
                }),
            }
        };

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(number(
                "COMFYUI_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            )),
            poll_interval: Duration::from_millis(number(
                "COMFYUI_POLL_INTERVAL_MS",
                DEFAULT_POLL_INTERVAL_MS,
            )),
            execution_timeout: Duration::from_secs(number(
                "COMFYUI_EXECUTION_TIMEOUT_SECS",
                DEFAULT_EXECUTION_TIMEOUT_SECS,
            )),
        }
    }
}
