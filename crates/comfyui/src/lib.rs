//! ComfyUI REST client and job orchestration.
//!
//! Wraps the HTTP endpoints of one ComfyUI server, submits workflows
//! built with `commander_core`, polls history until a prompt reaches a
//! terminal state, and downloads the produced media.

pub mod api;
pub mod config;
pub mod history;
pub mod orchestrator;

pub use api::{ComfyUIApi, ComfyUIApiError};
pub use config::ComfyUIConfig;
pub use orchestrator::{ExecutionError, Orchestrator};
