//! The container-engine abstraction Riptide Proxy resolves addresses and
//! drives autostart through. Production deployments load a real engine
//! (Docker, Podman, ...) behind this trait; this crate only defines the
//! contract plus an in-memory reference implementation used in tests and
//! demos.

pub mod memory;

use async_trait::async_trait;
use riptide_core::project::Project;
use tokio_stream::Stream;
use std::pin::Pin;

/// A single progress event emitted while starting one service, mirroring
/// the `(service_name, status, finished)` tuple the original engine's
/// `start_project` async generator yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct StartEvent {
    pub service_name: String,
    pub finished: bool,
    /// `None` while in progress or on successful completion; `Some` carries
    /// either a progress snapshot (`finished == false`) or an error message
    /// (`finished == true`).
    pub status: Option<StartStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartStatus {
    /// An in-progress step report.
    Progress {
        steps: u32,
        current_step: u32,
        text: String,
    },
    /// A terminal error for this one service.
    Error(String),
}

/// `Err` represents the stream itself raising — not a single service
/// failing to start (that's `StartEvent { status: Some(StartStatus::Error(_)), .. }`)
/// but the underlying engine call blowing up entirely (lost connection to
/// the container runtime, a malformed reply, ...). Mirrors the original
/// engine's `start_project` async generator, which could itself raise
/// instead of merely yielding a per-service error.
pub type StartStream = Pin<Box<dyn Stream<Item = Result<StartEvent, String>> + Send>>;

/// Abstraction over whatever actually runs the containers a project's
/// services map to.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Returns the `(host, port)` a running container for `service_name`
    /// in `project` can be reached at, or `None` if it isn't running.
    async fn address_for(&self, project: &Project, service_name: &str) -> Option<(String, u16)>;

    /// Starts `services` (a subset of `project.app.services`) and streams
    /// progress events as they happen. The stream ends once every
    /// requested service has emitted a `finished` event, the overall start
    /// has failed, or the stream itself raises (yields an `Err`).
    async fn start_project(&self, project: &Project, services: Vec<String>) -> StartStream;
}
