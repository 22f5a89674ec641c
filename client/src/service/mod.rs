//! Client side of the mesh-builder service.
//!
//! The service owns projects and accumulates the depth frames submitted to
//! them. This crate only ever creates a project (idempotently) and pushes
//! frames into it.

pub mod http;

use depth_scan_common::frame::{DepthFrame, FieldOfView};
use futures_util::future::BoxFuture;
use serde::ser::{Serialize, Serializer};
use std::future::Future;
use std::sync::Arc;
use tracing::info;

pub use http::HttpMeshBuilder;

/// Completion of an issued frame submission.
pub type SubmitFuture = BoxFuture<'static, Result<(), ServiceError>>;

/// Remote mesh-builder operations consumed by the pipeline.
pub trait MeshBuilder: Send + Sync + 'static {
    /// Create `name`. Returns [`ServiceError::AlreadyExists`] if it exists;
    /// callers that only need the project to exist use [`ensure_project`].
    fn create_project(&self, name: &str) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Issue a frame submission.
    ///
    /// Issuing is synchronous and cheap: an `Err` here means the call never
    /// left the client. The returned future performs the round trip and
    /// resolves with the remote outcome.
    fn submit_frame(&self, request: AddFrameRequest) -> Result<SubmitFuture, ServiceError>;
}

/// Create the project, treating "already exists" as success.
pub async fn ensure_project<M: MeshBuilder>(service: &M, name: &str) -> Result<(), ServiceError> {
    match service.create_project(name).await {
        Ok(()) => {
            info!(project = name, "project created");
            Ok(())
        }
        Err(ServiceError::AlreadyExists(_)) => {
            info!(project = name, "project already exists, reusing it");
            Ok(())
        }
        Err(e) => Err(e),
    }
}

/// One `AddFrame` call: the project name, the frame rows and the sensor's
/// field of view.
///
/// The frame is shared with the pipeline rather than copied; rows are
/// streamed straight out of it when the body is encoded.
#[derive(Debug, Clone)]
pub struct AddFrameRequest {
    pub project: String,
    pub frame: Arc<DepthFrame>,
    pub fov: FieldOfView,
}

impl AddFrameRequest {
    pub fn new(project: &str, frame: Arc<DepthFrame>, fov: FieldOfView) -> Self {
        Self {
            project: project.to_string(),
            frame,
            fov,
        }
    }

    /// JSON body: `{"name": .., "depth": {"rows": [[..], ..], "x_fov": .., "y_fov": ..}}`.
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&AddFrameBody {
            name: &self.project,
            depth: DepthBody {
                rows: Rows(&self.frame),
                x_fov: self.fov.horizontal,
                y_fov: self.fov.vertical,
            },
        })
    }
}

#[derive(serde::Serialize)]
struct AddFrameBody<'a> {
    name: &'a str,
    depth: DepthBody<'a>,
}

#[derive(serde::Serialize)]
struct DepthBody<'a> {
    rows: Rows<'a>,
    x_fov: f32,
    y_fov: f32,
}

struct Rows<'a>(&'a DepthFrame);

impl Serialize for Rows<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.row_slices())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("invalid service address '{0}'")]
    InvalidAddress(String),
    #[error("failed to build service HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("project '{0}' already exists")]
    AlreadyExists(String),
    #[error("unknown project '{0}'")]
    UnknownProject(String),
    #[error("submission task failed: {0}")]
    Task(String),
}
