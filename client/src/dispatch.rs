use depth_scan_common::frame::{DepthFrame, FieldOfView};
use futures_util::FutureExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tracing::debug;

use crate::service::{AddFrameRequest, MeshBuilder, ServiceError};

/// Turns accepted frames into `AddFrame` calls running on the runtime.
pub struct Dispatcher<M> {
    service: Arc<M>,
    project: String,
    fov: FieldOfView,
    next_seq: u64,
}

impl<M: MeshBuilder> Dispatcher<M> {
    pub fn new(service: Arc<M>, project: &str, fov: FieldOfView) -> Self {
        Self {
            service,
            project: project.to_string(),
            fov,
            next_seq: 0,
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn service(&self) -> &M {
        &self.service
    }

    /// Issue `frame` to the service and return immediately.
    ///
    /// An `Err` means the call could not be issued and nothing is in flight.
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(&mut self, frame: Arc<DepthFrame>) -> Result<PendingSubmission, ServiceError> {
        let request = AddFrameRequest::new(&self.project, Arc::clone(&frame), self.fov);
        let call = self.service.submit_frame(request)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        debug!(
            seq,
            project = self.project,
            rows = frame.rows(),
            cols = frame.cols(),
            captured_at = %frame.captured_at(),
            "dispatched frame"
        );

        Ok(PendingSubmission {
            seq,
            frame,
            issued_at: Instant::now(),
            handle: tokio::spawn(call),
        })
    }
}

/// An issued, not yet reaped `AddFrame` call.
pub struct PendingSubmission {
    seq: u64,
    frame: Arc<DepthFrame>,
    issued_at: Instant,
    handle: JoinHandle<Result<(), ServiceError>>,
}

impl PendingSubmission {
    /// Dispatch order, starting at 0.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn frame(&self) -> &DepthFrame {
        &self.frame
    }

    pub fn elapsed(&self) -> Duration {
        self.issued_at.elapsed()
    }

    pub fn is_done(&self) -> bool {
        self.handle.is_finished()
    }

    /// Outcome of a finished call, `None` while it is still in flight.
    /// Never waits. Once this returns `Some` the submission is spent.
    pub fn try_outcome(&mut self) -> Option<Result<(), ServiceError>> {
        if !self.is_done() {
            return None;
        }
        (&mut self.handle).now_or_never().map(flatten)
    }

    /// Wait for the call to finish. Like [`PendingSubmission::try_outcome`],
    /// the submission is spent afterwards.
    pub async fn wait(&mut self) -> Result<(), ServiceError> {
        flatten((&mut self.handle).await)
    }
}

fn flatten(joined: Result<Result<(), ServiceError>, JoinError>) -> Result<(), ServiceError> {
    joined.unwrap_or_else(|e| Err(ServiceError::Task(e.to_string())))
}
