//! Test doubles shared by the pipeline, reaper and dispatcher tests.

use depth_scan_common::frame::DepthFrame;
use futures_util::FutureExt;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::service::{AddFrameRequest, MeshBuilder, ServiceError, SubmitFuture};
use crate::shutdown::StopHandle;
use crate::source::{FrameSource, SourceError};

/// A 2x2 frame filled with `fill`.
pub fn frame(fill: u8) -> DepthFrame {
    DepthFrame::new(2, 2, vec![fill; 4], 0, 0).unwrap()
}

/// In-memory mesh-builder.
///
/// Projects behave like the real service (second create is a conflict).
/// Submissions are recorded in issue order; with a gate they only complete
/// once a permit is released.
#[derive(Default)]
pub struct MockMeshBuilder {
    projects: Mutex<HashSet<String>>,
    received: Mutex<Vec<Arc<DepthFrame>>>,
    create_calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
    unreachable: bool,
    refuse_issue: bool,
    fail_remote: bool,
}

impl MockMeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Submissions stay in flight until permits are added to the returned gate.
    pub fn gated() -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mock = Self {
            gate: Some(Arc::clone(&gate)),
            ..Self::default()
        };
        (mock, gate)
    }

    /// Project creation fails as if the service were down.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    /// Every submission fails to issue.
    pub fn refusing_issue() -> Self {
        Self {
            refuse_issue: true,
            ..Self::default()
        }
    }

    /// Every submission is issued but completes with a remote error.
    pub fn failing_remote() -> Self {
        Self {
            fail_remote: true,
            ..Self::default()
        }
    }

    pub fn received(&self) -> Vec<Arc<DepthFrame>> {
        self.received.lock().unwrap().clone()
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }
}

impl MeshBuilder for MockMeshBuilder {
    async fn create_project(&self, name: &str) -> Result<(), ServiceError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable {
            return Err(ServiceError::Status(503));
        }
        if !self.projects.lock().unwrap().insert(name.to_string()) {
            return Err(ServiceError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    fn submit_frame(&self, request: AddFrameRequest) -> Result<SubmitFuture, ServiceError> {
        if self.refuse_issue {
            return Err(ServiceError::Status(503));
        }
        self.received.lock().unwrap().push(Arc::clone(&request.frame));
        let gate = self.gate.clone();
        let fail = self.fail_remote;
        Ok(async move {
            if let Some(gate) = gate {
                gate.acquire()
                    .await
                    .map_err(|e| ServiceError::Task(e.to_string()))?
                    .forget();
            }
            if fail {
                Err(ServiceError::Status(500))
            } else {
                Ok(())
            }
        }
        .boxed())
    }
}

/// Plays back a fixed list of polls (`None` = nothing available), then
/// reports nothing forever, optionally requesting a stop once exhausted.
pub struct ScriptedSource {
    script: VecDeque<Option<DepthFrame>>,
    stop_when_done: Option<StopHandle>,
    reads: Arc<AtomicUsize>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Option<DepthFrame>>) -> Self {
        Self {
            script: script.into(),
            stop_when_done: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn frames(frames: Vec<DepthFrame>) -> Self {
        Self::new(frames.into_iter().map(Some).collect())
    }

    pub fn stop_when_done(mut self, handle: StopHandle) -> Self {
        self.stop_when_done = Some(handle);
        self
    }

    /// Number of polls that returned a frame.
    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl FrameSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        match self.script.pop_front() {
            Some(next) => {
                if next.is_some() {
                    self.reads.fetch_add(1, Ordering::SeqCst);
                }
                Ok(next)
            }
            None => {
                if let Some(handle) = &self.stop_when_done {
                    handle.stop();
                }
                Ok(None)
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Endless stream where every frame differs from the previous one.
#[derive(Default)]
pub struct ChangingSource {
    reads: Arc<AtomicUsize>,
}

impl ChangingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.reads)
    }
}

impl FrameSource for ChangingSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst) as u64;
        let samples = n.to_be_bytes().to_vec();
        Ok(Some(DepthFrame::new(1, 8, samples, 0, n)?))
    }
}

/// Every poll fails.
pub struct BrokenSource;

impl FrameSource for BrokenSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        Err(SourceError::HttpStatus(500))
    }
}

/// Never yields a frame; every read pends forever.
pub struct HangingSource;

impl FrameSource for HangingSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        std::future::pending().await
    }
}
