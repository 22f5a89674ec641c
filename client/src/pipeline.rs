use depth_scan_common::config::{CaptureConfig, ConfigError};
use depth_scan_common::frame::{DepthFrame, FieldOfView};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::dispatch::Dispatcher;
use crate::filter::ChangeFilter;
use crate::reaper::{PendingSet, ReapSummary};
use crate::service::{ensure_project, MeshBuilder, ServiceError};
use crate::shutdown::StopSignal;
use crate::source::FrameSource;

/// Lifecycle of one client run. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ProjectCreated,
    Streaming,
    Draining,
    Stopped,
}

/// How long the pipeline keeps capturing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Until a stop is requested.
    Stream,
    /// Until this many frames have been dispatched (or a stop is requested).
    Count(u64),
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub mode: CaptureMode,
    /// Maximum number of submissions in flight at once.
    pub max_in_flight: usize,
    /// Pause between polls that produced nothing new.
    pub idle_poll: Duration,
    pub fov: FieldOfView,
}

impl PipelineOptions {
    pub fn from_config(config: &CaptureConfig) -> Result<Self, ConfigError> {
        let mode = match config.mode.as_str() {
            "stream" => CaptureMode::Stream,
            "count" => CaptureMode::Count(config.frame_count),
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown capture mode '{other}'"
                )))
            }
        };
        Ok(Self {
            mode,
            max_in_flight: config.max_in_flight,
            idle_poll: Duration::from_millis(config.idle_poll_ms),
            fov: config.field_of_view(),
        })
    }
}

/// Counters for one run, logged at shutdown.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    pub frames_read: u64,
    pub duplicates_suppressed: u64,
    pub dispatched: u64,
    pub dispatch_failures: u64,
    pub completed: u64,
    pub failed: u64,
    pub empty_polls: u64,
    pub source_errors: u64,
    pub peak_in_flight: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to create project '{project}': {source}")]
    Startup {
        project: String,
        source: ServiceError,
    },
}

/// Capture → dedup → dispatch → reap loop.
///
/// The driver owns the change filter slot and the pending set outright, so
/// nothing here is shared or locked. Submissions run as runtime tasks and are
/// only observed through their handles.
pub struct Pipeline<S, M> {
    source: S,
    filter: ChangeFilter,
    dispatcher: Dispatcher<M>,
    pending: PendingSet,
    options: PipelineOptions,
    state: PipelineState,
    report: PipelineReport,
}

impl<S: FrameSource, M: MeshBuilder> Pipeline<S, M> {
    pub fn new(source: S, service: Arc<M>, project: &str, options: PipelineOptions) -> Self {
        Self {
            source,
            filter: ChangeFilter::new(),
            dispatcher: Dispatcher::new(service, project, options.fov),
            pending: PendingSet::with_capacity(options.max_in_flight),
            options,
            state: PipelineState::Idle,
            report: PipelineReport::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    /// Create the project, stream until stopped, then wait for every
    /// submission still in flight.
    ///
    /// Only project creation can fail the run. Per-frame problems are logged
    /// and counted in the returned report.
    pub async fn run(&mut self, stop: &mut StopSignal) -> Result<PipelineReport, PipelineError> {
        self.start().await?;
        self.stream(stop).await;
        self.drain().await;
        Ok(self.report.clone())
    }

    async fn start(&mut self) -> Result<(), PipelineError> {
        let project = self.dispatcher.project().to_string();
        info!(project = %project, "creating project");
        ensure_project(self.dispatcher.service(), &project)
            .await
            .map_err(|source| PipelineError::Startup { project, source })?;
        self.transition(PipelineState::ProjectCreated);
        Ok(())
    }

    async fn stream(&mut self, stop: &mut StopSignal) {
        self.transition(PipelineState::Streaming);
        info!(
            source = self.source.name(),
            mode = ?self.options.mode,
            max_in_flight = self.pending.capacity(),
            "streaming frames"
        );

        loop {
            if stop.is_stopped() {
                info!("stop requested");
                break;
            }
            if let CaptureMode::Count(target) = self.options.mode {
                if self.report.dispatched >= target {
                    info!(frames = target, "requested frame count dispatched");
                    break;
                }
            }
            self.tick(stop).await;
        }

        self.transition(PipelineState::Draining);
    }

    /// One pass: reap, then either read and offer a frame or wait.
    async fn tick(&mut self, stop: &mut StopSignal) {
        self.reap();

        if self.pending.is_full() {
            debug!(in_flight = self.pending.len(), "in-flight limit reached, pausing capture");
            idle(self.options.idle_poll, stop).await;
            return;
        }

        // A hung source must not hold off a stop.
        let read = tokio::select! {
            _ = stop.stopped() => return,
            read = self.source.next_frame() => read,
        };

        match read {
            Ok(Some(frame)) => {
                self.report.frames_read += 1;
                if !self.offer(frame) {
                    idle(self.options.idle_poll, stop).await;
                }
            }
            Ok(None) => {
                self.report.empty_polls += 1;
                idle(self.options.idle_poll, stop).await;
            }
            Err(e) => {
                self.report.source_errors += 1;
                warn!(error = %e, source = self.source.name(), "failed to read depth frame");
                idle(self.options.idle_poll, stop).await;
            }
        }
    }

    /// Filter and dispatch one observed frame. Returns `true` if it was sent.
    fn offer(&mut self, frame: DepthFrame) -> bool {
        if !self.filter.should_submit(&frame) {
            self.report.duplicates_suppressed += 1;
            debug!(seq = frame.seq, "frame unchanged since last submission, skipping");
            return false;
        }

        let frame = Arc::new(frame);
        match self.dispatcher.dispatch(Arc::clone(&frame)) {
            Ok(submission) => {
                self.filter.record_submitted(frame);
                self.pending.push(submission);
                self.report.dispatched += 1;
                self.report.peak_in_flight = self.report.peak_in_flight.max(self.pending.len());
                true
            }
            Err(e) => {
                self.report.dispatch_failures += 1;
                warn!(error = %e, seq = frame.seq, "failed to issue frame submission, dropping frame");
                false
            }
        }
    }

    fn reap(&mut self) {
        let summary = self.pending.reap();
        if summary.retired() > 0 {
            debug!(
                completed = summary.completed,
                failed = summary.failed,
                in_flight = self.pending.len(),
                "reaped submissions"
            );
        }
        self.absorb(summary);
    }

    async fn drain(&mut self) {
        info!(outstanding = self.pending.len(), "draining in-flight submissions");
        let summary = self.pending.drain().await;
        self.absorb(summary);
        self.transition(PipelineState::Stopped);

        let r = &self.report;
        info!(
            frames_read = r.frames_read,
            duplicates = r.duplicates_suppressed,
            dispatched = r.dispatched,
            dispatch_failures = r.dispatch_failures,
            empty_polls = r.empty_polls,
            source_errors = r.source_errors,
            completed = r.completed,
            failed = r.failed,
            peak_in_flight = r.peak_in_flight,
            trailing_failures = self.pending.consecutive_failures(),
            "pipeline stopped"
        );
    }

    fn absorb(&mut self, summary: ReapSummary) {
        self.report.completed += summary.completed;
        self.report.failed += summary.failed;
    }

    fn transition(&mut self, next: PipelineState) {
        info!(from = ?self.state, to = ?next, "pipeline state change");
        self.state = next;
    }
}

/// Sleep for one poll interval, waking early on stop.
async fn idle(poll: Duration, stop: &mut StopSignal) {
    tokio::select! {
        _ = stop.stopped() => {}
        _ = tokio::time::sleep(poll) => {}
    }
}
