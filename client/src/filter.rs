use depth_scan_common::frame::DepthFrame;
use std::sync::Arc;

/// Returns `true` unless `candidate` is sample-for-sample identical to the
/// last submitted frame. With nothing submitted yet every frame qualifies.
pub fn should_submit(candidate: &DepthFrame, last_submitted: Option<&DepthFrame>) -> bool {
    last_submitted != Some(candidate)
}

/// Suppresses immediate repeats of the last *dispatched* frame.
///
/// Only the single most recent submission is remembered, so a scene that
/// returns after something else was sent is submitted again.
#[derive(Debug, Default)]
pub struct ChangeFilter {
    last_submitted: Option<Arc<DepthFrame>>,
}

impl ChangeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn should_submit(&self, candidate: &DepthFrame) -> bool {
        should_submit(candidate, self.last_submitted.as_deref())
    }

    /// Remember `frame` as the latest dispatched frame.
    pub fn record_submitted(&mut self, frame: Arc<DepthFrame>) {
        self.last_submitted = Some(frame);
    }
}
