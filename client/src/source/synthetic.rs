use chrono::Utc;
use depth_scan_common::frame::DepthFrame;
use tracing::info;

use super::{FrameSource, SourceError};

/// Generated depth pattern for running without hardware.
///
/// A diagonal gradient that shifts by one step every `hold` reads, so each
/// scene is reported `hold` times in a row the way a real sensor repeats its
/// last frame when polled faster than it captures.
pub struct SyntheticSource {
    rows: u32,
    cols: u32,
    hold: u64,
    reads: u64,
    current: Option<DepthFrame>,
}

impl SyntheticSource {
    pub fn new(rows: u32, cols: u32, hold: u32) -> Self {
        info!(rows, cols, hold, "using synthetic depth source");
        Self {
            rows,
            cols,
            hold: u64::from(hold.max(1)),
            reads: 0,
            current: None,
        }
    }

    fn render(&self, step: u64) -> Result<DepthFrame, SourceError> {
        let shift = (step % 256) as usize;
        let cols = self.cols as usize;
        let samples = (0..self.rows as usize * cols)
            .map(|i| ((i / cols + i % cols + shift) % 256) as u8)
            .collect();
        let now_ms = Utc::now().timestamp_millis();
        Ok(DepthFrame::new(self.rows, self.cols, samples, now_ms, step)?)
    }
}

impl FrameSource for SyntheticSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        let read = self.reads;
        self.reads += 1;
        if read % self.hold == 0 || self.current.is_none() {
            self.current = Some(self.render(read / self.hold)?);
        }
        Ok(self.current.clone())
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
