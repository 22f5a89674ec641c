//! Depth frame acquisition.
//!
//! The pipeline only ever asks for "the latest frame". Sources may hand back
//! the same scene repeatedly when the sensor has nothing new; deduplication is
//! the change filter's job, not theirs.

pub mod http;
pub mod synthetic;

use depth_scan_common::frame::{DepthFrame, FrameError};
use std::future::Future;

pub use http::HttpDepthSource;
pub use synthetic::SyntheticSource;

/// Something that can be polled for the most recent depth frame.
pub trait FrameSource: Send {
    /// Returns the latest known frame, or `None` if nothing is available yet.
    /// Must not wait for the sensor to produce a new frame.
    fn next_frame(
        &mut self,
    ) -> impl Future<Output = Result<Option<DepthFrame>, SourceError>> + Send;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

/// Source selected from configuration at startup.
pub enum SensorSource {
    Http(HttpDepthSource),
    Synthetic(SyntheticSource),
}

impl FrameSource for SensorSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        match self {
            SensorSource::Http(source) => source.next_frame().await,
            SensorSource::Synthetic(source) => source.next_frame().await,
        }
    }

    fn name(&self) -> &str {
        match self {
            SensorSource::Http(source) => source.name(),
            SensorSource::Synthetic(source) => source.name(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("failed to build sensor HTTP client: {0}")]
    ClientBuild(reqwest::Error),
    #[error("sensor bridge request failed: {0}")]
    HttpConnect(reqwest::Error),
    #[error("sensor bridge body error: {0}")]
    HttpBody(reqwest::Error),
    #[error("sensor bridge HTTP status {0}")]
    HttpStatus(u16),
    #[error("invalid depth frame: {0}")]
    Frame(#[from] FrameError),
}
