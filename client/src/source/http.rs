use bytes::Bytes;
use depth_scan_common::frame::DepthFrame;
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, info};

use super::{FrameSource, SourceError};

/// Polls a sensor bridge that serves the latest depth frame over HTTP.
///
/// `200` carries a binary [`DepthFrame`] payload, `204` means the sensor has
/// not produced a frame yet. The bridge always answers with whatever it has,
/// so a poll costs one local round trip and never waits on the sensor.
pub struct HttpDepthSource {
    client: reqwest::Client,
    url: String,
    polls: u64,
}

impl HttpDepthSource {
    pub fn new(
        url: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .map_err(SourceError::ClientBuild)?;
        info!(url, "polling sensor bridge for depth frames");
        Ok(Self {
            client,
            url: url.to_string(),
            polls: 0,
        })
    }
}

impl FrameSource for HttpDepthSource {
    async fn next_frame(&mut self) -> Result<Option<DepthFrame>, SourceError> {
        self.polls += 1;
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(SourceError::HttpConnect)?;

        match response.status() {
            StatusCode::NO_CONTENT => {
                debug!(polls = self.polls, "sensor bridge has no frame yet");
                Ok(None)
            }
            status if status.is_success() => {
                let body = response.bytes().await.map_err(SourceError::HttpBody)?;
                decode_body(body).map(Some)
            }
            status => Err(SourceError::HttpStatus(status.as_u16())),
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}

fn decode_body(body: Bytes) -> Result<DepthFrame, SourceError> {
    Ok(DepthFrame::deserialize(&body)?)
}
