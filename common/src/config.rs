use serde::Deserialize;
use std::path::Path;
use tracing::debug;

use crate::frame::{FieldOfView, DEFAULT_H_FOV, DEFAULT_V_FOV};

/// Client configuration. Every section has defaults, so an empty file
/// (or no file at all) yields a working setup against a local sensor bridge.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Transport settings for the mesh-builder service.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorConfig {
    /// `"http"` (poll a sensor bridge) or `"synthetic"` (generated test pattern).
    #[serde(default = "default_sensor_mode")]
    pub mode: String,
    #[serde(default = "default_sensor_url")]
    pub url: String,
    #[serde(default = "default_rows")]
    pub rows: u32,
    #[serde(default = "default_cols")]
    pub cols: u32,
    /// Number of consecutive reads a synthetic frame is repeated for.
    #[serde(default = "default_hold_frames")]
    pub hold_frames: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureConfig {
    /// `"stream"` (until stopped) or `"count"` (send `frame_count` changed frames).
    #[serde(default = "default_capture_mode")]
    pub mode: String,
    #[serde(default = "default_frame_count")]
    pub frame_count: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_idle_poll_ms")]
    pub idle_poll_ms: u64,
    #[serde(default = "default_h_fov")]
    pub h_fov: f32,
    #[serde(default = "default_v_fov")]
    pub v_fov: f32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: default_connect_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: default_sensor_mode(),
            url: default_sensor_url(),
            rows: default_rows(),
            cols: default_cols(),
            hold_frames: default_hold_frames(),
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            mode: default_capture_mode(),
            frame_count: default_frame_count(),
            max_in_flight: default_max_in_flight(),
            idle_poll_ms: default_idle_poll_ms(),
            h_fov: default_h_fov(),
            v_fov: default_v_fov(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl CaptureConfig {
    pub fn field_of_view(&self) -> FieldOfView {
        FieldOfView {
            horizontal: self.h_fov,
            vertical: self.v_fov,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadFile(path.display().to_string(), e))?;
        let config = Self::parse(&content)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.sensor.mode.as_str() {
            "http" | "synthetic" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown sensor mode '{other}', expected 'http' or 'synthetic'"
                )))
            }
        }
        if self.sensor.mode == "synthetic" && (self.sensor.rows == 0 || self.sensor.cols == 0) {
            return Err(ConfigError::Invalid(
                "synthetic sensor needs non-zero rows and cols".into(),
            ));
        }
        match self.capture.mode.as_str() {
            "stream" => {}
            "count" if self.capture.frame_count == 0 => {
                return Err(ConfigError::Invalid(
                    "capture.frame_count must be at least 1 in count mode".into(),
                ))
            }
            "count" => {}
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown capture mode '{other}', expected 'stream' or 'count'"
                )))
            }
        }
        if self.capture.max_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "capture.max_in_flight must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    ReadFile(String, std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

// Default value functions
fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_sensor_mode() -> String {
    "http".into()
}
fn default_sensor_url() -> String {
    "http://127.0.0.1:8090/depth".into()
}
fn default_rows() -> u32 {
    480
}
fn default_cols() -> u32 {
    640
}
fn default_hold_frames() -> u32 {
    3
}
fn default_capture_mode() -> String {
    "stream".into()
}
fn default_frame_count() -> u64 {
    2
}
fn default_max_in_flight() -> usize {
    4
}
fn default_idle_poll_ms() -> u64 {
    10
}
fn default_h_fov() -> f32 {
    DEFAULT_H_FOV
}
fn default_v_fov() -> f32 {
    DEFAULT_V_FOV
}
fn default_log_level() -> String {
    "info".into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.sensor.mode, "http");
        assert_eq!(config.capture.mode, "stream");
        assert_eq!(config.capture.frame_count, 2);
        assert_eq!(config.capture.max_in_flight, 4);
        assert_eq!(config.capture.field_of_view(), FieldOfView::default());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::parse(
            r#"
            [capture]
            mode = "count"
            frame_count = 5

            [sensor]
            mode = "synthetic"
            rows = 4
            cols = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.capture.frame_count, 5);
        assert_eq!(config.capture.idle_poll_ms, 10);
        assert_eq!(config.sensor.rows, 4);
        assert_eq!(config.sensor.hold_frames, 3);
        assert_eq!(config.service.request_timeout_ms, 10_000);
    }

    #[test]
    fn zero_in_flight_rejected() {
        let err = Config::parse("[capture]\nmax_in_flight = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_count_rejected_only_in_count_mode() {
        assert!(Config::parse("[capture]\nframe_count = 0\n").is_ok());
        assert!(Config::parse("[capture]\nmode = \"count\"\nframe_count = 0\n").is_err());
    }

    #[test]
    fn unknown_modes_rejected() {
        assert!(Config::parse("[sensor]\nmode = \"usb\"\n").is_err());
        assert!(Config::parse("[capture]\nmode = \"burst\"\n").is_err());
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            Config::parse("[capture\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
