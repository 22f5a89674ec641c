mod dispatch;
mod filter;
mod pipeline;
mod reaper;
mod service;
mod shutdown;
mod source;
#[cfg(test)]
mod testing;

use depth_scan_common::config::{Config, ConfigError};
use pipeline::{Pipeline, PipelineOptions};
use service::HttpMeshBuilder;
use source::{HttpDepthSource, SensorSource, SourceError, SyntheticSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

const USAGE: &str = "Usage: depth-scan-client <address:port> <project_name>";
const CONFIG_ENV: &str = "DEPTH_SCAN_CONFIG";

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();
    let (address, project) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(1);
        }
    };

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        address = %address,
        project = %project,
        sensor = %config.sensor.mode,
        capture = %config.capture.mode,
        max_in_flight = config.capture.max_in_flight,
        "starting depth-scan client"
    );

    let service = match HttpMeshBuilder::new(address, &config.service) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "failed to set up mesh-builder client");
            std::process::exit(1);
        }
    };

    let source = match build_source(&config) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to set up depth source");
            std::process::exit(1);
        }
    };

    let (stop_handle, mut stop) = shutdown::stop_channel();
    shutdown::stop_on_ctrl_c(stop_handle);

    let options = match PipelineOptions::from_config(&config.capture) {
        Ok(o) => o,
        Err(e) => {
            error!(error = %e, "invalid capture settings");
            std::process::exit(1);
        }
    };
    let mut pipeline = Pipeline::new(source, service, project, options);
    match pipeline.run(&mut stop).await {
        Ok(report) => {
            info!(
                state = ?pipeline.state(),
                in_flight = pipeline.in_flight(),
                dispatched = report.dispatched,
                completed = report.completed,
                failed = report.failed,
                "all submissions finished"
            );
        }
        Err(e) => {
            error!(error = %e, "client failed to start");
            std::process::exit(1);
        }
    }
}

/// Expects exactly `<program> <address:port> <project_name>`.
fn parse_args(args: &[String]) -> Result<(&str, &str), &'static str> {
    match args {
        [_, address, project] => Ok((address.as_str(), project.as_str())),
        _ => Err(USAGE),
    }
}

/// `$DEPTH_SCAN_CONFIG`, else `./config.toml` if present, else defaults.
fn load_config() -> Result<Config, ConfigError> {
    match std::env::var_os(CONFIG_ENV) {
        Some(path) => Config::load(&PathBuf::from(path)),
        None => {
            let local = Path::new("config.toml");
            if local.exists() {
                Config::load(local)
            } else {
                Ok(Config::default())
            }
        }
    }
}

fn build_source(config: &Config) -> Result<SensorSource, SourceError> {
    match config.sensor.mode.as_str() {
        "synthetic" => Ok(SensorSource::Synthetic(SyntheticSource::new(
            config.sensor.rows,
            config.sensor.cols,
            config.sensor.hold_frames,
        ))),
        _ => Ok(SensorSource::Http(HttpDepthSource::new(
            &config.sensor.url,
            Duration::from_millis(config.service.connect_timeout_ms),
            Duration::from_millis(config.service.request_timeout_ms),
        )?)),
    }
}
