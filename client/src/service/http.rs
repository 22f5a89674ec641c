use depth_scan_common::config::ServiceConfig;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use std::time::Duration;
use tracing::{debug, info};

use super::{AddFrameRequest, MeshBuilder, ServiceError, SubmitFuture};

/// Mesh-builder client speaking JSON over HTTP.
///
///   POST {base}/projects                  {"name": ..}       409 = already exists
///   POST {base}/projects/{name}/frames    AddFrameRequest    404 = unknown project
pub struct HttpMeshBuilder {
    client: reqwest::Client,
    base: Url,
}

impl HttpMeshBuilder {
    /// `address` is `host:port` or a full `http(s)://` URL.
    pub fn new(address: &str, config: &ServiceConfig) -> Result<Self, ServiceError> {
        let base = parse_address(address)?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(config.connect_timeout_ms))
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(ServiceError::ClientBuild)?;
        info!(base = %base, "mesh-builder client ready");
        Ok(Self { client, base })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ServiceError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ServiceError::InvalidAddress(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

impl MeshBuilder for HttpMeshBuilder {
    async fn create_project(&self, name: &str) -> Result<(), ServiceError> {
        let url = self.url(&["projects"])?;
        debug!(url = %url, project = name, "creating project");
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(ServiceError::Transport)?;
        create_outcome(response.status(), name)
    }

    fn submit_frame(&self, request: AddFrameRequest) -> Result<SubmitFuture, ServiceError> {
        let url = self.url(&["projects", request.project.as_str(), "frames"])?;
        let body = request.to_json()?;
        let http_request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()
            .map_err(ServiceError::Transport)?;

        let client = self.client.clone();
        let project = request.project;
        Ok(Box::pin(async move {
            let response = client
                .execute(http_request)
                .await
                .map_err(ServiceError::Transport)?;
            add_outcome(response.status(), &project)
        }))
    }
}

/// Accept `host:port` (scheme defaults to http) or an explicit http(s) URL.
fn parse_address(address: &str) -> Result<Url, ServiceError> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidAddress(address.to_string()));
    }
    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{trimmed}")
    };
    let url =
        Url::parse(&candidate).map_err(|_| ServiceError::InvalidAddress(address.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(ServiceError::InvalidAddress(address.to_string())),
    }
}

fn create_outcome(status: StatusCode, name: &str) -> Result<(), ServiceError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::CONFLICT => Err(ServiceError::AlreadyExists(name.to_string())),
        s => Err(ServiceError::Status(s.as_u16())),
    }
}

fn add_outcome(status: StatusCode, project: &str) -> Result<(), ServiceError> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(ServiceError::UnknownProject(project.to_string())),
        s => Err(ServiceError::Status(s.as_u16())),
    }
}
