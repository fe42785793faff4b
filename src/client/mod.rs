mod channel;

pub use channel::{EventChannel, EventChannelHandlers};

use crate::config::Settings;
use crate::records::{
    HealthStatus, RunRecord, RunStarted, RunWorkflowRequest, WorkflowCreate, WorkflowRecord,
    WorkflowUpdate,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request to {path} failed: {reason}")]
    Request { path: String, reason: String },
    #[error("server returned {status} for {path}: {body}")]
    Status {
        status: u16,
        path: String,
        body: String,
    },
    #[error("failed to decode response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot derive event channel address from `{base}`: {reason}")]
    ChannelAddress { base: String, reason: String },
    #[error("event channel connect failed for {url}: {reason}")]
    ChannelConnect { url: String, reason: String },
}

/// REST gateway to the workflow service. Holds no request state; every call
/// is a single round trip with a JSON body and a typed response.
#[derive(Debug, Clone)]
pub struct ApiClient {
    api_base: String,
    event_base: Option<String>,
    log_root: Option<PathBuf>,
}

impl ApiClient {
    pub fn new(api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            event_base: None,
            log_root: None,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut client = Self::new(settings.api_base.clone());
        client.event_base = settings.event_base.clone();
        client.log_root = Some(settings.state_root.clone());
        client
    }

    pub fn with_event_base(mut self, event_base: impl Into<String>) -> Self {
        self.event_base = Some(event_base.into().trim_end_matches('/').to_string());
        self
    }

    pub fn with_log_root(mut self, log_root: impl Into<PathBuf>) -> Self {
        self.log_root = Some(log_root.into());
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    pub fn health(&self) -> Result<HealthStatus, TransportError> {
        self.request_value("GET", "/health", None)
    }

    pub fn create_workflow(&self, request: &WorkflowCreate) -> Result<WorkflowRecord, TransportError> {
        let body = encode_body("/workflows", request)?;
        self.request_value("POST", "/workflows", Some(&body))
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowRecord>, TransportError> {
        self.request_value("GET", "/workflows", None)
    }

    pub fn get_workflow(&self, workflow_id: &str) -> Result<WorkflowRecord, TransportError> {
        self.request_value("GET", &workflow_path(workflow_id, ""), None)
    }

    pub fn update_workflow(
        &self,
        workflow_id: &str,
        request: &WorkflowUpdate,
    ) -> Result<WorkflowRecord, TransportError> {
        let path = workflow_path(workflow_id, "");
        let body = encode_body(&path, request)?;
        self.request_value("PUT", &path, Some(&body))
    }

    pub fn delete_workflow(&self, workflow_id: &str) -> Result<(), TransportError> {
        self.request_unit("DELETE", &workflow_path(workflow_id, ""))
    }

    pub fn export_workflow(&self, workflow_id: &str) -> Result<Value, TransportError> {
        self.request_value("GET", &workflow_path(workflow_id, "/export"), None)
    }

    pub fn import_workflow(&self, workflow: &Value) -> Result<WorkflowRecord, TransportError> {
        self.request_value("POST", "/workflows/import", Some(workflow))
    }

    pub fn start_run(
        &self,
        workflow_id: &str,
        initial_context: &str,
    ) -> Result<RunStarted, TransportError> {
        let path = workflow_path(workflow_id, "/run");
        let body = encode_body(
            &path,
            &RunWorkflowRequest {
                initial_context: initial_context.to_string(),
            },
        )?;
        self.request_value("POST", &path, Some(&body))
    }

    pub fn get_run(&self, run_id: &str) -> Result<RunRecord, TransportError> {
        self.request_value("GET", &format!("/runs/{}", urlencoding::encode(run_id)), None)
    }

    pub fn list_runs(&self) -> Result<Vec<RunRecord>, TransportError> {
        self.request_value("GET", "/runs", None)
    }

    /// Derives the per-run channel address from the REST base by swapping the
    /// scheme (http -> ws, https -> wss) and appending the fixed per-run path.
    /// A configured `event_base` takes precedence over derivation.
    pub fn event_channel_url(&self, run_id: &str) -> Result<String, TransportError> {
        let base = match &self.event_base {
            Some(base) => base.clone(),
            None => {
                if let Some(rest) = self.api_base.strip_prefix("http://") {
                    format!("ws://{rest}")
                } else if let Some(rest) = self.api_base.strip_prefix("https://") {
                    format!("wss://{rest}")
                } else {
                    return Err(TransportError::ChannelAddress {
                        base: self.api_base.clone(),
                        reason: "expected an http:// or https:// base".to_string(),
                    });
                }
            }
        };
        Ok(format!(
            "{}/runs/{}/events",
            base.trim_end_matches('/'),
            urlencoding::encode(run_id)
        ))
    }

    pub fn open_event_channel(
        &self,
        run_id: &str,
        handlers: EventChannelHandlers,
    ) -> Result<EventChannel, TransportError> {
        let url = self.event_channel_url(run_id)?;
        EventChannel::open(&url, self.log_root.clone(), handlers)
    }

    fn request_value<T: DeserializeOwned>(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, TransportError> {
        let raw = self.request_raw(method, path, body)?;
        serde_json::from_str(&raw).map_err(|source| TransportError::Decode {
            path: path.to_string(),
            source,
        })
    }

    fn request_unit(&self, method: &str, path: &str) -> Result<(), TransportError> {
        self.request_raw(method, path, None).map(|_| ())
    }

    fn request_raw(
        &self,
        method: &str,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, TransportError> {
        let url = format!("{}{}", self.api_base, path);
        let request = ureq::request(method, &url)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json");
        let result = match body {
            Some(value) => request.send_json(value.clone()),
            None => request.call(),
        };
        match result {
            Ok(response) => response.into_string().map_err(|err| TransportError::Request {
                path: path.to_string(),
                reason: err.to_string(),
            }),
            Err(ureq::Error::Status(status, response)) => Err(TransportError::Status {
                status,
                path: path.to_string(),
                body: response.into_string().unwrap_or_default(),
            }),
            Err(err) => Err(TransportError::Request {
                path: path.to_string(),
                reason: err.to_string(),
            }),
        }
    }
}

fn workflow_path(workflow_id: &str, suffix: &str) -> String {
    format!("/workflows/{}{}", urlencoding::encode(workflow_id), suffix)
}

fn encode_body<B: Serialize>(path: &str, body: &B) -> Result<Value, TransportError> {
    serde_json::to_value(body).map_err(|err| TransportError::Request {
        path: path.to_string(),
        reason: format!("failed to encode request body: {err}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_channel_url_substitutes_scheme_and_appends_run_path() {
        let client = ApiClient::new("http://127.0.0.1:8000");
        assert_eq!(
            client.event_channel_url("run-1").expect("derive url"),
            "ws://127.0.0.1:8000/runs/run-1/events"
        );

        let secure = ApiClient::new("https://workflows.example/");
        assert_eq!(
            secure.event_channel_url("run-1").expect("derive url"),
            "wss://workflows.example/runs/run-1/events"
        );
    }

    #[test]
    fn configured_event_base_wins_over_derivation() {
        let client =
            ApiClient::new("http://127.0.0.1:8000").with_event_base("ws://127.0.0.1:9100/");
        assert_eq!(
            client.event_channel_url("run-1").expect("derive url"),
            "ws://127.0.0.1:9100/runs/run-1/events"
        );
    }

    #[test]
    fn event_channel_url_rejects_unsupported_base_scheme() {
        let client = ApiClient {
            api_base: "ftp://workflows.example".to_string(),
            event_base: None,
            log_root: None,
        };
        let err = client.event_channel_url("run-1").expect_err("reject scheme");
        assert!(matches!(err, TransportError::ChannelAddress { .. }));
    }

    #[test]
    fn workflow_paths_encode_id_segments() {
        assert_eq!(
            workflow_path("w 1", "/run"),
            "/workflows/w%201/run"
        );
    }
}
