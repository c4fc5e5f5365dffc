use super::{TransportRequest, TransportService};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl RecordedCall {
    pub fn body_json(&self) -> Option<serde_json::Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

#[derive(Clone)]
enum Scripted {
    Binary(Vec<u8>),
    Json(serde_json::Value),
    Status(StatusCode),
}

/// Answers requests from a path-keyed script and records every call.
///
/// Unscripted GETs answer 404; unscripted POSTs answer a created-record JSON.
#[derive(Clone)]
pub struct MockTransport {
    responses: Arc<Mutex<HashMap<(Method, String), Scripted>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_binary(self, path: &str, data: Vec<u8>) -> Self {
        self.script(Method::GET, path, Scripted::Binary(data))
    }

    pub fn with_get_status(self, path: &str, status: u16) -> Self {
        self.script(Method::GET, path, Scripted::Status(status_code(status)))
    }

    pub fn with_post_json(self, path: &str, response: serde_json::Value) -> Self {
        self.script(Method::POST, path, Scripted::Json(response))
    }

    pub fn with_post_status(self, path: &str, status: u16) -> Self {
        self.script(Method::POST, path, Scripted::Status(status_code(status)))
    }

    fn script(self, method: Method, path: &str, response: Scripted) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert((method, path.to_string()), response);
        self
    }

    pub fn get_calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn get_uploads(&self) -> Vec<RecordedCall> {
        self.get_calls()
            .into_iter()
            .filter(|call| call.method == Method::POST)
            .collect()
    }

    fn record(&self, request: &TransportRequest, body: Option<Vec<u8>>) -> Option<Scripted> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: request.method.clone(),
            path: request.path.clone(),
            headers: request.headers.clone(),
            body,
        });

        self.responses
            .lock()
            .unwrap()
            .get(&(request.method.clone(), request.path.clone()))
            .cloned()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn status_code(status: u16) -> StatusCode {
    StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

fn status_error(request: &TransportRequest, status: StatusCode) -> Error {
    Error::RemoteRequest {
        request: request.describe(),
        status: Some(status),
        source: None,
    }
}

#[async_trait]
impl TransportService for MockTransport {
    async fn fetch_binary(&self, request: &TransportRequest) -> Result<Vec<u8>> {
        match self.record(request, None) {
            Some(Scripted::Binary(data)) => Ok(data),
            Some(Scripted::Json(value)) => Ok(serde_json::to_vec(&value)?),
            Some(Scripted::Status(status)) if status == StatusCode::OK => Ok(Vec::new()),
            Some(Scripted::Status(status)) => Err(status_error(request, status)),
            None => Err(status_error(request, StatusCode::NOT_FOUND)),
        }
    }

    async fn submit_and_parse(
        &self,
        request: &TransportRequest,
        body: Vec<u8>,
    ) -> Result<serde_json::Value> {
        match self.record(request, Some(body)) {
            Some(Scripted::Json(value)) => Ok(value),
            Some(Scripted::Binary(data)) => Ok(serde_json::from_slice(&data)?),
            Some(Scripted::Status(status))
                if status == StatusCode::OK || status == StatusCode::CREATED =>
            {
                Ok(serde_json::json!({}))
            }
            Some(Scripted::Status(status)) => Err(status_error(request, status)),
            None => Ok(serde_json::json!({
                "id": format!("mock-{}", self.get_call_count()),
                "success": true,
                "errors": []
            })),
        }
    }
}
