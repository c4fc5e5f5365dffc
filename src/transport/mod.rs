//! Outbound HTTP exchanges with the document API
//!
//! A [`TransportService`] performs exactly one request/response exchange per
//! call. It never retries and never logs at a level above debug on success;
//! failures carry a [`RequestDescription`] that omits headers so bearer
//! tokens stay out of error messages.

pub mod client;
pub mod mock;

pub use client::HttpTransport;
pub use mock::MockTransport;

use crate::Result;
use async_trait::async_trait;
use reqwest::Method;
use std::fmt;

#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    /// Scheme and host, e.g. `https://acme.my.salesforce.com`.
    pub base_url: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn new(method: Method, base_url: &str, path: String) -> Self {
        Self {
            method,
            base_url: base_url.trim_end_matches('/').to_string(),
            path,
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.push((name.to_string(), value));
        self
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.base_url, self.path)
    }

    pub fn describe(&self) -> RequestDescription {
        RequestDescription {
            method: self.method.clone(),
            url: self.url(),
        }
    }
}

/// Header-free summary of a request, safe to log.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescription {
    pub method: Method,
    pub url: String,
}

impl fmt::Display for RequestDescription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[async_trait]
pub trait TransportService: Send + Sync {
    /// Returns the full response body; only HTTP 200 counts as success.
    async fn fetch_binary(&self, request: &TransportRequest) -> Result<Vec<u8>>;

    /// Sends `body` and parses the JSON response; HTTP 200 and 201 count as success.
    async fn submit_and_parse(
        &self,
        request: &TransportRequest,
        body: Vec<u8>,
    ) -> Result<serde_json::Value>;
}
