use super::{TransportRequest, TransportService};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::new_with_client(client))
    }

    pub fn new_with_client(client: Client) -> Self {
        Self { client }
    }

    fn build(&self, request: &TransportRequest) -> RequestBuilder {
        request
            .headers
            .iter()
            .fold(
                self.client.request(request.method.clone(), request.url()),
                |builder, (name, value)| builder.header(name, value),
            )
    }

    async fn exchange(
        &self,
        request: &TransportRequest,
        builder: RequestBuilder,
        accepted: &[StatusCode],
    ) -> Result<Response> {
        let response = builder.send().await.map_err(|e| {
            tracing::error!("Failed to send {}: {}", request.describe(), e);
            Error::RemoteRequest {
                request: request.describe(),
                status: None,
                source: Some(e),
            }
        })?;

        let status = response.status();
        if !accepted.contains(&status) {
            return Err(Error::RemoteRequest {
                request: request.describe(),
                status: Some(status),
                source: None,
            });
        }

        Ok(response)
    }

    async fn read_body(request: &TransportRequest, response: Response) -> Result<Vec<u8>> {
        let bytes = response.bytes().await.map_err(|e| Error::RemoteRequest {
            request: request.describe(),
            status: None,
            source: Some(e),
        })?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TransportService for HttpTransport {
    async fn fetch_binary(&self, request: &TransportRequest) -> Result<Vec<u8>> {
        tracing::debug!("Fetching {}", request.describe());

        let response = self
            .exchange(request, self.build(request), &[StatusCode::OK])
            .await?;

        Self::read_body(request, response).await
    }

    async fn submit_and_parse(
        &self,
        request: &TransportRequest,
        body: Vec<u8>,
    ) -> Result<serde_json::Value> {
        tracing::debug!("Submitting {} ({} bytes)", request.describe(), body.len());

        let response = self
            .exchange(
                request,
                self.build(request).body(body),
                &[StatusCode::CREATED, StatusCode::OK],
            )
            .await?;

        let body = Self::read_body(request, response).await?;
        serde_json::from_slice(&body).map_err(|e| {
            tracing::error!(
                "Failed to parse response to {}: {}\nBody: {}",
                request.describe(),
                e,
                String::from_utf8_lossy(&body)
            );
            Error::ResponseParse {
                request: request.describe(),
                source: e,
            }
        })
    }
}
