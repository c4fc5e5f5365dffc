//! Request builders for the Salesforce ContentVersion REST endpoints.

use crate::models::OrgContext;
use crate::transport::TransportRequest;
use crate::{Error, Result};
use reqwest::Method;

#[derive(Debug, Clone)]
pub struct ContentVersionApi {
    org: OrgContext,
}

impl ContentVersionApi {
    pub fn new(org: OrgContext) -> Self {
        Self { org }
    }

    fn sobjects_path(&self) -> String {
        format!(
            "/services/data/v{}/sobjects/ContentVersion",
            self.org.api_version
        )
    }

    fn authorized(&self, method: Method, path: String) -> TransportRequest {
        TransportRequest::new(method, &self.org.domain_url, path).with_header(
            "Authorization",
            format!("Bearer {}", self.org.access_token),
        )
    }

    pub fn version_data_path(&self, content_version_id: &str) -> String {
        format!("{}/{}/VersionData", self.sobjects_path(), content_version_id)
    }

    pub fn create_version_path(&self) -> String {
        self.sobjects_path()
    }

    /// `GET .../ContentVersion/{id}/VersionData`, answering raw file bytes.
    ///
    /// Ids are Salesforce record ids and must be ASCII alphanumeric, so they
    /// cannot redirect the authorized request to another path.
    pub fn download(&self, content_version_id: &str) -> Result<TransportRequest> {
        if content_version_id.is_empty()
            || !content_version_id.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(Error::InvalidContentVersionId(
                content_version_id.to_string(),
            ));
        }
        Ok(self.authorized(Method::GET, self.version_data_path(content_version_id)))
    }

    /// `POST .../ContentVersion` with a JSON `NewVersion` body.
    pub fn create_version(&self) -> TransportRequest {
        self.authorized(Method::POST, self.create_version_path())
            .with_header("Content-Type", "application/json".to_string())
    }
}
