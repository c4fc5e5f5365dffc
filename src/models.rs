//! Data models and structures
//!
//! Defines the invocation payload and result, the per-file descriptors, the
//! encoding options handed to the transcoder, the ContentVersion upload
//! payload, and the environment-driven configuration.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

pub const DEFAULT_QUALITY: u8 = 50;
pub const REASON_FOR_CHANGE: &str = "Compressed file";
pub const DEFAULT_API_VERSION: &str = "59.0";

/// One unit of work: a ContentVersion to recompress.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    pub content_version_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_document_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub path_on_client: String,
    #[serde(default, alias = "extension")]
    pub file_extension: Option<String>,
}

// Apex and JS callers send `null` for unset fields
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Named encoder tunables, passed through to the transcoder as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct EncodingOptions(Map<String, Value>);

impl EncodingOptions {
    pub fn empty() -> Self {
        Self(Map::new())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Defaults with every caller-supplied key layered on top.
    pub fn merged_over_defaults(overrides: Option<EncodingOptions>) -> Self {
        let mut merged = Self::default();
        if let Some(overrides) = overrides {
            merged.0.extend(overrides.0);
        }
        merged
    }
}

impl Default for EncodingOptions {
    fn default() -> Self {
        Self::empty().with("quality", DEFAULT_QUALITY)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationPayload {
    #[serde(default)]
    pub files: Option<Vec<FileDescriptor>>,
    #[serde(default)]
    pub sharp_configuration: Option<EncodingOptions>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    #[serde(rename = "successCVIds")]
    pub success_cv_ids: Vec<String>,
    #[serde(rename = "failedCVIds")]
    pub failed_cv_ids: Vec<String>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, id: String) {
        self.success_cv_ids.push(id);
    }

    pub fn record_failure(&mut self, id: String) {
        self.failed_cv_ids.push(id);
    }

    pub fn len(&self) -> usize {
        self.success_cv_ids.len() + self.failed_cv_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Body of the "create ContentVersion" request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NewVersion {
    pub title: String,
    pub path_on_client: String,
    pub version_data: String,
    pub content_document_id: String,
    pub is_major_version: bool,
    pub reason_for_change: String,
}

impl NewVersion {
    pub fn compressed(file: &FileDescriptor, data: &[u8]) -> Self {
        use base64::Engine as _;

        Self {
            title: file.title.clone(),
            path_on_client: file.path_on_client.clone(),
            version_data: base64::engine::general_purpose::STANDARD.encode(data),
            content_document_id: file.content_document_id.clone(),
            is_major_version: true,
            reason_for_change: REASON_FOR_CHANGE.to_string(),
        }
    }
}

/// Connection details for the Salesforce org that owns the files.
#[derive(Debug, Clone)]
pub struct OrgContext {
    pub domain_url: String,
    pub api_version: String,
    pub access_token: String,
}

/// What to do with files whose extension has no encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnsupportedFormatPolicy {
    #[default]
    Fail,
    PassThrough,
}

impl std::str::FromStr for UnsupportedFormatPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "passthrough" | "pass-through" => Ok(Self::PassThrough),
            other => Err(crate::Error::Config(format!(
                "Invalid UNSUPPORTED_FORMAT '{}'. Expected 'fail' or 'passthrough'",
                other
            ))),
        }
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub org: OrgContext,
    pub http_timeout: Duration,
    pub max_concurrency: usize,
    pub unsupported_format: UnsupportedFormatPolicy,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| crate::Error::Config(format!("{} not set", key)))
        };

        let http_timeout_secs = match lookup("HTTP_TIMEOUT_SECS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                crate::Error::Config(format!("Invalid HTTP_TIMEOUT_SECS '{}'", raw))
            })?,
            None => 30,
        };

        let max_concurrency = match lookup("MAX_CONCURRENCY") {
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(n) if n >= 1 => n,
                _ => {
                    return Err(crate::Error::Config(format!(
                        "Invalid MAX_CONCURRENCY '{}'. Expected an integer >= 1",
                        raw
                    )))
                }
            },
            None => 1,
        };

        let unsupported_format = match lookup("UNSUPPORTED_FORMAT") {
            Some(raw) => raw.parse()?,
            None => UnsupportedFormatPolicy::default(),
        };

        Ok(Self {
            org: OrgContext {
                domain_url: required("SF_DOMAIN_URL")?,
                api_version: lookup("SF_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                access_token: required("SF_ACCESS_TOKEN")?,
            },
            http_timeout: Duration::from_secs(http_timeout_secs),
            max_concurrency,
            unsupported_format,
        })
    }
}
