//! Invocation entry point: payload validation, option defaults, batch dispatch.

use crate::batch::{BatchProcessor, BatchSettings};
use crate::content_version::ContentVersionApi;
use crate::image::{ImageService, ImageTranscoder};
use crate::models::{BatchResult, Config, EncodingOptions, InvocationPayload, OrgContext};
use crate::transport::{HttpTransport, TransportService};
use crate::{Error, Result};
use serde_json::Value;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

pub struct App {
    processor: BatchProcessor,
}

/// Injectable service bundle used to construct [`App`] in tests/harnesses.
pub struct AppServices {
    pub transport: Box<dyn TransportService>,
    pub transcoder: Box<dyn ImageService>,
}

impl App {
    /// Build an app from concrete service dependencies.
    ///
    /// This is primarily useful for integration tests and local harnesses that
    /// need to inject mocks.
    pub fn with_services(services: AppServices, org: OrgContext, settings: BatchSettings) -> Self {
        Self {
            processor: BatchProcessor::new(
                services.transport,
                services.transcoder,
                ContentVersionApi::new(org),
                settings,
            ),
        }
    }

    /// Construct an app from environment configuration (`Config::from_env`).
    pub fn new() -> Result<Self> {
        let config = Config::from_env()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self> {
        info!(
            "Org {} (API v{}), max concurrency {}, unsupported formats: {:?}",
            config.org.domain_url,
            config.org.api_version,
            config.max_concurrency,
            config.unsupported_format
        );

        let services = AppServices {
            transport: Box::new(HttpTransport::new(config.http_timeout)?),
            transcoder: Box::new(ImageTranscoder::new()),
        };
        let settings = BatchSettings {
            max_concurrency: config.max_concurrency,
            unsupported_format: config.unsupported_format,
        };

        Ok(Self::with_services(services, config.org, settings))
    }

    /// Handle one invocation payload.
    ///
    /// Per-file failures are reported in the result; only a payload that cannot
    /// be turned into a file list fails the whole invocation.
    pub async fn handle(&self, payload: Value) -> Result<BatchResult> {
        let invocation_id = Uuid::new_v4();
        let span = info_span!("invocation", id = %invocation_id);

        async move {
            info!("Invoking with payload {}", payload);

            let payload = match Self::parse_payload(payload) {
                Ok(payload) => payload,
                Err(e) => {
                    let failure = Error::batch_failure(e);
                    error!("{}", failure.report());
                    return Err(failure);
                }
            };

            let files = payload.files.unwrap_or_default();
            let options = EncodingOptions::merged_over_defaults(payload.sharp_configuration);
            info!("Processing {} file(s) with options {:?}", files.len(), options);

            Ok(self.processor.process_batch(&files, &options).await)
        }
        .instrument(span)
        .await
    }

    fn parse_payload(payload: Value) -> Result<InvocationPayload> {
        match payload {
            Value::Null => Ok(InvocationPayload::default()),
            Value::Object(map) => Ok(serde_json::from_value(Value::Object(map))?),
            other => Err(Error::InvalidPayload(format!(
                "Invocation payload must be a JSON object, got {}",
                other
            ))),
        }
    }
}
