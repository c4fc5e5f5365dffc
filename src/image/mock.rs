use super::{ImageService, TargetFormat};
use crate::error::TranscodeError;
use crate::models::EncodingOptions;
use crate::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct TranscodeCall {
    pub input: Vec<u8>,
    pub format_hint: Option<String>,
    pub options: EncodingOptions,
}

/// Prefixes the input with a marker instead of encoding it.
///
/// Mirrors the real transcoder's format dispatch so unsupported extensions
/// still fail the same way.
#[derive(Clone)]
pub struct MockTranscoder {
    calls: Arc<Mutex<Vec<TranscodeCall>>>,
    output_prefix: Vec<u8>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockTranscoder {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            output_prefix: b"compressed:".to_vec(),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_output_prefix(mut self, prefix: &[u8]) -> Self {
        self.output_prefix = prefix.to_vec();
        self
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_calls(&self) -> Vec<TranscodeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for MockTranscoder {
    async fn transcode(
        &self,
        image_data: &[u8],
        format_hint: Option<&str>,
        options: &EncodingOptions,
    ) -> Result<Vec<u8>> {
        self.calls.lock().unwrap().push(TranscodeCall {
            input: image_data.to_vec(),
            format_hint: format_hint.map(str::to_string),
            options: options.clone(),
        });

        if *self.should_fail.lock().unwrap() {
            return Err(TranscodeError::Decode(image::ImageError::IoError(
                std::io::Error::other("Mock failure"),
            ))
            .into());
        }

        if TargetFormat::from_hint(format_hint).is_none() {
            return Err(TranscodeError::UnsupportedFormat(format_hint.map(str::to_string)).into());
        }

        let mut output = self.output_prefix.clone();
        output.extend_from_slice(image_data);
        Ok(output)
    }
}
