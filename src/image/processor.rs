use super::{ImageService, TargetFormat};
use crate::error::TranscodeError;
use crate::models::{EncodingOptions, DEFAULT_QUALITY};
use crate::Result;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, DynamicImage};
use serde_json::Value;

/// Encoder settings resolved from [`EncodingOptions`].
#[derive(Debug, Clone, Copy, PartialEq)]
enum EncoderSettings {
    Jpeg {
        quality: u8,
    },
    Png {
        compression: CompressionType,
        filter: FilterType,
    },
}

impl EncoderSettings {
    fn resolve(format: TargetFormat, options: &EncodingOptions) -> Result<Self> {
        match format {
            TargetFormat::Jpeg => {
                let quality = match options.get("quality") {
                    Some(value) => integer_in(value, "quality", 1, 100)? as u8,
                    None => DEFAULT_QUALITY,
                };
                Ok(Self::Jpeg { quality })
            }
            TargetFormat::Png => {
                // zlib levels, collapsed onto the three presets the encoder exposes
                let compression = match options.get("compressionLevel") {
                    Some(value) => match integer_in(value, "compressionLevel", 0, 9)? {
                        0..=3 => CompressionType::Fast,
                        4..=6 => CompressionType::Default,
                        _ => CompressionType::Best,
                    },
                    None => CompressionType::Default,
                };
                let filter = match options.get("adaptiveFiltering") {
                    Some(Value::Bool(true)) => FilterType::Adaptive,
                    Some(Value::Bool(false)) | None => FilterType::Sub,
                    Some(_) => {
                        return Err(TranscodeError::InvalidOption {
                            key: "adaptiveFiltering".to_string(),
                            reason: "expected a boolean".to_string(),
                        }
                        .into())
                    }
                };
                Ok(Self::Png {
                    compression,
                    filter,
                })
            }
        }
    }
}

// Whole floats such as `80.0` count as integers
fn integer_in(value: &Value, key: &str, min: u64, max: u64) -> Result<u64> {
    let integral = value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
            .map(|f| f as u64)
    });
    match integral {
        Some(n) if (min..=max).contains(&n) => Ok(n),
        _ => Err(TranscodeError::InvalidOption {
            key: key.to_string(),
            reason: format!("expected an integer between {} and {}, got {}", min, max, value),
        }
        .into()),
    }
}

pub struct ImageTranscoder;

impl ImageTranscoder {
    pub fn new() -> Self {
        Self
    }

    fn encode_sync(image_data: Vec<u8>, settings: EncoderSettings) -> Result<Vec<u8>> {
        let image = image::load_from_memory(&image_data).map_err(TranscodeError::Decode)?;
        let mut out = Vec::new();

        match settings {
            EncoderSettings::Jpeg { quality } => {
                // JPEG carries no alpha channel
                let image = match image.color() {
                    ColorType::L8 | ColorType::Rgb8 => image,
                    _ => DynamicImage::ImageRgb8(image.to_rgb8()),
                };
                let encoder = JpegEncoder::new_with_quality(&mut out, quality);
                image
                    .write_with_encoder(encoder)
                    .map_err(TranscodeError::Encode)?;
            }
            EncoderSettings::Png {
                compression,
                filter,
            } => {
                let image = match image.color() {
                    ColorType::Rgb32F | ColorType::Rgba32F => {
                        DynamicImage::ImageRgba8(image.to_rgba8())
                    }
                    _ => image,
                };
                let encoder = PngEncoder::new_with_quality(&mut out, compression, filter);
                image
                    .write_with_encoder(encoder)
                    .map_err(TranscodeError::Encode)?;
            }
        }

        Ok(out)
    }
}

impl Default for ImageTranscoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageService for ImageTranscoder {
    async fn transcode(
        &self,
        image_data: &[u8],
        format_hint: Option<&str>,
        options: &EncodingOptions,
    ) -> Result<Vec<u8>> {
        let format = TargetFormat::from_hint(format_hint)
            .ok_or_else(|| TranscodeError::UnsupportedFormat(format_hint.map(str::to_string)))?;
        let settings = EncoderSettings::resolve(format, options)?;

        let image_data = image_data.to_vec();
        let encoded = tokio::task::spawn_blocking(move || Self::encode_sync(image_data, settings))
            .await
            .map_err(|e| TranscodeError::Worker(format!("join error: {}", e)))??;

        tracing::debug!(
            "Transcoded to {:?} ({} bytes, settings {:?})",
            format,
            encoded.len(),
            settings
        );
        Ok(encoded)
    }
}
