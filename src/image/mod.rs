//! Image recompression
//!
//! Re-encodes downloaded images into the format named by the file's
//! extension, using the caller's encoding options, to reduce their size
//! before they are uploaded as a new version.

pub mod mock;
pub mod processor;

pub use mock::MockTranscoder;
pub use processor::ImageTranscoder;

use crate::models::EncodingOptions;
use crate::Result;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Jpeg,
    Png,
}

impl TargetFormat {
    /// Case-sensitive: `JPG` is not recognised.
    pub fn from_hint(hint: Option<&str>) -> Option<Self> {
        match hint? {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }
}

#[async_trait]
pub trait ImageService: Send + Sync {
    async fn transcode(
        &self,
        image_data: &[u8],
        format_hint: Option<&str>,
        options: &EncodingOptions,
    ) -> Result<Vec<u8>>;
}
