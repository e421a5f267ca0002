//! ClipDrop integration for image tools.

pub mod client;

pub use client::ClipdropClient;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use pixio_core::{ProviderError, Tool};

/// Default upscale target edge, in pixels.
pub const DEFAULT_UPSCALE_EDGE: u32 = 2048;

/// An uploaded image file.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    /// Original file name.
    pub file_name: String,
    /// MIME type reported by the client.
    pub content_type: String,
    /// File contents.
    pub bytes: Vec<u8>,
}

/// A tool request forwarded to the image provider.
#[derive(Debug, Clone)]
pub enum ImageRequest {
    /// Text-to-image.
    Generate {
        /// Prompt text.
        prompt: String,
    },
    /// Upscale to the target dimensions.
    Upscale {
        /// Source image.
        image: ImageUpload,
        /// Target width.
        target_width: u32,
        /// Target height.
        target_height: u32,
    },
    /// Remove the background.
    RemoveBackground {
        /// Source image.
        image: ImageUpload,
    },
    /// Remove text.
    RemoveText {
        /// Source image.
        image: ImageUpload,
    },
    /// Extend the canvas.
    Uncrop {
        /// Source image.
        image: ImageUpload,
    },
    /// Replace the background from a prompt.
    ReplaceBackground {
        /// Source image.
        image: ImageUpload,
        /// Prompt describing the new background.
        prompt: String,
    },
    /// Erase the masked region.
    Cleanup {
        /// Source image.
        image: ImageUpload,
        /// Mask; white marks the region to erase.
        mask: ImageUpload,
    },
}

impl ImageRequest {
    /// The metered tool this request invokes.
    #[must_use]
    pub fn tool(&self) -> Tool {
        match self {
            Self::Generate { .. } => Tool::Generate,
            Self::Upscale { .. } => Tool::Enhance,
            Self::RemoveBackground { .. } => Tool::RemoveBackground,
            Self::RemoveText { .. } => Tool::RemoveText,
            Self::Uncrop { .. } => Tool::Uncrop,
            Self::ReplaceBackground { .. } => Tool::ReplaceBackground,
            Self::Cleanup { .. } => Tool::Cleanup,
        }
    }

    /// Prompt text recorded with the usage, if any.
    #[must_use]
    pub fn prompt(&self) -> Option<String> {
        match self {
            Self::Generate { prompt } | Self::ReplaceBackground { prompt, .. } => {
                Some(prompt.clone())
            }
            _ => None,
        }
    }

    /// Endpoint path, relative to the provider base URL.
    #[must_use]
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Generate { .. } => "text-to-image/v1",
            Self::Upscale { .. } => "image-upscaling/v1/upscale",
            Self::RemoveBackground { .. } => "remove-background/v1",
            Self::RemoveText { .. } => "remove-text/v1",
            Self::Uncrop { .. } => "uncrop/v1",
            Self::ReplaceBackground { .. } => "replace-background/v1",
            Self::Cleanup { .. } => "cleanup/v1",
        }
    }
}

/// A processed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageOutput {
    /// MIME type of the result.
    pub content_type: String,
    /// Result bytes.
    pub bytes: Vec<u8>,
}

impl ImageOutput {
    /// Encode as a `data:` URL.
    #[must_use]
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, BASE64.encode(&self.bytes))
    }
}

/// External image processing.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Run one request.
    async fn process(&self, request: ImageRequest) -> Result<ImageOutput, ProviderError>;
}
