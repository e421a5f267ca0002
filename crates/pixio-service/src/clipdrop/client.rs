//! ClipDrop API client implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;

use pixio_core::ProviderError;

use super::{ImageOutput, ImageProvider, ImageRequest, ImageUpload};

/// ClipDrop API client.
#[derive(Debug, Clone)]
pub struct ClipdropClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ClipdropClient {
    /// Create a new ClipDrop client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    fn file_part(upload: ImageUpload) -> Result<Part, ProviderError> {
        Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| ProviderError::transport(format!("invalid upload type: {e}")))
    }

    fn build_form(request: ImageRequest) -> Result<Form, ProviderError> {
        let form = Form::new();
        let form = match request {
            ImageRequest::Generate { prompt } => form.text("prompt", prompt),
            ImageRequest::Upscale {
                image,
                target_width,
                target_height,
            } => form
                .part("image_file", Self::file_part(image)?)
                .text("target_width", target_width.to_string())
                .text("target_height", target_height.to_string()),
            ImageRequest::RemoveBackground { image }
            | ImageRequest::RemoveText { image }
            | ImageRequest::Uncrop { image } => form.part("image_file", Self::file_part(image)?),
            ImageRequest::ReplaceBackground { image, prompt } => form
                .part("image_file", Self::file_part(image)?)
                .text("prompt", prompt),
            ImageRequest::Cleanup { image, mask } => form
                .part("image_file", Self::file_part(image)?)
                .part("mask_file", Self::file_part(mask)?)
                .text("mode", "quality"),
        };
        Ok(form)
    }
}

#[async_trait]
impl ImageProvider for ClipdropClient {
    async fn process(&self, request: ImageRequest) -> Result<ImageOutput, ProviderError> {
        let url = format!("{}/{}", self.base_url, request.endpoint());
        let tool = request.tool();
        let form = Self::build_form(request)?;

        tracing::debug!(tool = %tool, url = %url, "Calling ClipDrop");

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::timeout()
                } else {
                    ProviderError::transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(ProviderError::with_status(status.as_u16(), message));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::transport(e.to_string()))?;

        Ok(ImageOutput {
            content_type,
            bytes: bytes.to_vec(),
        })
    }
}
