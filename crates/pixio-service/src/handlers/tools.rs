//! Metered image tool handlers.
//!
//! `generate` takes a JSON prompt; every other tool takes a multipart upload
//! with the source image in an `image` (or `image_file`) part.

use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use pixio_core::{Tool, DEFAULT_TOOL_COST};

use crate::auth::AuthUser;
use crate::clipdrop::{ImageProvider, ImageRequest, ImageUpload, DEFAULT_UPSCALE_EDGE};
use crate::error::ApiError;
use crate::state::AppState;

/// Text-to-image request.
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    /// Prompt text.
    #[serde(default)]
    pub prompt: String,
}

/// Result of a charged tool call.
#[derive(Debug, Serialize)]
pub struct ToolResponse {
    /// The result as a `data:` URL.
    pub result_image: String,
    /// Balance after the charge.
    pub credit_balance: i64,
}

/// Fields collected from a multipart upload.
#[derive(Debug, Default)]
struct ToolForm {
    image: Option<ImageUpload>,
    mask: Option<ImageUpload>,
    prompt: Option<String>,
    target_width: Option<u32>,
    target_height: Option<u32>,
}

fn bad_request(code: &'static str, message: &str) -> ApiError {
    ApiError::BadRequest {
        code,
        message: message.into(),
    }
}

impl ToolForm {
    async fn read(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| bad_request("invalid_upload", &e.to_string()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "image" | "image_file" | "mask" | "mask_file" => {
                    let upload = ImageUpload {
                        file_name: field.file_name().unwrap_or("upload").to_string(),
                        content_type: field
                            .content_type()
                            .unwrap_or("application/octet-stream")
                            .to_string(),
                        bytes: field
                            .bytes()
                            .await
                            .map_err(|e| bad_request("invalid_upload", &e.to_string()))?
                            .to_vec(),
                    };
                    if name.starts_with("mask") {
                        form.mask = Some(upload);
                    } else {
                        form.image = Some(upload);
                    }
                }
                "prompt" | "target_width" | "target_height" => {
                    let text = field
                        .text()
                        .await
                        .map_err(|e| bad_request("invalid_upload", &e.to_string()))?;
                    let text = text.trim();
                    match name.as_str() {
                        "prompt" => form.prompt = Some(text.to_string()).filter(|p| !p.is_empty()),
                        "target_width" => form.target_width = parse_edge(text)?,
                        _ => form.target_height = parse_edge(text)?,
                    }
                }
                other => tracing::debug!(field = %other, "Ignoring unknown upload field"),
            }
        }

        Ok(form)
    }

    /// Build the provider request for `tool`.
    fn into_request(self, tool: Tool) -> Result<ImageRequest, ApiError> {
        let image = self
            .image
            .ok_or_else(|| bad_request("missing_image", "No image provided"))?;

        Ok(match tool {
            Tool::Enhance => ImageRequest::Upscale {
                image,
                target_width: self.target_width.unwrap_or(DEFAULT_UPSCALE_EDGE),
                target_height: self.target_height.unwrap_or(DEFAULT_UPSCALE_EDGE),
            },
            Tool::RemoveBackground => ImageRequest::RemoveBackground { image },
            Tool::RemoveText => ImageRequest::RemoveText { image },
            Tool::Uncrop => ImageRequest::Uncrop { image },
            Tool::ReplaceBackground => ImageRequest::ReplaceBackground {
                image,
                prompt: self
                    .prompt
                    .ok_or_else(|| bad_request("missing_details", "Prompt is required"))?,
            },
            Tool::Cleanup => ImageRequest::Cleanup {
                image,
                mask: self
                    .mask
                    .ok_or_else(|| bad_request("missing_mask", "Both image and mask are required"))?,
            },
            Tool::Generate => {
                return Err(bad_request("unsupported_tool", "generate takes a JSON prompt"))
            }
        })
    }
}

fn parse_edge(text: &str) -> Result<Option<u32>, ApiError> {
    if text.is_empty() {
        return Ok(None);
    }
    text.parse::<u32>()
        .ok()
        .filter(|edge| *edge > 0)
        .map(Some)
        .ok_or_else(|| bad_request("bad_request", "Target dimensions must be positive integers"))
}

fn provider(state: &AppState) -> Result<Arc<dyn ImageProvider>, ApiError> {
    state
        .images
        .clone()
        .ok_or_else(|| ApiError::ExternalService {
            code: "image_provider_error",
            message: "ClipDrop not configured".into(),
            upstream_status: None,
        })
}

/// Charge for and run one provider request.
async fn run(
    state: &AppState,
    auth: AuthUser,
    request: ImageRequest,
) -> Result<Json<ToolResponse>, ApiError> {
    let provider = provider(state)?;
    let tool = request.tool();
    let prompt = request.prompt();

    let metered = state
        .metering
        .invoke(
            &auth.account_id,
            tool,
            DEFAULT_TOOL_COST,
            prompt,
            provider.process(request),
        )
        .await?;

    Ok(Json(ToolResponse {
        result_image: metered.output.to_data_url(),
        credit_balance: metered.balance,
    }))
}

async fn run_upload(
    state: &AppState,
    auth: AuthUser,
    tool: Tool,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    let request = ToolForm::read(multipart).await?.into_request(tool)?;
    run(state, auth, request).await
}

/// Generate an image from a prompt.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<GenerateRequest>,
) -> Result<Json<ToolResponse>, ApiError> {
    let prompt = body.prompt.trim().to_string();
    if prompt.is_empty() {
        return Err(bad_request("missing_details", "Missing Details"));
    }
    run(&state, auth, ImageRequest::Generate { prompt }).await
}

/// Upscale an image.
pub async fn enhance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::Enhance, multipart).await
}

/// Remove the background of an image.
pub async fn remove_background(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::RemoveBackground, multipart).await
}

/// Remove text from an image.
pub async fn remove_text(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::RemoveText, multipart).await
}

/// Extend the canvas of an image.
pub async fn uncrop(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::Uncrop, multipart).await
}

/// Replace the background of an image from a prompt.
pub async fn replace_background(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::ReplaceBackground, multipart).await
}

/// Erase the masked region of an image.
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    multipart: Multipart,
) -> Result<Json<ToolResponse>, ApiError> {
    run_upload(&state, auth, Tool::Cleanup, multipart).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upload(name: &str) -> ImageUpload {
        ImageUpload {
            file_name: name.into(),
            content_type: "image/png".into(),
            bytes: vec![0, 1],
        }
    }

    #[test]
    fn upscale_defaults_to_standard_edge() {
        let form = ToolForm {
            image: Some(upload("in.png")),
            ..ToolForm::default()
        };
        match form.into_request(Tool::Enhance).unwrap() {
            ImageRequest::Upscale {
                target_width,
                target_height,
                ..
            } => {
                assert_eq!(target_width, DEFAULT_UPSCALE_EDGE);
                assert_eq!(target_height, DEFAULT_UPSCALE_EDGE);
            }
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn cleanup_requires_mask() {
        let form = ToolForm {
            image: Some(upload("in.png")),
            ..ToolForm::default()
        };
        assert!(form.into_request(Tool::Cleanup).is_err());
    }

    #[test]
    fn replace_background_requires_prompt() {
        let form = ToolForm {
            image: Some(upload("in.png")),
            ..ToolForm::default()
        };
        assert!(form.into_request(Tool::ReplaceBackground).is_err());
    }

    #[test]
    fn missing_image_is_rejected() {
        assert!(ToolForm::default().into_request(Tool::Uncrop).is_err());
    }

    #[test]
    fn edges_must_be_positive() {
        assert_eq!(parse_edge("1024").unwrap(), Some(1024));
        assert_eq!(parse_edge("").unwrap(), None);
        assert!(parse_edge("0").is_err());
        assert!(parse_edge("wide").is_err());
    }
}
