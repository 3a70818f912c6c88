use crate::{
    error::{GenImgError, Result},
    models::{
        openai::{ImagesRequest, ImagesResponse, ModelList},
        GenerationRequest, ImagePayload, ImageSize, RemoteModel,
    },
    providers::{check_status, ImageProvider},
};
use async_trait::async_trait;

/// Client for any endpoint speaking the OpenAI images API.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn build_request(request: &GenerationRequest) -> Result<ImagesRequest> {
        if let ImageSize::AspectRatio { .. } = request.size {
            return Err(GenImgError::ValidationError(format!(
                "OpenAI-compatible endpoints expect pixel dimensions, got \"{}\"",
                request.size
            )));
        }

        Ok(ImagesRequest {
            model: request.model.clone(),
            prompt: request.prompt.clone(),
            n: request.count,
            size: request.size.to_string(),
            quality: request.quality.as_str().to_string(),
            response_format: "b64_json".to_string(),
        })
    }

    /// OpenAI lists ids only; it has no per-model generation methods.
    pub fn models_from_listing(listing: ModelList) -> Vec<RemoteModel> {
        listing
            .data
            .into_iter()
            .map(|model| RemoteModel {
                name: model.id,
                methods: Vec::new(),
            })
            .collect()
    }

    pub fn extract_images(response: ImagesResponse) -> Result<Vec<ImagePayload>> {
        let mut images = Vec::with_capacity(response.data.len());
        for datum in response.data {
            if let Some(revised) = datum.revised_prompt.as_deref() {
                log::debug!("Revised prompt: {}", revised);
            }
            match datum.b64_json {
                Some(data) if !data.is_empty() => images.push(ImagePayload::Base64(data)),
                _ => {
                    return Err(GenImgError::ProviderError(
                        "response item carries no b64_json payload".into(),
                    ))
                }
            }
        }

        if images.is_empty() {
            return Err(GenImgError::ProviderError("No images generated".into()));
        }
        Ok(images)
    }
}

#[async_trait]
impl ImageProvider for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
        let payload = Self::build_request(request)?;
        log::info!(
            "Generating {} image(s) with model: {} ({}, {})",
            payload.n,
            payload.model,
            payload.size,
            payload.quality
        );

        let response = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenImgError::TransportError(format!("OpenAI request failed: {}", e)))?;
        let response: ImagesResponse = check_status("OpenAI", response).await?.json().await?;

        Self::extract_images(response)
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| GenImgError::TransportError(format!("OpenAI request failed: {}", e)))?;
        let listing: ModelList = check_status("OpenAI", response).await?.json().await?;

        Ok(Self::models_from_listing(listing))
    }
}
