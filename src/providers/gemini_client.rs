use crate::{
    error::{GenImgError, Result},
    models::{
        gemini::{
            Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
            ListModelsResponse, Part, PredictInstance, PredictParameters, PredictRequest,
            PredictResponse,
        },
        Capability, GenerationRequest, ImagePayload, ImageSize, ModelInfo, RemoteModel,
    },
    providers::{check_status, ImageProvider},
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

/// Google Generative Language API client. Gemini image models go through
/// `generateContent`, Imagen models through `predict`.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into(),
        }
    }

    pub fn supported_models() -> Vec<ModelInfo> {
        [
            ("gemini-2.0-flash-exp-image-generation", Capability::MultimodalContent),
            ("gemini-2.0-flash-preview-image-generation", Capability::MultimodalContent),
            ("gemini-2.5-flash-image-preview", Capability::MultimodalContent),
            ("gemini-2.5-flash-image", Capability::MultimodalContent),
            ("imagen-3.0-generate-002", Capability::DedicatedImage),
            ("imagen-3.0-generate-001", Capability::DedicatedImage),
            ("imagen-3.0-fast-generate-001", Capability::DedicatedImage),
            ("imagen-4.0-generate-001", Capability::DedicatedImage),
        ]
        .into_iter()
        .map(|(id, capability)| ModelInfo {
            id: id.to_string(),
            capability,
        })
        .collect()
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{}", trimmed)
        };
        format!("{}/{}:{}", self.base_url, model_path, method)
    }

    pub fn build_content_request(request: &GenerationRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(request.prompt.clone()),
                    inline_data: None,
                }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT".to_string(), "IMAGE".to_string()],
            },
        }
    }

    pub fn build_predict_request(request: &GenerationRequest) -> Result<PredictRequest> {
        let aspect_ratio = match request.size {
            ImageSize::AspectRatio { .. } => request.size.to_string(),
            ImageSize::Dimensions { .. } => {
                return Err(GenImgError::ValidationError(format!(
                    "Imagen expects an aspect ratio, got \"{}\"",
                    request.size
                )))
            }
        };

        Ok(PredictRequest {
            instances: vec![PredictInstance {
                prompt: request.prompt.clone(),
            }],
            parameters: PredictParameters {
                sample_count: request.count,
                aspect_ratio,
            },
        })
    }

    /// Inline image parts of the first candidate, in order. Text parts are
    /// skipped but kept for the error message when no image came back.
    pub fn extract_content_images(response: GenerateContentResponse) -> Result<Vec<ImagePayload>> {
        let parts = response
            .candidates
            .into_iter()
            .next()
            .map(|candidate| candidate.content.parts)
            .unwrap_or_default();

        let mut images = Vec::new();
        let mut texts = Vec::new();
        for part in parts {
            if let Some(inline) = part.inline_data {
                let bytes = BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                    GenImgError::ProviderError(format!("Gemini image base64 decode failed: {}", e))
                })?;
                images.push(ImagePayload::Bytes(bytes));
            } else if let Some(text) = part.text {
                log::debug!("Text from Gemini: {}", text);
                texts.push(text);
            }
        }

        if images.is_empty() {
            let detail = if texts.is_empty() {
                String::new()
            } else {
                format!(" (model said: {})", texts.join(" ").trim())
            };
            return Err(GenImgError::ProviderError(format!(
                "No images generated{}",
                detail
            )));
        }
        Ok(images)
    }

    pub fn extract_predictions(response: PredictResponse) -> Result<Vec<ImagePayload>> {
        let images: Vec<ImagePayload> = response
            .predictions
            .into_iter()
            .filter_map(|prediction| prediction.bytes_base64_encoded)
            .filter(|data| !data.is_empty())
            .map(ImagePayload::Base64)
            .collect();

        if images.is_empty() {
            return Err(GenImgError::ProviderError("No images generated".into()));
        }
        Ok(images)
    }

    async fn post<B: serde::Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<reqwest::Response> {
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| GenImgError::TransportError(format!("Gemini request failed: {}", e)))?;
        check_status("Gemini", response).await
    }
}

#[async_trait]
impl ImageProvider for GeminiClient {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImagePayload>> {
        match request.capability {
            Capability::MultimodalContent => {
                log::info!("Generating image with model: {} (generateContent)", request.model);
                if request.count > 1 {
                    log::warn!(
                        "{} answers with the images it chooses; --number {} is not sent",
                        request.model,
                        request.count
                    );
                }
                let payload = Self::build_content_request(request);
                let response: GenerateContentResponse = self
                    .post(&self.endpoint(&request.model, "generateContent"), &payload)
                    .await?
                    .json()
                    .await?;
                Self::extract_content_images(response)
            }
            Capability::DedicatedImage => {
                log::info!("Generating image with model: {} (predict)", request.model);
                let payload = Self::build_predict_request(request)?;
                let response: PredictResponse = self
                    .post(&self.endpoint(&request.model, "predict"), &payload)
                    .await?
                    .json()
                    .await?;
                Self::extract_predictions(response)
            }
        }
    }

    async fn list_models(&self) -> Result<Vec<RemoteModel>> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .query(&[("key", self.api_key.as_str()), ("pageSize", "1000")])
            .send()
            .await
            .map_err(|e| GenImgError::TransportError(format!("Gemini request failed: {}", e)))?;
        let listing: ListModelsResponse = check_status("Gemini", response).await?.json().await?;

        Ok(listing
            .models
            .into_iter()
            .map(|model| RemoteModel {
                name: model.name,
                methods: model.supported_generation_methods,
            })
            .collect())
    }
}
