pub mod gemini_client;
pub mod openai_client;

use crate::{
    config::{ApiConfig, Backend},
    error::{GenImgError, Result},
    models::{Capability, GenerationRequest, ImagePayload, RemoteModel},
};
use async_trait::async_trait;

pub use gemini_client::GeminiClient;
pub use openai_client::OpenAiClient;

/// A remote image-generation service.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Issue exactly one generation call.
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<ImagePayload>>;

    async fn list_models(&self) -> Result<Vec<RemoteModel>>;
}

pub fn build_provider(backend: Backend, config: &ApiConfig) -> Result<Box<dyn ImageProvider>> {
    let api_key = config.api_key.clone().ok_or_else(|| {
        GenImgError::ValidationError(format!(
            "The --api-key argument is required if {} environment variable is not set.",
            backend.api_key_env()
        ))
    })?;
    let base_url = config.base_url_or_default(backend);

    Ok(match backend {
        Backend::Gemini => Box::new(GeminiClient::new(api_key, base_url)),
        Backend::OpenAi => Box::new(OpenAiClient::new(api_key, base_url)),
    })
}

/// Decide which request shape `model` gets. An explicit mode always wins;
/// otherwise the model must be in the backend's catalog.
pub fn resolve_capability(
    backend: Backend,
    model: &str,
    explicit: Option<Capability>,
) -> Result<Capability> {
    match backend {
        Backend::OpenAi => match explicit {
            Some(Capability::MultimodalContent) => Err(GenImgError::ValidationError(
                "The --api-mode argument only supports \"predict\" on this backend.".into(),
            )),
            _ => Ok(Capability::DedicatedImage),
        },
        Backend::Gemini => {
            if let Some(capability) = explicit {
                return Ok(capability);
            }
            let id = model.trim().trim_start_matches("models/");
            GeminiClient::supported_models()
                .into_iter()
                .find(|info| info.id == id)
                .map(|info| info.capability)
                .ok_or_else(|| {
                    GenImgError::ValidationError(format!(
                        "Unknown model \"{}\"; pass --api-mode content or --api-mode predict.",
                        model
                    ))
                })
        }
    }
}

/// Reject size tokens the addressed endpoint cannot take.
pub fn check_size(backend: Backend, request: &GenerationRequest) -> Result<()> {
    let ok = match (backend, request.capability) {
        (Backend::Gemini, Capability::MultimodalContent) => true,
        (Backend::Gemini, Capability::DedicatedImage) => request.size.is_aspect_ratio(),
        (Backend::OpenAi, _) => !request.size.is_aspect_ratio(),
    };
    if ok {
        return Ok(());
    }
    let expected = if request.size.is_aspect_ratio() {
        "pixel dimensions like \"1024x1024\""
    } else {
        "an aspect ratio like \"16:9\""
    };
    Err(GenImgError::ValidationError(format!(
        "The --size argument for model \"{}\" must be {}, got \"{}\".",
        request.model, expected, request.size
    )))
}

/// Turn a non-2xx response into a provider error carrying the remote message.
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    log::debug!("{} error body: {}", provider, body);
    Err(GenImgError::ProviderError(format!(
        "{} returned {}: {}",
        provider,
        status,
        error_message(&body)
    )))
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            value
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(serde_json::Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
