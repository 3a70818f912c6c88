use crate::models::Quality;
use std::env;

pub const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// The two remote services a binary can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Gemini,
    OpenAi,
}

impl Backend {
    pub fn bin_name(&self) -> &'static str {
        match self {
            Backend::Gemini => "genimg-gemini",
            Backend::OpenAi => "genimg-openai",
        }
    }

    pub fn about(&self) -> &'static str {
        match self {
            Backend::Gemini => "CLI for image generation prompt using Google's Imagen/Gemini models.",
            Backend::OpenAi => {
                "CLI for image generation prompt using an OpenAI-compatible images endpoint."
            }
        }
    }

    pub fn api_key_env(&self) -> &'static str {
        match self {
            Backend::Gemini => "GEMINI_API_KEY",
            Backend::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn base_url_env(&self) -> &'static str {
        match self {
            Backend::Gemini => "GEMINI_API_BASE",
            Backend::OpenAi => "OPENAI_BASE_URL",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Backend::Gemini => GEMINI_DEFAULT_BASE_URL,
            Backend::OpenAi => OPENAI_DEFAULT_BASE_URL,
        }
    }

    pub fn defaults(&self) -> Defaults {
        match self {
            Backend::Gemini => Defaults {
                model: "gemini-2.0-flash-exp-image-generation".to_string(),
                size: "1:1".to_string(),
                quality: Quality::Standard,
                number: 1,
            },
            Backend::OpenAi => Defaults {
                model: "dall-e-3".to_string(),
                size: "1024x1024".to_string(),
                quality: Quality::Standard,
                number: 1,
            },
        }
    }
}

/// Values applied when a flag is absent. Never applied to a flag that was
/// given with an empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct Defaults {
    pub model: String,
    pub size: String,
    pub quality: Quality,
    pub number: u32,
}

/// Connection settings for a backend, resolved from the environment and
/// overridden by command-line flags.
#[derive(Debug, Clone, Default)]
pub struct ApiConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

impl ApiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env(backend: Backend) -> Self {
        ApiConfig {
            api_key: non_empty_env(backend.api_key_env()),
            base_url: non_empty_env(backend.base_url_env()),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn base_url_or_default(&self, backend: Backend) -> String {
        self.base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .unwrap_or(backend.default_base_url())
            .to_string()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
