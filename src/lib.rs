pub mod cli;
pub mod config;
pub mod encoder;
pub mod error;
pub mod logger;
pub mod models;
pub mod providers;

pub use config::{ApiConfig, Backend, Defaults};
pub use encoder::{decode_pseudo_url, encode_all, OutputFormat, PSEUDO_URL_PREFIX};
pub use error::{GenImgError, Result};
pub use models::*;
pub use providers::{GeminiClient, ImageProvider, OpenAiClient};
