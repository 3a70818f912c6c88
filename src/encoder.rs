//! Pseudo-URL encoding of generated images.
//!
//! Each image becomes `data:image/b64json;<base64 of {"b64_json":..,"index":..}>`
//! so that callers which only accept URL-typed strings can still receive the
//! full image payload.

use crate::{
    error::{GenImgError, Result},
    models::{GeneratedImage, ImagePayload},
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

pub const PSEUDO_URL_PREFIX: &str = "data:image/b64json;";

/// Output layout for the printed pseudo-URL sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// `['data:...', 'data:...']`
    #[default]
    List,
    /// One pseudo-URL per line.
    Lines,
}

/// Normalize provider payloads into indexed records. Indices follow position.
pub fn to_records(payloads: Vec<ImagePayload>) -> Result<Vec<GeneratedImage>> {
    payloads
        .into_iter()
        .enumerate()
        .map(|(index, payload)| -> Result<GeneratedImage> {
            let b64_json = match payload {
                ImagePayload::Bytes(bytes) => BASE64.encode(bytes),
                ImagePayload::Base64(data) => {
                    let data: String = data.split_whitespace().collect();
                    BASE64.decode(data.as_bytes()).map_err(|e| {
                        GenImgError::ProviderError(format!(
                            "image {} is not valid base64: {}",
                            index, e
                        ))
                    })?;
                    data
                }
            };
            Ok(GeneratedImage { b64_json, index })
        })
        .collect()
}

pub fn encode_record(record: &GeneratedImage) -> Result<String> {
    let json = serde_json::to_string(record)?;
    Ok(format!("{}{}", PSEUDO_URL_PREFIX, BASE64.encode(json)))
}

pub fn encode_all(payloads: Vec<ImagePayload>) -> Result<Vec<String>> {
    to_records(payloads)?.iter().map(encode_record).collect()
}

pub fn decode_pseudo_url(url: &str) -> Result<GeneratedImage> {
    let encoded = url.strip_prefix(PSEUDO_URL_PREFIX).ok_or_else(|| {
        GenImgError::SerializationError(format!(
            "pseudo-URL does not start with {}",
            PSEUDO_URL_PREFIX
        ))
    })?;
    let json = BASE64
        .decode(encoded)
        .map_err(|e| GenImgError::SerializationError(e.to_string()))?;
    Ok(serde_json::from_slice(&json)?)
}

pub fn render(urls: &[String], format: OutputFormat) -> String {
    match format {
        OutputFormat::List => {
            let quoted: Vec<String> = urls.iter().map(|url| format!("'{}'", url)).collect();
            format!("[{}]", quoted.join(", "))
        }
        OutputFormat::Lines => urls.join("\n"),
    }
}
