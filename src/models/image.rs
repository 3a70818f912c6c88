use serde::{Deserialize, Serialize};

use super::Capability;

/// One image as handed back by a provider.
#[derive(Debug, Clone, PartialEq)]
pub enum ImagePayload {
    Bytes(Vec<u8>),
    Base64(String),
}

/// The record smuggled inside a pseudo-URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub b64_json: String,
    pub index: usize,
}

/// Catalog entry: which request shape a known model id speaks.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub capability: Capability,
}

/// A model as reported by a provider's listing endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteModel {
    pub name: String,
    pub methods: Vec<String>,
}
