//! Evidence payloads and their on-disk encodings.

use assure_core::CanonicalBytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{VaultError, VaultResult};

/// Evidence payload as handed to the vault.
#[derive(Debug, Clone, PartialEq)]
pub enum EvidenceContent {
    /// JSON document; stored as sorted-key compact JSON.
    Structured(Value),
    /// UTF-8 text; stored verbatim.
    Text(String),
    /// Opaque bytes; stored verbatim.
    Binary(Vec<u8>),
}

/// On-disk format, which also fixes the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// `.json`
    Json,
    /// `.txt`
    Text,
    /// `.bin`
    Binary,
}

impl ContentFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "txt",
            Self::Binary => "bin",
        }
    }
}

impl EvidenceContent {
    /// The format this content is stored in.
    pub fn format(&self) -> ContentFormat {
        match self {
            Self::Structured(_) => ContentFormat::Json,
            Self::Text(_) => ContentFormat::Text,
            Self::Binary(_) => ContentFormat::Binary,
        }
    }

    /// Bytes written to disk and hashed.
    pub fn encode(&self) -> VaultResult<Vec<u8>> {
        match self {
            Self::Structured(value) => Ok(CanonicalBytes::new(value)?.into_bytes()),
            Self::Text(text) => Ok(text.as_bytes().to_vec()),
            Self::Binary(bytes) => Ok(bytes.clone()),
        }
    }

    /// Rebuild content from stored bytes.
    pub fn decode(format: ContentFormat, bytes: Vec<u8>) -> VaultResult<Self> {
        match format {
            ContentFormat::Json => serde_json::from_slice(&bytes)
                .map(Self::Structured)
                .map_err(|e| VaultError::Validation(format!("stored JSON evidence is unreadable: {e}"))),
            ContentFormat::Text => String::from_utf8(bytes)
                .map(Self::Text)
                .map_err(|e| VaultError::Validation(format!("stored text evidence is not UTF-8: {e}"))),
            ContentFormat::Binary => Ok(Self::Binary(bytes)),
        }
    }
}

impl From<Value> for EvidenceContent {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for EvidenceContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for EvidenceContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<u8>> for EvidenceContent {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Binary(bytes)
    }
}
