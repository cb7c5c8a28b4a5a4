use serde::{Deserialize, Serialize};
use tracing::warn;

use super::TextNodes;

/// Encoding tried when an upload is not valid UTF-8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackEncoding {
    /// ISO-8859-1: every byte maps to the code point of the same value.
    #[default]
    Latin1,
    /// Reject anything that is not UTF-8.
    #[serde(rename = "none")]
    Disabled,
}

/// Decodes uploaded bytes as UTF-8, then as the fallback encoding.
///
/// Returns `None` when neither applies; callers treat that as empty text.
pub fn decode_text(bytes: &[u8], fallback: FallbackEncoding) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(e) => match fallback {
            FallbackEncoding::Latin1 => {
                warn!("Upload is not UTF-8 ({}), decoding as Latin-1", e);
                Some(bytes.iter().map(|&b| char::from(b)).collect())
            }
            FallbackEncoding::Disabled => {
                warn!("Upload is not UTF-8 ({}) and no fallback encoding is configured", e);
                None
            }
        },
    }
}

/// Flat-shape document: the whole text is one node and the output is always
/// UTF-8 plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatText {
    text: String,
}

impl FlatText {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// Decodes an upload with the configured fallback; undecodable bytes
    /// give an empty document.
    pub fn decode(bytes: &[u8], fallback: FallbackEncoding) -> Self {
        Self::new(decode_text(bytes, fallback).unwrap_or_default())
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }
}

impl TextNodes for FlatText {
    fn node_count(&self) -> usize {
        1
    }

    fn node_text(&self, _index: usize) -> String {
        self.text.clone()
    }

    fn set_node_text(&mut self, _index: usize, text: &str) {
        self.text = text.to_string();
    }
}
