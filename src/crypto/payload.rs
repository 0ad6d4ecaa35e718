//! The textual (IV, ciphertext) pair produced by [`super::CryptoService::encrypt`].

use crate::constants::{IV_LEN, TAG_LEN};
use crate::errors::CryptoError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

/// An AES-GCM ciphertext together with the IV it was sealed under.
///
/// Both fields are standard base64. `data` carries the authentication tag
/// appended to the ciphertext, as AES-GCM produces it.
///
/// # Example
///
/// ```
/// use nis2_shield::crypto::EncryptedPayload;
///
/// let json = r#"{"iv":"AAAAAAAAAAAAAAAA","data":"AAAAAAAAAAAAAAAAAAAAAA=="}"#;
/// let payload = EncryptedPayload::from_json(json)?;
/// assert_eq!(payload.iv, "AAAAAAAAAAAAAAAA");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Base64 of the 96-bit IV.
    pub iv: String,
    /// Base64 of ciphertext followed by the GCM tag.
    pub data: String,
}

impl EncryptedPayload {
    /// Encodes raw IV and ciphertext bytes.
    pub(crate) fn from_parts(iv: &[u8], ciphertext: &[u8]) -> Self {
        Self {
            iv: STANDARD.encode(iv),
            data: STANDARD.encode(ciphertext),
        }
    }

    /// Decodes both fields back into bytes, checking their lengths.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidPayload` if either field is not valid base64,
    /// the IV is not exactly 12 bytes, or the ciphertext is shorter than a tag.
    pub fn decode(&self) -> Result<([u8; IV_LEN], Vec<u8>), CryptoError> {
        let iv_bytes = STANDARD
            .decode(&self.iv)
            .map_err(|e| CryptoError::InvalidPayload(format!("iv is not base64: {}", e)))?;
        let iv: [u8; IV_LEN] = iv_bytes.try_into().map_err(|bytes: Vec<u8>| {
            CryptoError::InvalidPayload(format!(
                "iv must be {} bytes, got {}",
                IV_LEN,
                bytes.len()
            ))
        })?;

        let data = STANDARD
            .decode(&self.data)
            .map_err(|e| CryptoError::InvalidPayload(format!("data is not base64: {}", e)))?;
        if data.len() < TAG_LEN {
            return Err(CryptoError::InvalidPayload(format!(
                "data too short: {} bytes (minimum {})",
                data.len(),
                TAG_LEN
            )));
        }

        Ok((iv, data))
    }

    /// Serializes the payload as `{"iv": ..., "data": ...}`.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a payload previously written by [`EncryptedPayload::to_json`].
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
