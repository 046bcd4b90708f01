use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use serde::Deserialize;
use serde::Serialize;

/// Decoded body of a successful `POST /generate`.
///
/// Every field is optional: deployments differ in whether they echo the request back, and a
/// model may legitimately produce neither text nor images.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenerateResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uploaded_images: Option<Vec<ImagePayload>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_images: Option<Vec<ImagePayload>>,
}

impl GenerateResponse {
    /// Generated text, if present and not blank.
    pub fn non_blank_text(&self) -> Option<&str> {
        self.generated_text
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }

    pub fn generated_images(&self) -> &[ImagePayload] {
        self.generated_images.as_deref().unwrap_or_default()
    }

    pub fn uploaded_images(&self) -> &[ImagePayload] {
        self.uploaded_images.as_deref().unwrap_or_default()
    }

    /// `false` when the backend produced neither non-blank text nor any image.
    pub fn has_generated_content(&self) -> bool {
        self.non_blank_text().is_some() || !self.generated_images().is_empty()
    }
}

/// An image transported as base64 text.
///
/// Used both for the uploaded-image echoes (which carry a `filename`) and for generated images
/// (which usually don't).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ImagePayload {
    /// Base64 (standard alphabet, padded) encoding of the image bytes.
    pub data: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            data: BASE64_STANDARD.encode(bytes),
            mime_type: mime_type.into(),
            filename: None,
        }
    }

    /// `data:<mime>;base64,<data>` form, suitable for an `<img src>`.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }

    pub fn decode_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        BASE64_STANDARD.decode(self.data.trim())
    }

    /// Size of the decoded image, computed from the base64 length without decoding.
    pub fn decoded_len(&self) -> usize {
        let data = self.data.trim();
        let padding = data.chars().rev().take_while(|c| *c == '=').count();
        (data.len() / 4 * 3).saturating_sub(padding)
    }
}
