//! Request types shared by every provider adapter
//!
//! A chart analysis is always the same shape regardless of vendor: one system
//! prompt, one block of caller context and one image. Adapters decide where
//! each piece goes in their own wire format.

use serde::{Deserialize, Serialize};

/// Media type used for every encoded chart
pub const PNG_MEDIA_TYPE: &str = "image/png";

/// A base64-encoded image ready to embed in a JSON body
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedImage {
    /// Media type (e.g., "image/png")
    pub media_type: String,
    /// Base64-encoded image data (standard alphabet, padded)
    pub data: String,
}

impl EncodedImage {
    /// Wrap base64 PNG data
    pub fn png(data: impl Into<String>) -> Self {
        Self {
            media_type: PNG_MEDIA_TYPE.to_string(),
            data: data.into(),
        }
    }

    /// Render as a `data:` URL
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}

// Payloads run to megabytes; keep them out of logs and assertion output.
impl std::fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodedImage")
            .field("media_type", &self.media_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// One multimodal analysis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionRequest {
    /// Methodology and output format the model must follow
    pub system_prompt: String,

    /// Caller-supplied context, passed through verbatim
    pub context: String,

    /// The chart
    pub image: EncodedImage,
}

impl VisionRequest {
    /// Create a new request
    pub fn new(
        system_prompt: impl Into<String>,
        context: impl Into<String>,
        image: EncodedImage,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            context: context.into(),
            image,
        }
    }
}
