use serde::{Deserialize, Serialize};

/// Body of the `images/generations:submit` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    pub size: String,
    pub n: u32,
    pub quality: String,
}

impl GenerationRequest {
    pub fn new(
        prompt: impl Into<String>,
        size: impl Into<String>,
        quality: impl Into<String>,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            size: size.into(),
            n: 1,
            quality: quality.into(),
        }
    }
}

/// A generated image whose URL has passed endpoint validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub url: String,
    pub prompt: String,
}
