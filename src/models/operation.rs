use serde::{Deserialize, Serialize};

pub const UNKNOWN_ERROR: &str = "Unknown error";

/// URL returned in the `operation-location` header of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(String);

impl OperationHandle {
    /// Empty header values are treated as missing.
    pub fn from_header(value: Option<String>) -> Option<Self> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(OperationHandle)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Polling response as sent by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationStatus {
    pub status: String,
    #[serde(default)]
    pub result: Option<OperationResult>,
    #[serde(default)]
    pub error: Option<OperationError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationResult {
    #[serde(default)]
    pub data: Vec<ImageData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageData {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationError {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStatus {
    /// Not terminal yet; carries the raw status string.
    Pending(String),
    Succeeded { url: Option<String> },
    Failed { message: String },
    Canceled { message: String },
}

impl OperationStatus {
    fn error_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone())
            .unwrap_or_else(|| UNKNOWN_ERROR.to_string())
    }

    fn first_url(&self) -> Option<String> {
        self.result
            .as_ref()
            .and_then(|r| r.data.first())
            .and_then(|d| d.url.clone())
    }

    pub fn into_status(self) -> GenerationStatus {
        match self.status.as_str() {
            "succeeded" => GenerationStatus::Succeeded {
                url: self.first_url(),
            },
            "failed" => GenerationStatus::Failed {
                message: self.error_message(),
            },
            "canceled" => GenerationStatus::Canceled {
                message: self.error_message(),
            },
            _ => GenerationStatus::Pending(self.status),
        }
    }
}
