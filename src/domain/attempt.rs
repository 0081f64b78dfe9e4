use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one quiz submission as issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttemptId(String);

impl AttemptId {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(ClientError::ValidationError(
                "Attempt id must not be empty".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AttemptId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPreview {
    pub type_name: String,
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The backend's view of an attempt.
///
/// `result` is only present once the attempt is paid; unpaid attempts carry a
/// `preview` instead. Older backends send the preview fields flat on the
/// response, so `type_name` and `snippet` are kept as a fallback.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuizResult {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<ResultPreview>,
    #[serde(rename = "typeName", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl QuizResult {
    /// Content is unlocked only when the backend says so and sent the payload.
    pub fn is_unlocked(&self) -> bool {
        self.is_paid && self.result.is_some()
    }

    /// Archetype name for the free preview, preferring the nested preview.
    pub fn preview_type_name(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .map(|p| p.type_name.as_str())
            .or(self.type_name.as_deref())
    }

    pub fn preview_snippet(&self) -> Option<&str> {
        self.preview
            .as_ref()
            .map(|p| p.snippet.as_str())
            .or(self.snippet.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizOption {
    pub value: i32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    pub text: String,
    pub domain: String,
    pub options: Vec<QuizOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question_id: u32,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: String,
    #[serde(rename = "resultTypeName")]
    pub result_type_name: String,
    #[serde(rename = "imageUrl", default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default)]
    pub is_paid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}
