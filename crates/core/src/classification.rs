//! Classification results — the classifier's verdict on one message.
//!
//! The classifier model answers in free-form text that contains a JSON
//! object. Two key styles show up in practice (camelCase from the full
//! classifier template, snake_case from the routing template); both parse
//! into the same [`ClassificationResult`].

use serde::{Deserialize, Deserializer, Serialize};

/// Tag used for every failed classification.
pub const ERROR_CLASSIFICATION: &str = "ERROR";

/// Route hint naming the general-purpose handler.
pub const GENERAL_ROUTE: &str = "MedicalQueryService";

/// Reply shown when classification fails.
pub const CLASSIFICATION_ERROR_TEXT: &str = "I apologize, but I encountered an error while analyzing your message. \
Please try rephrasing your request or contact support if the issue persists.";

/// Produced once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationResult {
    /// Intent tag, e.g. `MEDICAL_QUERY` or `ERROR`
    #[serde(default)]
    pub classification: String,

    /// Text the classifier suggests showing the user
    #[serde(default, alias = "response", alias = "reply", alias = "response_text")]
    pub response_text: Option<String>,

    /// Suggested route (service or prompt name)
    #[serde(default, alias = "route_to")]
    pub route_to: Option<String>,

    #[serde(
        default,
        alias = "shouldDeductFromRateLimit",
        alias = "should_deduct_from_quota",
        deserialize_with = "bool_or_null"
    )]
    pub should_deduct_from_quota: bool,

    #[serde(default, alias = "is_follow_up", deserialize_with = "bool_or_null")]
    pub is_follow_up: bool,

    #[serde(default, alias = "follow_up_data_required")]
    pub follow_up_data_required: Option<String>,

    /// `Some(false)` means the classifier could not extract a routable intent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parsed: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inference: Option<String>,

    /// Anything else the classifier returned
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn bool_or_null<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(false))
}

impl ClassificationResult {
    /// The deterministic result for any classification failure.
    pub fn error(reason: impl std::fmt::Display) -> Self {
        Self {
            classification: ERROR_CLASSIFICATION.into(),
            response_text: Some(CLASSIFICATION_ERROR_TEXT.into()),
            route_to: Some(GENERAL_ROUTE.into()),
            should_deduct_from_quota: false,
            is_follow_up: false,
            follow_up_data_required: None,
            parsed: Some(false),
            inference: Some(format!("Classification failed due to error: {reason}")),
            extra: serde_json::Map::new(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.classification == ERROR_CLASSIFICATION
    }

    /// Whether the result carries enough to pick a handler.
    ///
    /// An absent `parsed` flag counts as parsed; only an explicit `false`
    /// or an error classification sends the request down the safe path.
    pub fn has_routing_signal(&self) -> bool {
        !self.is_error() && self.parsed != Some(false)
    }

    /// The snake_case template's `message_type`, if present.
    pub fn message_type(&self) -> Option<&str> {
        self.extra.get("message_type").and_then(|v| v.as_str())
    }

    /// Non-blank suggested reply.
    pub fn reply(&self) -> Option<&str> {
        self.response_text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}
