//! Analytics payloads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageViewed {
    pub session_id: String,
    pub user_id: Option<String>,
    pub path: String,
    pub referrer: Option<String>,
}

/// Free-form tracked event; `properties` is not schematized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTracked {
    pub session_id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRecorded {
    pub session_id: String,
    pub user_id: Option<String>,
    pub goal: String,
    pub value: Option<f64>,
    pub currency: Option<String>,
}
