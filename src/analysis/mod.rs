//! Remote analysis boundary
//!
//! The pipeline hands an encoded JPEG to an [`AnalysisClient`] and gets back
//! an opaque JSON object. [`HttpAnalysisClient`] is the production client.
pub mod http;

use crate::errors::AnalysisError;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use http::{HttpAnalysisClient, HttpClientConfig};

/// Opaque key/value result returned by the analysis service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisOutcome(pub Map<String, Value>);

impl AnalysisOutcome {
    /// Accepts only JSON objects
    pub fn from_value(value: Value) -> Result<Self, AnalysisError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AnalysisError::MalformedResponse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Detected material type, `"unknown"` when absent
    pub fn material_type(&self) -> &str {
        self.0
            .get("material_type")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
    }

    /// Free-text analysis, with a placeholder when absent
    pub fn summary(&self) -> &str {
        self.0
            .get("analysis")
            .and_then(Value::as_str)
            .unwrap_or("no analysis result")
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Slow, fallible remote analysis of one encoded frame
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    /// Precondition check run before a frame is submitted, e.g. that a
    /// credential is configured. Must not touch the network.
    fn ready(&self) -> Result<(), AnalysisError> {
        Ok(())
    }

    async fn analyze(&self, jpeg: Bytes) -> Result<AnalysisOutcome, AnalysisError>;
}
