use super::{AnalysisClient, AnalysisOutcome};
use crate::errors::AnalysisError;
use async_trait::async_trait;
use base64::Engine;
use bytes::Bytes;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

/// Settings for [`HttpAnalysisClient`]
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL; `/analyze` is appended unless already present
    pub endpoint: String,
    pub api_key: String,
    pub timeout: Duration,
    pub analyze_type: String,
    pub detail_level: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.deepseek.com/v1".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(15),
            analyze_type: "learning_material".to_string(),
            detail_level: "high".to_string(),
        }
    }
}

/// Posts base64 JPEG frames to a remote analysis endpoint
#[derive(Debug, Clone)]
pub struct HttpAnalysisClient {
    http: reqwest::Client,
    url: String,
    api_key: String,
    timeout: Duration,
    analyze_type: String,
    detail_level: String,
}

impl HttpAnalysisClient {
    pub fn new(config: HttpClientConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnalysisError::Network(format!("Failed to build HTTP client: {}", e)))?;

        let url = analyze_url(&config.endpoint);
        log::debug!(
            "Analysis client targeting {} (timeout {:?})",
            url,
            config.timeout
        );

        Ok(Self {
            http,
            url,
            api_key: config.api_key.trim().to_string(),
            timeout: config.timeout,
            analyze_type: config.analyze_type,
            detail_level: config.detail_level,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn map_transport_error(&self, error: reqwest::Error) -> AnalysisError {
        if error.is_timeout() {
            AnalysisError::Timeout(self.timeout)
        } else {
            AnalysisError::Network(error.to_string())
        }
    }
}

/// `https://host/v1` -> `https://host/v1/analyze`, leaving an explicit
/// `/analyze` suffix alone
fn analyze_url(endpoint: &str) -> String {
    let base = endpoint.trim().trim_end_matches('/');
    if base.ends_with("/analyze") {
        base.to_string()
    } else {
        format!("{}/analyze", base)
    }
}

#[async_trait]
impl AnalysisClient for HttpAnalysisClient {
    fn ready(&self) -> Result<(), AnalysisError> {
        if self.api_key.is_empty() {
            return Err(AnalysisError::MissingCredential);
        }
        Ok(())
    }

    async fn analyze(&self, jpeg: Bytes) -> Result<AnalysisOutcome, AnalysisError> {
        self.ready()?;

        let payload = json!({
            "image": base64::engine::general_purpose::STANDARD.encode(&jpeg),
            "parameters": {
                "analyze_type": self.analyze_type,
                "detail_level": self.detail_level,
            }
        });

        log::debug!("Submitting {} byte frame to {}", jpeg.len(), self.url);

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AnalysisError::Unauthorized(format!(
                "server answered {}",
                status
            )));
        }
        if !status.is_success() {
            return Err(AnalysisError::Network(format!("server answered {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))?;

        AnalysisOutcome::from_value(value)
    }
}
