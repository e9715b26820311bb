//! Alerta HTTP gateway

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{build_payload, AlertOverrides, NotificationGateway};
use crate::error::NotifyError;

/// Status the sink answers with on a created alert
const CREATED: u16 = 201;

/// Alerta endpoint configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertaConfig {
    /// Alert endpoint, e.g. `https://alerta.example.com/api/alert`
    pub url: String,
    /// API key sent as `Authorization: Key <token>`
    pub token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Log payloads instead of posting them
    pub dry_run: bool,
    /// Payload defaults applied before per-call overrides
    pub defaults: AlertOverrides,
}

impl Default for AlertaConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080/api/alert".to_string(),
            token: String::new(),
            timeout_secs: 10,
            dry_run: false,
            defaults: AlertOverrides::default(),
        }
    }
}

/// Gateway posting to an Alerta-compatible endpoint
#[derive(Debug, Clone)]
pub struct AlertaGateway {
    client: reqwest::Client,
    url: String,
    token: String,
    defaults: AlertOverrides,
}

impl AlertaGateway {
    /// Create gateway from configuration
    ///
    /// # Errors
    /// Returns `NotifyError::Transport` if the HTTP client cannot be built
    pub fn new(config: &AlertaConfig) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            defaults: config.defaults.clone(),
        })
    }

    /// Endpoint this gateway posts to
    #[inline]
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationGateway for AlertaGateway {
    async fn notify(&self, message: &str, overrides: &AlertOverrides) -> Result<(), NotifyError> {
        let payload = build_payload(message, &self.defaults, overrides);
        let body = serde_json::to_string(&payload)?;

        let response = self
            .client
            .post(&self.url)
            .header(AUTHORIZATION, format!("Key {}", self.token))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status().as_u16();
        let content = response.text().await?;

        if let Err(err) = evaluate_response(status, &content) {
            tracing::warn!(url = %self.url, status, error = %err, "alerta rejected notification");
            return Err(err);
        }

        tracing::debug!(url = %self.url, severity = %payload.severity, "alerta notification created");
        Ok(())
    }
}

/// Validate a sink response
///
/// # Errors
/// - `NotifyError::BadStatusCode` unless the status is `201`
/// - `NotifyError::BadContent` unless the body is a non-empty JSON object or array
/// - `NotifyError::UnexpectedAlertState` if `alert.status` is present and not `open`
pub fn evaluate_response(status: u16, body: &str) -> Result<(), NotifyError> {
    if status != CREATED {
        return Err(NotifyError::BadStatusCode {
            expected: CREATED,
            actual: status,
        });
    }

    if body.trim().is_empty() {
        return Err(NotifyError::BadContent("empty response body".to_string()));
    }

    let content: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| NotifyError::BadContent(format!("invalid JSON: {e}")))?;

    let structured = match &content {
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => false,
    };
    if !structured {
        return Err(NotifyError::BadContent(format!(
            "expected a non-empty JSON document, got {content}"
        )));
    }

    match content.pointer("/alert/status") {
        None => Ok(()),
        Some(state) if state.as_str() == Some("open") => Ok(()),
        Some(state) => Err(NotifyError::UnexpectedAlertState(
            state
                .as_str()
                .map_or_else(|| state.to_string(), str::to_string),
        )),
    }
}
