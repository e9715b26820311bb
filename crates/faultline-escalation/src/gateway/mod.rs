//! Notification gateway
//!
//! A [`NotificationGateway`] turns an escalation decision into one outbound
//! notification. The payload starts from a fixed template, then configured
//! defaults and per-call [`AlertOverrides`] are layered on top.

mod alerta;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::NotifyError;

pub use alerta::{evaluate_response, AlertaConfig, AlertaGateway};

/// Outbound notification sink
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver one notification for `message`
    ///
    /// # Errors
    /// Returns `NotifyError` if delivery or response validation fails
    async fn notify(&self, message: &str, overrides: &AlertOverrides) -> Result<(), NotifyError>;
}

/// A single string or a list of strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    /// Flatten into a list
    #[must_use]
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl From<&str> for OneOrMany {
    fn from(value: &str) -> Self {
        Self::One(value.to_string())
    }
}

/// Optional payload fields replacing template values
///
/// Attributes are merged key by key; every other field replaces the value
/// beneath it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertOverrides {
    pub resource: Option<String>,
    pub service: Option<OneOrMany>,
    pub environment: Option<String>,
    #[serde(rename = "type")]
    pub alert_type: Option<String>,
    pub group: Option<String>,
    pub severity: Option<String>,
    pub tags: Option<OneOrMany>,
    pub attributes: Option<BTreeMap<String, String>>,
}

impl AlertOverrides {
    /// With resource
    #[inline]
    #[must_use]
    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// With severity
    #[inline]
    #[must_use]
    pub fn with_severity(mut self, severity: impl Into<String>) -> Self {
        self.severity = Some(severity.into());
        self
    }

    /// With service
    #[inline]
    #[must_use]
    pub fn with_service(mut self, service: impl Into<OneOrMany>) -> Self {
        self.service = Some(service.into());
        self
    }
}

/// Notification body posted to the sink
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertPayload {
    pub attributes: BTreeMap<String, String>,
    pub correlate: Vec<String>,
    pub environment: String,
    pub event: String,
    pub group: String,
    pub origin: String,
    pub resource: String,
    pub service: Vec<String>,
    pub severity: String,
    pub tags: Vec<String>,
    pub text: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub value: String,
}

impl AlertPayload {
    /// Fixed template carrying `text`
    #[must_use]
    pub fn template(text: impl Into<String>) -> Self {
        Self {
            attributes: BTreeMap::from([("region".to_string(), "EU".to_string())]),
            correlate: vec!["HttpServerError".to_string(), "HttpServerOK".to_string()],
            environment: "Production".to_string(),
            event: "HttpServerError".to_string(),
            group: "Web".to_string(),
            origin: "curl".to_string(),
            resource: "default".to_string(),
            service: Vec::new(),
            severity: "major".to_string(),
            tags: vec!["dc1".to_string()],
            text: text.into(),
            alert_type: "exceptionAlert".to_string(),
            value: String::new(),
        }
    }

    /// Layer overrides on top of this payload
    #[must_use]
    pub fn apply(mut self, overrides: &AlertOverrides) -> Self {
        if let Some(resource) = &overrides.resource {
            self.resource.clone_from(resource);
        }
        if let Some(service) = &overrides.service {
            self.service = service.clone().into_vec();
        }
        if let Some(environment) = &overrides.environment {
            self.environment.clone_from(environment);
        }
        if let Some(alert_type) = &overrides.alert_type {
            self.alert_type.clone_from(alert_type);
        }
        if let Some(group) = &overrides.group {
            self.group.clone_from(group);
        }
        if let Some(severity) = &overrides.severity {
            self.severity.clone_from(severity);
        }
        if let Some(tags) = &overrides.tags {
            self.tags = tags.clone().into_vec();
        }
        if let Some(attributes) = &overrides.attributes {
            self.attributes
                .extend(attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self
    }
}

/// Template, then configured defaults, then per-call overrides
#[must_use]
pub fn build_payload(
    message: &str,
    defaults: &AlertOverrides,
    overrides: &AlertOverrides,
) -> AlertPayload {
    AlertPayload::template(message)
        .apply(defaults)
        .apply(overrides)
}

/// Gateway that logs payloads instead of posting them
#[derive(Debug, Default)]
pub struct DryRunGateway {
    defaults: AlertOverrides,
    sent: AtomicU64,
}

impl DryRunGateway {
    /// Create gateway with configured defaults
    #[must_use]
    pub fn new(defaults: AlertOverrides) -> Self {
        Self {
            defaults,
            sent: AtomicU64::new(0),
        }
    }

    /// Number of notifications logged
    #[inline]
    #[must_use]
    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl NotificationGateway for DryRunGateway {
    async fn notify(&self, message: &str, overrides: &AlertOverrides) -> Result<(), NotifyError> {
        let payload = build_payload(message, &self.defaults, overrides);
        let body = serde_json::to_string(&payload)?;
        self.sent.fetch_add(1, Ordering::Relaxed);
        tracing::info!(severity = %payload.severity, resource = %payload.resource, %body, "dry run: notification not sent");
        Ok(())
    }
}
