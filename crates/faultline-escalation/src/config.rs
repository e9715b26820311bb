//! Escalation configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Escalation policy configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationConfig {
    /// Minimum re-notification delay in seconds
    pub delay_secs: u64,
    /// How the re-notification delay is evaluated
    pub delay_check: DelayCheck,
    /// Repetition thresholds per severity
    pub thresholds: Thresholds,
    /// Severity labels sent to the notification sink per tier
    pub labels: TierLabels,
}

impl EscalationConfig {
    /// With re-notification delay
    #[inline]
    #[must_use]
    pub fn with_delay_secs(mut self, secs: u64) -> Self {
        self.delay_secs = secs;
        self
    }

    /// With delay evaluation mode
    #[inline]
    #[must_use]
    pub fn with_delay_check(mut self, check: DelayCheck) -> Self {
        self.delay_check = check;
        self
    }

    /// With repetition thresholds
    #[inline]
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// With tier severity labels
    #[inline]
    #[must_use]
    pub fn with_labels(mut self, labels: TierLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Check thresholds and labels
    ///
    /// # Errors
    /// - `ConfigError::ThresholdOrder` if an emergency threshold does not
    ///   exceed its critical threshold
    /// - `ConfigError::EmptyLabel` if a tier label is blank
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.thresholds.validate()?;
        self.labels.validate()
    }

    /// Delay check bound to this configuration's delay
    #[inline]
    #[must_use]
    pub fn delay_elapsed(&self, alerted_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.delay_check.permits(alerted_at, now, self.delay_secs)
    }
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            delay_secs: 600,
            delay_check: DelayCheck::default(),
            thresholds: Thresholds::default(),
            labels: TierLabels::default(),
        }
    }
}

/// Re-notification delay evaluation
///
/// `Legacy` keeps the historical comparison `alertedAt - now >= delay`. For a
/// positive delay and an `alertedAt` in the past it never passes, so a fault
/// that has been notified once stays quiet. `Elapsed` re-notifies once the
/// delay has run out since the last notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelayCheck {
    /// `alertedAt - now >= delay`
    #[default]
    Legacy,
    /// `now - alertedAt >= delay`
    Elapsed,
}

impl DelayCheck {
    /// Check whether a processed fault may be notified again
    #[must_use]
    pub fn permits(self, alerted_at: DateTime<Utc>, now: DateTime<Utc>, delay_secs: u64) -> bool {
        let delay = i64::try_from(delay_secs).unwrap_or(i64::MAX);
        match self {
            Self::Legacy => alerted_at.timestamp() - now.timestamp() >= delay,
            Self::Elapsed => now.timestamp() - alerted_at.timestamp() >= delay,
        }
    }
}

/// Repetition thresholds
///
/// A fault escalates to a tier once its repetitions strictly exceed the
/// tier's threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub critical_alert: u64,
    pub emergency_alert: u64,
    pub critical_error: u64,
    pub emergency_error: u64,
}

impl Thresholds {
    /// Check that each emergency threshold exceeds its critical threshold
    ///
    /// # Errors
    /// Returns `ConfigError::ThresholdOrder` naming the offending severity
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.emergency_alert <= self.critical_alert {
            return Err(ConfigError::ThresholdOrder {
                tier: "alert",
                critical: self.critical_alert,
                emergency: self.emergency_alert,
            });
        }
        if self.emergency_error <= self.critical_error {
            return Err(ConfigError::ThresholdOrder {
                tier: "error",
                critical: self.critical_error,
                emergency: self.emergency_error,
            });
        }
        Ok(())
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical_alert: 5,
            emergency_alert: 10,
            critical_error: 50,
            emergency_error: 100,
        }
    }
}

/// Severity labels sent to the sink for each notification tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierLabels {
    pub emergency: String,
    pub critical: String,
}

impl TierLabels {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.emergency.trim().is_empty() {
            return Err(ConfigError::EmptyLabel("emergency"));
        }
        if self.critical.trim().is_empty() {
            return Err(ConfigError::EmptyLabel("critical"));
        }
        Ok(())
    }
}

impl Default for TierLabels {
    fn default() -> Self {
        Self {
            emergency: "critical".to_string(),
            critical: "major".to_string(),
        }
    }
}
