//! Fault severity tiers
//!
//! Severity is a closed tag carried by the fault itself. Reporting code
//! implements [`ReportedFault`] and states its tier explicitly; anything that
//! does not is treated as a plain `error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::RecordError;

/// Severity tier of a fault, ordered `Emergency > Critical > Alert > Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultSeverity {
    /// Lowest tier, escalated only on heavy repetition
    Error,
    /// Escalated on moderate repetition
    Alert,
    /// Always notified
    Critical,
    /// Always notified
    Emergency,
}

impl FaultSeverity {
    /// All tiers, highest first
    pub const ALL: [FaultSeverity; 4] = [
        FaultSeverity::Emergency,
        FaultSeverity::Critical,
        FaultSeverity::Alert,
        FaultSeverity::Error,
    ];

    /// Wire label used in fault ids and persisted records
    #[inline]
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FaultSeverity::Emergency => "emergency",
            FaultSeverity::Critical => "critical",
            FaultSeverity::Alert => "alert",
            FaultSeverity::Error => "error",
        }
    }

    /// Numeric rank (higher is more severe)
    #[inline]
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            FaultSeverity::Error => 0,
            FaultSeverity::Alert => 1,
            FaultSeverity::Critical => 2,
            FaultSeverity::Emergency => 3,
        }
    }
}

impl PartialOrd for FaultSeverity {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FaultSeverity {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for FaultSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FaultSeverity {
    type Err = RecordError;

    /// Case-insensitive, surrounding whitespace is not accepted
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RecordError::UnknownSeverity(s.to_string()))
    }
}

/// A fault raised by application code that can be reported for escalation
pub trait ReportedFault: std::error::Error {
    /// Severity tag assigned where the fault was raised
    ///
    /// `None` means untagged; such faults are classified as `error`.
    fn severity(&self) -> Option<FaultSeverity> {
        None
    }

    /// Name identifying the kind of fault, part of the fault identity
    fn fault_class(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Map a reported fault to its severity tier, defaulting to `error`
#[inline]
#[must_use]
pub fn classify(fault: &dyn ReportedFault) -> FaultSeverity {
    fault.severity().unwrap_or(FaultSeverity::Error)
}
