//! Faultline Escalation
//!
//! Decides when a recurring fault deserves an external notification.
//!
//! # Core Concepts
//!
//! - [`EscalationPolicy`]: gate, threshold dispatch and post-notification update
//! - [`NotificationGateway`]: outbound sink contract, with [`AlertaGateway`]
//!   and [`DryRunGateway`] adapters
//! - [`FaultReporter`] / [`FaultConsumer`]: queue handoff on
//!   [`FAILED_FAULT_TOPIC`]
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline_escalation::{EscalationConfig, EscalationPolicy};
//!
//! let policy = EscalationPolicy::new(store, gateway, EscalationConfig::default())?;
//! match policy.handle(&record).await? {
//!     Escalation::Notified(tier) => println!("notified at {tier}"),
//!     other => println!("{other}"),
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod config;
mod error;
mod gateway;
mod handoff;
mod policy;

pub use config::{DelayCheck, EscalationConfig, Thresholds, TierLabels};
pub use error::{ConfigError, EscalationError, NotifyError, QueueError, ReportError};
pub use gateway::{
    build_payload, evaluate_response, AlertOverrides, AlertPayload, AlertaConfig, AlertaGateway,
    DryRunGateway, NotificationGateway, OneOrMany,
};
pub use handoff::{
    ChannelQueue, ConsumerStats, FaultConsumer, FaultQueue, FaultReporter, QueueMessage,
    FAILED_FAULT_TOPIC,
};
pub use policy::{Escalation, EscalationPolicy, NotifyTier};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
