//! Faultline Records
//!
//! Content-addressed fault records: the durable state of one deduplicated
//! fault signature.
//!
//! # Core Concepts
//!
//! - [`FaultRecord`]: identity, counters, timestamps and status of one fault
//! - [`FaultId`]: SHA-1 of project, exception type, class and message
//! - [`FaultSeverity`]: closed severity tag (`emergency` down to `error`)
//! - [`FaultFactory`]: identity generator and record constructor
//!
//! # Example
//!
//! ```rust,ignore
//! use faultline_record::FaultFactory;
//!
//! let record = FaultFactory::new().build(
//!     "billing", "InvoiceCommand", &entity_uuid, "error", "Timeout", "upstream timed out",
//! )?;
//! println!("Fault: {}", record.id());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod error;
mod factory;
mod id;
mod record;
mod severity;

pub use error::RecordError;
pub use factory::FaultFactory;
pub use id::{FaultId, FAULT_ID_LEN};
pub use record::{FaultRecord, FaultStatus};
pub use severity::{classify, FaultSeverity, ReportedFault};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
