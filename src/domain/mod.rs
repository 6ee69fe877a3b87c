//! Domain types for the alert-to-post pipeline.
//!
//! This module provides:
//! - Dynamically typed extracted field values (`FieldValue`, `FieldMap`)
//! - Ledger records: `SignalRecord` for correlation state, `DispatchAttempt`
//!   for the audit trail of posting calls
//! - `Webhook` and `Mapping` configuration rows consumed read-only per alert

pub mod field;
pub mod mapping;
pub mod signal;

pub use field::{FieldMap, FieldValue};
pub use mapping::{Mapping, Webhook};
pub use signal::{DispatchAttempt, DispatchOutcome, SignalRecord, SignalStatus};
