//! Shared types for the sluice syslog relay: the canonical [`Record`],
//! the relay-wide error hierarchy, and the Prometheus metric name constants.

pub mod error;
pub mod metrics;
pub mod record;

pub use record::{OriginFormat, Record, RecordField};
