//! Fallback parser for input that isn't `<N>` prefixed at all.
//!
//! Never fails: the whole body becomes the message, with a fixed
//! facility/severity and no recoverable timestamp or hostname.

use bytes::Bytes;
use sluice_core::record::{OriginFormat, Record};

/// user-level (1), notice (5) — the fixed facility/severity for permissive
/// records, per the parser's format-detection fallback rule.
pub const FACILITY: u8 = 1;
pub const SEVERITY: u8 = 5;

pub fn parse(input: &[u8], raw: Bytes) -> Record {
    let message = String::from_utf8_lossy(input).into_owned();
    Record {
        facility: FACILITY,
        severity: SEVERITY,
        timestamp: None,
        hostname: String::new(),
        app_name: String::new(),
        proc_id: String::new(),
        msg_id: String::new(),
        structured_data: String::new(),
        message,
        raw,
        origin_format: OriginFormat::Permissive,
    }
}
