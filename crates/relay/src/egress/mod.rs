//! Egress senders (C7): one independent sender per destination, UDP
//! one-shot, TCP with reconnect/backoff and per-message retry.

pub mod tcp;
pub mod udp;

pub use tcp::{TcpEgress, TcpEgressConfig};
pub use udp::{UdpEgress, UdpEgressConfig};

use crate::serializer::OutputFormat;
use sluice_core::record::Record;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base_seconds: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base_seconds: 1.0,
        }
    }
}

impl RetryPolicy {
    /// `backoff_base * 2^(attempt-1)`, for `attempt` in `1..=max_attempts`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let secs = self.backoff_base_seconds * 2f64.powi(attempt as i32 - 1);
        std::time::Duration::from_secs_f64(secs.max(0.0))
    }
}

/// What a destination sender does with one record it has been asked to
/// emit: offer it to the wire, serializing with the destination's
/// configured format.
pub fn serialize_for_send(record: &Record, format: OutputFormat, transformed: bool) -> Vec<u8> {
    crate::serializer::serialize(record, format, transformed)
}

/// Escapes raw `\n` out of a serialized body before non-transparent framing
/// on TCP egress, per spec.md §4.6.
pub fn escape_newlines_for_framing(body: &[u8]) -> Vec<u8> {
    body.iter()
        .map(|&b| if b == b'\n' { b' ' } else { b })
        .collect()
}
