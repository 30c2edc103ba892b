//! Ingress listeners (C6): UDP and TCP, with RFC 6587 framing on TCP.
//!
//! Each listener runs in its own task; each accepted TCP connection runs in
//! its own task. Parsing happens here, at the point where the protocol
//! label for `syslog_messages_parse_errors_total` is known; a parsed record
//! is handed to the pipeline over an mpsc channel.

pub mod framing;
pub mod tcp;
pub mod udp;

pub use tcp::{TcpIngress, TcpIngressConfig};
pub use udp::{UdpIngress, UdpIngressConfig};

use sluice_core::record::Record;

/// One successfully parsed record, tagged with the input that produced it.
#[derive(Debug, Clone)]
pub struct IngressMessage {
    pub input_name: String,
    pub record: Record,
}
