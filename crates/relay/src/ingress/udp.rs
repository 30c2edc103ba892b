//! UDP ingress: one bound socket per input, one datagram per message, no
//! framing state.

use metrics::counter;
use sluice_core::metrics::{LABEL_FACILITY, LABEL_PROTOCOL, LABEL_SEVERITY, LABEL_REASON};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use super::IngressMessage;
use crate::parser;

const MAX_DATAGRAM: usize = 65_535;

#[derive(Debug, Clone)]
pub struct UdpIngressConfig {
    pub name: String,
    pub bind_addr: String,
}

pub struct UdpIngress {
    config: UdpIngressConfig,
    cancel: CancellationToken,
}

impl UdpIngress {
    pub fn new(config: UdpIngressConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    /// Binds the socket and loops until cancellation, parsing each
    /// datagram and forwarding successfully-parsed records to `tx`.
    /// Oversize datagrams the kernel actually delivered are accepted as-is
    /// — there is no application-level fragmentation to reassemble.
    pub async fn run(self, tx: tokio::sync::mpsc::Sender<IngressMessage>) -> std::io::Result<()> {
        self.run_with_ready(tx, None).await
    }

    /// Like [`UdpIngress::run`], but signals the bound local address on
    /// `ready` once the socket is bound — used by tests that bind to an
    /// ephemeral port and need to learn it before sending.
    pub async fn run_with_ready(
        self,
        tx: tokio::sync::mpsc::Sender<IngressMessage>,
        ready: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
    ) -> std::io::Result<()> {
        let socket = Arc::new(UdpSocket::bind(&self.config.bind_addr).await?);
        let mut buf = vec![0u8; MAX_DATAGRAM];

        if let Some(ready) = ready {
            let _ = ready.send(socket.local_addr()?);
        }

        tracing::info!(input = %self.config.name, addr = %self.config.bind_addr, "udp ingress listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(input = %self.config.name, "udp ingress shutting down");
                    return Ok(());
                }
                recv = socket.recv_from(&mut buf) => {
                    let (n, _peer) = match recv {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(input = %self.config.name, error = %e, "udp recv error");
                            continue;
                        }
                    };

                    match parser::parse(&buf[..n]) {
                        Ok(record) => {
                            counter!(
                                sluice_core::metrics::MESSAGES_RECEIVED_TOTAL,
                                LABEL_PROTOCOL => "udp",
                                LABEL_FACILITY => record.facility.to_string(),
                                LABEL_SEVERITY => record.severity.to_string(),
                            )
                            .increment(1);

                            if tx
                                .send(IngressMessage {
                                    input_name: self.config.name.clone(),
                                    record,
                                })
                                .await
                                .is_err()
                            {
                                tracing::warn!(input = %self.config.name, "pipeline channel closed, dropping message");
                            }
                        }
                        Err(e) => {
                            counter!(
                                sluice_core::metrics::MESSAGES_PARSE_ERRORS_TOTAL,
                                LABEL_PROTOCOL => "udp",
                            )
                            .increment(1);
                            counter!(
                                sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
                                LABEL_REASON => "parse_error",
                            )
                            .increment(1);
                            tracing::debug!(input = %self.config.name, reason = e.reason(), error = %e, "udp parse error");
                        }
                    }
                }
            }
        }
    }
}
