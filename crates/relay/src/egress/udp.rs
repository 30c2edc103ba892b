//! UDP sender: non-blocking one-shot send, no retry (loss is accepted
//! semantics for UDP).

use metrics::counter;
use sluice_core::metrics::LABEL_REASON;
use tokio::net::UdpSocket;

#[derive(Debug, Clone)]
pub struct UdpEgressConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
}

pub struct UdpEgress {
    config: UdpEgressConfig,
    socket: UdpSocket,
}

impl UdpEgress {
    pub async fn connect(config: UdpEgressConfig) -> std::io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((config.host.as_str(), config.port)).await?;
        Ok(Self { config, socket })
    }

    /// Sends one datagram. A failure is logged and counted as dropped;
    /// there is no retry for UDP.
    pub async fn send(&self, body: &[u8]) -> bool {
        match self.socket.send(body).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(destination = %self.config.name, error = %e, "udp send failed");
                counter!(
                    sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
                    LABEL_REASON => "send_failed",
                )
                .increment(1);
                false
            }
        }
    }
}
