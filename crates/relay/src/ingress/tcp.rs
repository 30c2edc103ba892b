//! TCP ingress: one bound listener per input, one task per connection,
//! RFC 6587 framing auto-detected per frame.

use metrics::{counter, gauge};
use sluice_core::metrics::{LABEL_FACILITY, LABEL_INPUT, LABEL_PROTOCOL, LABEL_REASON, LABEL_SEVERITY};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use super::IngressMessage;
use super::framing::{FramingError, extract_frame};
use crate::parser;

#[derive(Debug, Clone)]
pub struct TcpIngressConfig {
    pub name: String,
    pub bind_addr: String,
    pub max_connections: usize,
    pub max_message_size: usize,
    pub read_chunk_size: usize,
}

impl Default for TcpIngressConfig {
    fn default() -> Self {
        Self {
            name: "tcp".into(),
            bind_addr: "0.0.0.0:601".into(),
            max_connections: 256,
            max_message_size: 1024 * 1024,
            read_chunk_size: 64 * 1024,
        }
    }
}

pub struct TcpIngress {
    config: TcpIngressConfig,
    cancel: CancellationToken,
}

impl TcpIngress {
    pub fn new(config: TcpIngressConfig, cancel: CancellationToken) -> Self {
        Self { config, cancel }
    }

    pub async fn run(self, tx: tokio::sync::mpsc::Sender<IngressMessage>) -> std::io::Result<()> {
        self.run_with_ready(tx, None).await
    }

    /// Like [`TcpIngress::run`], but signals the bound local address on
    /// `ready` once the listener is bound — used by tests that bind to an
    /// ephemeral port and need to learn it before connecting.
    pub async fn run_with_ready(
        self,
        tx: tokio::sync::mpsc::Sender<IngressMessage>,
        ready: Option<tokio::sync::oneshot::Sender<std::net::SocketAddr>>,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        let active = Arc::new(AtomicI64::new(0));

        if let Some(ready) = ready {
            let _ = ready.send(listener.local_addr()?);
        }

        tracing::info!(input = %self.config.name, addr = %self.config.bind_addr, "tcp ingress listening");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!(input = %self.config.name, "tcp ingress shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(v) => v,
                        Err(e) => {
                            tracing::warn!(input = %self.config.name, error = %e, "tcp accept error");
                            continue;
                        }
                    };

                    let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else {
                        tracing::warn!(input = %self.config.name, "max_connections reached, dropping connection");
                        drop(stream);
                        continue;
                    };

                    let input_name = self.config.name.clone();
                    let max_message_size = self.config.max_message_size;
                    let read_chunk_size = self.config.read_chunk_size;
                    let conn_cancel = self.cancel.child_token();
                    let tx = tx.clone();
                    let active = Arc::clone(&active);

                    active.fetch_add(1, Ordering::Relaxed);
                    gauge!(sluice_core::metrics::ACTIVE_CONNECTIONS, LABEL_INPUT => input_name.clone())
                        .set(active.load(Ordering::Relaxed) as f64);

                    tokio::spawn(async move {
                        let _permit = permit;
                        tracing::debug!(input = %input_name, peer = %peer, "tcp connection accepted");
                        handle_connection(
                            stream,
                            &input_name,
                            max_message_size,
                            read_chunk_size,
                            conn_cancel,
                            tx,
                        )
                        .await;

                        let remaining = active.fetch_sub(1, Ordering::Relaxed) - 1;
                        gauge!(sluice_core::metrics::ACTIVE_CONNECTIONS, LABEL_INPUT => input_name.clone())
                            .set(remaining as f64);
                    });
                }
            }
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    input_name: &str,
    max_message_size: usize,
    read_chunk_size: usize,
    cancel: CancellationToken,
    tx: tokio::sync::mpsc::Sender<IngressMessage>,
) {
    let mut buf: Vec<u8> = Vec::with_capacity(read_chunk_size);
    let mut chunk = vec![0u8; read_chunk_size];

    loop {
        match extract_frame(&buf, max_message_size) {
            Ok(Some(frame)) => {
                let consumed = frame.consumed;
                let message = frame.message.to_vec();
                buf.drain(..consumed);
                dispatch_message(&message, input_name, &tx).await;
                continue;
            }
            Ok(None) => {}
            Err(e) => {
                log_framing_error(input_name, e);
                return;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                return;
            }
            read = stream.read(&mut chunk) => {
                match read {
                    Ok(0) => return, // remote closed
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    Err(e) => {
                        tracing::debug!(input = %input_name, error = %e, "tcp read error");
                        return;
                    }
                }
            }
        }
    }
}

fn log_framing_error(input_name: &str, e: FramingError) {
    let reason = match e {
        FramingError::OverlongDigitRun => "overlong_digit_run",
        FramingError::MessageTooLarge => "message_too_large",
    };
    tracing::warn!(input = %input_name, reason, "tcp framing error, closing connection");
}

async fn dispatch_message(message: &[u8], input_name: &str, tx: &tokio::sync::mpsc::Sender<IngressMessage>) {
    match parser::parse(message) {
        Ok(record) => {
            counter!(
                sluice_core::metrics::MESSAGES_RECEIVED_TOTAL,
                LABEL_PROTOCOL => "tcp",
                LABEL_FACILITY => record.facility.to_string(),
                LABEL_SEVERITY => record.severity.to_string(),
            )
            .increment(1);

            if tx
                .send(IngressMessage {
                    input_name: input_name.to_owned(),
                    record,
                })
                .await
                .is_err()
            {
                tracing::warn!(input = %input_name, "pipeline channel closed, dropping message");
            }
        }
        Err(e) => {
            counter!(
                sluice_core::metrics::MESSAGES_PARSE_ERRORS_TOTAL,
                LABEL_PROTOCOL => "tcp",
            )
            .increment(1);
            counter!(
                sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
                LABEL_REASON => "parse_error",
            )
            .increment(1);
            tracing::debug!(input = %input_name, reason = e.reason(), error = %e, "tcp parse error");
        }
    }
}
