//! TCP sender: `disconnected` / `backoff` / `connected` state machine with
//! per-message retry and exponential backoff (C7).

use metrics::{counter, gauge};
use sluice_core::metrics::{LABEL_DESTINATION, LABEL_REASON};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::{RetryPolicy, escape_newlines_for_framing};

#[derive(Debug, Clone)]
pub struct TcpEgressConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Disconnected,
    Connected,
}

/// Owns one TCP destination's socket exclusively — no cross-context writes
/// to a single connection. Messages offered to [`TcpEgress::send`] for a
/// single (ingress → destination) path are sent in the order they are
/// offered.
pub struct TcpEgress {
    config: TcpEgressConfig,
    state: State,
    stream: Option<TcpStream>,
}

impl TcpEgress {
    pub fn new(config: TcpEgressConfig) -> Self {
        Self {
            config,
            state: State::Disconnected,
            stream: None,
        }
    }

    fn set_connected(&mut self, connected: bool) {
        gauge!(sluice_core::metrics::DESTINATION_UP, LABEL_DESTINATION => self.config.name.clone())
            .set(if connected { 1.0 } else { 0.0 });
    }

    async fn ensure_connected(&mut self) -> bool {
        if self.state == State::Connected && self.stream.is_some() {
            return true;
        }

        match tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect((self.config.host.as_str(), self.config.port)),
        )
        .await
        {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                self.state = State::Connected;
                self.set_connected(true);
                true
            }
            Ok(Err(e)) => {
                tracing::debug!(destination = %self.config.name, error = %e, "tcp connect failed");
                self.state = State::Disconnected;
                self.set_connected(false);
                false
            }
            Err(_) => {
                tracing::debug!(destination = %self.config.name, "tcp connect timed out");
                self.state = State::Disconnected;
                self.set_connected(false);
                false
            }
        }
    }

    /// Sends one message, retrying up to `max_attempts` with exponential
    /// backoff between tries. Returns `true` if the message was written,
    /// `false` if every attempt failed (caller drops it with
    /// `reason=send_failed`). Backoff waits are cancellation-aware: a
    /// sender waiting in backoff wakes immediately on shutdown and gives
    /// up the retry loop.
    pub async fn send(&mut self, body: &[u8], cancel: &CancellationToken) -> bool {
        self.send_with_attempts(body, cancel, self.config.retry.max_attempts)
            .await
    }

    /// Like [`TcpEgress::send`] but with an explicit attempt cap, used
    /// during pipeline drain to honor "no new retries" for in-flight
    /// records (spec §4.7) without abandoning the configured policy for
    /// ordinary sends.
    pub async fn send_with_attempts(
        &mut self,
        body: &[u8],
        cancel: &CancellationToken,
        max_attempts: u32,
    ) -> bool {
        let mut framed = escape_newlines_for_framing(body);
        framed.push(b'\n');
        let max_attempts = max_attempts.max(1);

        for attempt in 1..=max_attempts {
            if !self.ensure_connected().await {
                if attempt < max_attempts {
                    if !self.wait_backoff(attempt, cancel).await {
                        return false;
                    }
                }
                continue;
            }

            let stream = self.stream.as_mut().expect("connected implies stream");
            match stream.write_all(&framed).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::debug!(destination = %self.config.name, error = %e, "tcp write failed");
                    self.stream = None;
                    self.state = State::Disconnected;
                    self.set_connected(false);
                    if attempt < max_attempts {
                        if !self.wait_backoff(attempt, cancel).await {
                            return false;
                        }
                    }
                }
            }
        }

        counter!(
            sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
            LABEL_REASON => "send_failed",
        )
        .increment(1);
        false
    }

    /// Waits the backoff interval for `attempt`, returning `false`
    /// immediately if `cancel` fires first (a cancelled sender must not
    /// keep retrying).
    async fn wait_backoff(&self, attempt: u32, cancel: &CancellationToken) -> bool {
        let wait = self.config.retry.backoff_for_attempt(attempt);
        tokio::select! {
            _ = tokio::time::sleep(wait) => true,
            _ = cancel.cancelled() => false,
        }
    }

    /// Half-closes the write side and drops the socket, for graceful
    /// shutdown.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.state = State::Disconnected;
        self.set_connected(false);
    }
}
