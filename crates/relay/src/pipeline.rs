//! Pipeline supervisor (C8): wires inputs → router → transforms → outputs
//! and owns the process lifecycle, including graceful shutdown (§4.7).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use sluice_core::metrics::{LABEL_DESTINATION, LABEL_FILTER, LABEL_REASON};
use sluice_core::record::Record;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::{BuiltPipeline, CompiledDestination};
use crate::egress::{Protocol, TcpEgress, TcpEgressConfig, UdpEgress, UdpEgressConfig, serialize_for_send};
use crate::ingress::{IngressMessage, TcpIngress, TcpIngressConfig, UdpIngress, UdpIngressConfig};
use crate::observation::ObservationServer;
use crate::router::Outcome;
use crate::transform::apply_all;

/// How long a context is given to return once shutdown begins, before the
/// process exits regardless (§5).
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const INGRESS_CHANNEL_CAPACITY: usize = 4096;
const EGRESS_CHANNEL_CAPACITY: usize = 1024;

struct DestinationJob {
    record: Record,
    transformed: bool,
}

/// A running pipeline: the router/transform task and every ingress/egress
/// task it has spawned. Dropping this without calling [`Pipeline::shutdown`]
/// leaves the tasks running detached; callers should always shut down.
pub struct Pipeline {
    cancel: CancellationToken,
    draining: Arc<AtomicBool>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    observation: Option<ObservationServer>,
}

impl Pipeline {
    /// Starts every listener, sender, the central routing task, and (if
    /// configured) the observation endpoint, from a compiled configuration.
    /// Construction (config validation) must have already happened via
    /// [`crate::config::PipelineConfig::build`]; this only starts I/O.
    ///
    /// A bind failure on the observation endpoint is non-fatal when
    /// `service.observation_required` is `false`; otherwise it fails
    /// startup entirely (§7).
    pub async fn start(built: BuiltPipeline) -> std::io::Result<Self> {
        let cancel = CancellationToken::new();
        let draining = Arc::new(AtomicBool::new(false));
        let mut tasks = Vec::new();

        let observation = match &built.service.observation_addr {
            Some(addr) => match ObservationServer::start(addr).await {
                Ok(server) => Some(server),
                Err(e) if built.service.observation_required => {
                    return Err(std::io::Error::other(e));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "observation endpoint failed to start, continuing without it");
                    None
                }
            },
            None => None,
        };

        let (ingress_tx, ingress_rx) = mpsc::channel(INGRESS_CHANNEL_CAPACITY);

        for input in &built.inputs {
            let cancel = cancel.child_token();
            let tx = ingress_tx.clone();
            match input.protocol {
                crate::config::ProtocolConfig::Udp => {
                    let ingress = UdpIngress::new(
                        UdpIngressConfig {
                            name: input.name.clone(),
                            bind_addr: input.bind_addr.clone(),
                        },
                        cancel,
                    );
                    tasks.push(tokio::spawn(async move {
                        if let Err(e) = ingress.run(tx).await {
                            tracing::error!(error = %e, "udp ingress terminated with error");
                        }
                    }));
                }
                crate::config::ProtocolConfig::Tcp => {
                    let ingress = TcpIngress::new(
                        TcpIngressConfig {
                            name: input.name.clone(),
                            bind_addr: input.bind_addr.clone(),
                            max_connections: input.max_connections,
                            max_message_size: input.max_message_size,
                            ..Default::default()
                        },
                        cancel,
                    );
                    tasks.push(tokio::spawn(async move {
                        if let Err(e) = ingress.run(tx).await {
                            tracing::error!(error = %e, "tcp ingress terminated with error");
                        }
                    }));
                }
            }
        }
        drop(ingress_tx);

        let mut egress_senders = HashMap::new();
        for dest in &built.destinations {
            let (tx, rx) = mpsc::channel::<DestinationJob>(EGRESS_CHANNEL_CAPACITY);
            egress_senders.insert(dest.name.clone(), tx);
            let dest = dest.clone();
            let cancel = cancel.child_token();
            let draining = Arc::clone(&draining);
            tasks.push(tokio::spawn(run_egress(dest, rx, cancel, draining)));
        }

        let router_task = tokio::spawn(run_router(
            ingress_rx,
            built.router,
            built.transforms,
            egress_senders,
        ));
        tasks.push(router_task);

        Ok(Self {
            cancel,
            draining,
            tasks,
            observation,
        })
    }

    /// Runs the four-step graceful shutdown from §4.7: stop accepting new
    /// work, let in-flight records drain with no new retries, close
    /// egress connections and listener sockets, then stop the observation
    /// endpoint — all bounded by [`SHUTDOWN_GRACE`].
    pub async fn shutdown(self) {
        tracing::info!("pipeline shutdown: stopping new connections and datagrams");
        self.cancel.cancel();
        self.draining.store(true, Ordering::SeqCst);

        let joined = tokio::time::timeout(SHUTDOWN_GRACE, join_all_tasks(self.tasks)).await;

        if joined.is_err() {
            tracing::warn!("pipeline shutdown exceeded grace period, exiting anyway");
        } else {
            tracing::info!("pipeline shutdown complete");
        }

        if let Some(observation) = self.observation {
            observation.shutdown().await;
        }
    }
}

async fn join_all_tasks(tasks: Vec<tokio::task::JoinHandle<()>>) {
    for task in tasks {
        let _ = task.await;
    }
}

async fn run_router(
    mut ingress_rx: mpsc::Receiver<IngressMessage>,
    router: crate::router::Router,
    transforms: HashMap<String, crate::transform::Transform>,
    egress_senders: HashMap<String, mpsc::Sender<DestinationJob>>,
) {
    while let Some(IngressMessage { record, .. }) = ingress_rx.recv().await {
        let start = Instant::now();
        let outcome = router.route(&record);
        let filter_label = match &outcome {
            Outcome::Forward { rule, .. } => rule.clone(),
            Outcome::DroppedByFilter { rule } => rule.clone(),
            Outcome::DroppedNoMatch => "none".to_owned(),
        };
        histogram!(
            sluice_core::metrics::PROCESSING_LATENCY_SECONDS,
            LABEL_FILTER => filter_label,
        )
        .record(start.elapsed().as_secs_f64());

        match outcome {
            Outcome::DroppedNoMatch => {
                counter!(
                    sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
                    LABEL_REASON => "no_match",
                )
                .increment(1);
            }
            Outcome::DroppedByFilter { .. } => {
                counter!(
                    sluice_core::metrics::MESSAGES_DROPPED_TOTAL,
                    LABEL_REASON => "filter",
                )
                .increment(1);
            }
            Outcome::Forward {
                destinations,
                transforms: transform_names,
                ..
            } => {
                let mut record = record;
                let resolved: Vec<&crate::transform::Transform> = transform_names
                    .iter()
                    .filter_map(|name| transforms.get(name))
                    .collect();
                apply_all(&resolved, &mut record);
                let transformed = !transform_names.is_empty();

                for dest_name in &destinations {
                    if let Some(tx) = egress_senders.get(dest_name) {
                        let job = DestinationJob {
                            record: record.clone(),
                            transformed,
                        };
                        if tx.send(job).await.is_err() {
                            tracing::warn!(destination = %dest_name, "egress channel closed, dropping record");
                        }
                    }
                }
            }
        }
    }
}

enum Sender {
    Udp(UdpEgress),
    Tcp(TcpEgress),
}

async fn run_egress(
    dest: CompiledDestination,
    mut rx: mpsc::Receiver<DestinationJob>,
    cancel: CancellationToken,
    draining: Arc<AtomicBool>,
) {
    let mut sender = match dest.protocol {
        Protocol::Udp => match UdpEgress::connect(UdpEgressConfig {
            name: dest.name.clone(),
            host: dest.host.clone(),
            port: dest.port,
        })
        .await
        {
            Ok(s) => Sender::Udp(s),
            Err(e) => {
                tracing::error!(destination = %dest.name, error = %e, "failed to bind udp egress socket");
                return;
            }
        },
        Protocol::Tcp => Sender::Tcp(TcpEgress::new(TcpEgressConfig {
            name: dest.name.clone(),
            host: dest.host.clone(),
            port: dest.port,
            retry: dest.retry.clone(),
            connect_timeout: Duration::from_secs(5),
        })),
    };

    while let Some(job) = rx.recv().await {
        let body = serialize_for_send(&job.record, dest.format, job.transformed);

        let ok = match &mut sender {
            Sender::Udp(udp) => udp.send(&body).await,
            Sender::Tcp(tcp) => {
                let max_attempts = if draining.load(Ordering::SeqCst) {
                    1
                } else {
                    dest.retry.max_attempts
                };
                tcp.send_with_attempts(&body, &cancel, max_attempts).await
            }
        };

        if ok {
            counter!(
                sluice_core::metrics::MESSAGES_FORWARDED_TOTAL,
                LABEL_DESTINATION => dest.name.clone(),
            )
            .increment(1);
        }
    }

    if let Sender::Tcp(tcp) = &mut sender {
        tcp.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FilterConfig, PipelineConfig, ServiceConfig};
    use crate::ingress::IngressMessage;
    use bytes::Bytes;
    use sluice_core::record::OriginFormat;
    use tokio::net::UdpSocket;

    fn sample_record() -> Record {
        Record {
            facility: 4,
            severity: 6,
            timestamp: None,
            hostname: "host1".into(),
            app_name: "sshd".into(),
            proc_id: "1".into(),
            msg_id: String::new(),
            structured_data: String::new(),
            message: "hello".into(),
            raw: Bytes::from_static(b"<38>hello"),
            origin_format: OriginFormat::Rfc3164,
        }
    }

    #[tokio::test]
    async fn router_task_forwards_a_matching_record_to_its_destination() {
        let listener = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest_port = listener.local_addr().unwrap().port();

        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![crate::config::DestinationConfig {
                name: "out".into(),
                protocol: crate::config::ProtocolConfig::Udp,
                host: "127.0.0.1".into(),
                port: dest_port,
                format: crate::config::FormatConfig::Auto,
                retry: crate::config::RetryConfig::default(),
            }],
            transforms: vec![],
            filters: vec![FilterConfig {
                name: "catch-all".into(),
                destinations: vec!["out".into()],
                ..Default::default()
            }],
            service: ServiceConfig::default(),
        };
        let built = config.build().unwrap();

        let (ingress_tx, ingress_rx) = mpsc::channel(8);
        let (egress_tx, mut egress_rx) = mpsc::channel(8);
        let mut senders = HashMap::new();
        senders.insert("out".to_owned(), egress_tx);

        tokio::spawn(run_router(ingress_rx, built.router, built.transforms, senders));

        ingress_tx
            .send(IngressMessage {
                input_name: "in".into(),
                record: sample_record(),
            })
            .await
            .unwrap();

        let job = egress_rx.recv().await.unwrap();
        assert_eq!(job.record.message, "hello");
        assert!(!job.transformed);
    }

    #[tokio::test]
    async fn shutdown_completes_within_grace_period_with_no_traffic() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![],
            transforms: vec![],
            filters: vec![],
            service: ServiceConfig {
                observation_addr: None,
                ..Default::default()
            },
        };
        let built = config.build().unwrap();
        let pipeline = Pipeline::start(built).await.unwrap();
        let start = Instant::now();
        pipeline.shutdown().await;
        assert!(start.elapsed() < SHUTDOWN_GRACE);
    }

    #[tokio::test]
    async fn observation_endpoint_starts_and_stops_with_the_pipeline() {
        let config = PipelineConfig {
            inputs: vec![],
            destinations: vec![],
            transforms: vec![],
            filters: vec![],
            service: ServiceConfig {
                observation_addr: Some("127.0.0.1:0".into()),
                observation_required: true,
            },
        };
        let built = config.build().unwrap();
        let pipeline = Pipeline::start(built).await.unwrap();
        let start = Instant::now();
        pipeline.shutdown().await;
        assert!(start.elapsed() < SHUTDOWN_GRACE);
    }
}
