//! DNS phase: one concurrent probe per (server, domain, repetition, address).

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::{finish_log_writer, spawn_log_writer, SampleSink};
use crate::collector::SampleCollector;
use crate::config::{validate_matrix, ConfigError};
use crate::model::{Outcome, ProbeKind, ProbeTask, Sample, ServerIdentity};
use crate::probe::{DnsReply, DnsResolver, ProbeError};

/// Fans DNS probes out over the full benchmark matrix.
pub struct DnsScheduler {
    resolver: Arc<dyn DnsResolver>,
    timeout: Duration,
}

impl DnsScheduler {
    pub fn new(resolver: Arc<dyn DnsResolver>, timeout: Duration) -> Self {
        Self { resolver, timeout }
    }

    /// Number of samples a complete run produces.
    pub fn expected_samples(
        servers: &[ServerIdentity],
        domains: &[String],
        repetitions: u32,
    ) -> usize {
        let addresses: usize = servers.iter().map(|s| s.addresses().len()).sum();
        addresses * domains.len() * repetitions as usize
    }

    /// Expand the matrix into independent probe tasks.
    pub fn expand_tasks(
        servers: &[ServerIdentity],
        domains: &[String],
        repetitions: u32,
    ) -> Vec<ProbeTask> {
        let mut tasks = Vec::with_capacity(Self::expected_samples(servers, domains, repetitions));

        for server in servers {
            for domain in domains {
                for attempt in 0..repetitions {
                    for address in server.addresses() {
                        tasks.push(ProbeTask {
                            server_name: server.name().to_string(),
                            address: address.clone(),
                            domain: domain.clone(),
                            attempt,
                            kind: ProbeKind::Dns,
                        });
                    }
                }
            }
        }

        tasks
    }

    /// Run every probe concurrently and return all samples once they have finished.
    ///
    /// Each sample is also passed to `sink` from a single writer task.
    pub async fn run<S: SampleSink>(
        &self,
        servers: &[ServerIdentity],
        domains: &[String],
        repetitions: u32,
        sink: S,
    ) -> Result<Vec<Sample>, ConfigError> {
        validate_matrix(servers, domains, repetitions)?;

        let tasks = Self::expand_tasks(servers, domains, repetitions);
        let expected = tasks.len();
        tracing::info!(
            "Starting DNS benchmark: {} queries across {} servers and {} domains",
            expected,
            servers.len(),
            domains.len()
        );

        let collector = SampleCollector::with_capacity(expected);
        let (log_tx, log_writer) = spawn_log_writer(expected, sink);
        let mut workers = JoinSet::new();

        for task in tasks {
            let resolver = self.resolver.clone();
            let collector = collector.clone();
            let log_tx = log_tx.clone();
            let timeout = self.timeout;

            workers.spawn(async move {
                let sample = probe_dns(resolver.as_ref(), &task, timeout).await;
                collector.append(sample.clone());
                if log_tx.send(sample).await.is_err() {
                    tracing::error!("Failed to log result for {} / {}", task.address, task.domain);
                }
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!("DNS probe task failed: {}", e);
            }
        }

        // No workers remain, so this is the last sender.
        finish_log_writer(log_tx, log_writer).await;

        let samples = collector.snapshot();
        if samples.len() != expected {
            tracing::error!(
                "DNS benchmark collected {} samples, expected {}",
                samples.len(),
                expected
            );
        }
        tracing::info!("All {} DNS queries completed", samples.len());

        Ok(samples)
    }
}

/// Time one query and classify its result.
pub async fn probe_dns(resolver: &dyn DnsResolver, task: &ProbeTask, timeout: Duration) -> Sample {
    let started_at = Utc::now();
    let start = Instant::now();
    let result = resolver.resolve_a(&task.address, &task.domain, timeout).await;
    let rtt = start.elapsed();

    let mut sample = classify_dns(task, rtt, result);
    sample.timestamp = started_at;
    sample
}

/// Map a resolver result onto a sample outcome.
pub fn classify_dns(
    task: &ProbeTask,
    rtt: Duration,
    result: Result<Option<DnsReply>, ProbeError>,
) -> Sample {
    match result {
        Err(ProbeError::Config(msg)) => {
            Sample::for_task(task, rtt, Outcome::Failure).with_error(msg)
        }
        Err(e) => {
            tracing::debug!(
                "DNS query #{} to {} for {} failed: {}",
                task.attempt,
                task.address,
                task.domain,
                e
            );
            Sample::for_task(task, rtt, Outcome::Timeout).with_error("DNS query timeout")
        }
        Ok(None) => Sample::for_task(task, rtt, Outcome::Failure).with_error("no response"),
        Ok(Some(reply)) if !reply.is_success() => Sample::for_task(task, rtt, Outcome::Failure)
            .with_error(format!("rcode: {}", reply.rcode)),
        Ok(Some(reply)) if reply.answer_count == 0 => {
            Sample::for_task(task, rtt, Outcome::NoData).with_error("no answer records")
        }
        Ok(Some(_)) => Sample::for_task(task, rtt, Outcome::Success),
    }
}
