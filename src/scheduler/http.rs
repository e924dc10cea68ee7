//! HTTP phase: timing probes for each selected resolver identity and domain.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;

use super::{finish_log_writer, spawn_log_writer, SampleSink};
use crate::collector::SampleCollector;
use crate::model::{Outcome, ProbeKind, ProbeTask, Sample, ServerIdentity};
use crate::probe::{probe_url, HttpProber};

/// One initial request plus one retry.
const HTTP_ATTEMPTS: u32 = 2;

/// Issues HTTP probes for the identities chosen by the DNS phase.
///
/// The scheduler owns its prober; `run` consumes the scheduler so the
/// prober (and its idle connection pool) is released when the phase ends.
pub struct HttpScheduler {
    prober: Arc<dyn HttpProber>,
    timeout: Duration,
    retry_delay: Duration,
    scheme: String,
    parallel: bool,
}

/// Per-phase settings shared by every probe.
#[derive(Clone)]
struct HttpSettings {
    timeout: Duration,
    retry_delay: Duration,
    scheme: String,
}

impl HttpScheduler {
    pub fn new(prober: Arc<dyn HttpProber>, timeout: Duration) -> Self {
        Self {
            prober,
            timeout,
            retry_delay: Duration::from_millis(500),
            scheme: "https".to_string(),
            parallel: false,
        }
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Probe identities concurrently. Domains within an identity stay sequential.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Probe every domain through every identity, one sample per pair.
    pub async fn run<S: SampleSink>(
        self,
        identities: &[ServerIdentity],
        domains: &[String],
        sink: S,
    ) -> Vec<Sample> {
        let expected = identities.len() * domains.len();
        if expected == 0 {
            tracing::warn!("HTTP phase skipped: no identities or domains to probe");
            return Vec::new();
        }

        tracing::info!(
            "Testing HTTP response times: {} domains via {} resolvers",
            domains.len(),
            identities.len()
        );

        let settings = HttpSettings {
            timeout: self.timeout,
            retry_delay: self.retry_delay,
            scheme: self.scheme,
        };
        let collector = SampleCollector::with_capacity(expected);
        let (log_tx, log_writer) = spawn_log_writer(expected, sink);

        if self.parallel {
            let mut workers = JoinSet::new();
            for identity in identities {
                let prober = self.prober.clone();
                let identity = identity.clone();
                let domains = domains.to_vec();
                let settings = settings.clone();
                let collector = collector.clone();
                let log_tx = log_tx.clone();

                workers.spawn(async move {
                    probe_identity(
                        prober.as_ref(),
                        &identity,
                        &domains,
                        &settings,
                        &collector,
                        &log_tx,
                    )
                    .await;
                });
            }
            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("HTTP probe task failed: {}", e);
                }
            }
        } else {
            for identity in identities {
                probe_identity(
                    self.prober.as_ref(),
                    identity,
                    domains,
                    &settings,
                    &collector,
                    &log_tx,
                )
                .await;
            }
        }

        finish_log_writer(log_tx, log_writer).await;

        drop(self.prober);
        tracing::debug!("HTTP phase finished, connection pool released");

        collector.drain()
    }
}

async fn probe_identity(
    prober: &dyn HttpProber,
    identity: &ServerIdentity,
    domains: &[String],
    settings: &HttpSettings,
    collector: &SampleCollector,
    log_tx: &mpsc::Sender<Sample>,
) {
    tracing::info!("Testing with DNS {}", identity);

    for domain in domains {
        let task = ProbeTask {
            server_name: identity.name().to_string(),
            address: identity.primary().to_string(),
            domain: domain.clone(),
            attempt: 0,
            kind: ProbeKind::Http,
        };
        let url = probe_url(&settings.scheme, domain);

        let sample = probe_http(prober, task, &url, settings.timeout, settings.retry_delay).await;
        collector.append(sample.clone());
        if log_tx.send(sample).await.is_err() {
            tracing::error!("Failed to log HTTP result for {}", url);
        }
    }
}

/// Time a request to `url`, retrying once after `retry_delay` on failure.
///
/// Always yields exactly one sample. Latency is that of the last attempt.
pub async fn probe_http(
    prober: &dyn HttpProber,
    mut task: ProbeTask,
    url: &str,
    timeout: Duration,
    retry_delay: Duration,
) -> Sample {
    let started_at = Utc::now();
    let mut elapsed = Duration::ZERO;
    let mut last_error = None;

    for attempt in 0..HTTP_ATTEMPTS {
        task.attempt = attempt;
        let start = Instant::now();
        let result = prober.head(url, timeout).await;
        elapsed = start.elapsed();

        match result {
            Ok(status) => {
                let mut sample =
                    Sample::for_task(&task, elapsed, Outcome::Success).with_status(status);
                sample.timestamp = started_at;
                return sample;
            }
            Err(e) => {
                if attempt + 1 < HTTP_ATTEMPTS {
                    tracing::debug!(
                        "HTTP attempt {} for {} failed, retrying: {}",
                        attempt + 1,
                        url,
                        e
                    );
                    tokio::time::sleep(retry_delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    let error = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "request failed".to_string());
    let mut sample = Sample::for_task(&task, elapsed, Outcome::Failure)
        .with_status(0)
        .with_error(error);
    sample.timestamp = started_at;
    sample
}
