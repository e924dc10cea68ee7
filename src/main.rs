//! dnsbench - DNS resolver benchmark
//!
//! Measures query latency across public resolvers, ranks them, then times
//! HTTP requests to the same domains for the fastest resolvers.

mod collector;
mod config;
mod model;
mod probe;
mod report;
mod scheduler;
mod stats;

use config::{BenchConfig, OutputFormat};
use model::{Sample, ServerIdentity};
use probe::{ReqwestProber, UdpResolver};
use report::{LiveLog, RunReport};
use scheduler::{DnsScheduler, HttpScheduler, SampleSink};

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Live sample log on stdout, muted when stdout carries JSON.
fn live_sink(enabled: bool) -> impl SampleSink {
    let mut log = LiveLog::stdout();
    move |sample: &Sample| {
        if enabled {
            log.record(sample);
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("dnsbench=info".parse()?))
        .init();

    // Load configuration
    let cfg = BenchConfig::load()?;
    tracing::info!(
        "Benchmarking {} DNS servers against {} domains, {} queries per domain",
        cfg.servers.len(),
        cfg.domains.len(),
        cfg.queries_per_domain
    );
    for server in &cfg.servers {
        tracing::info!("  {}", server);
    }
    let live = cfg.format == OutputFormat::Text;

    // DNS phase
    let dns = DnsScheduler::new(Arc::new(UdpResolver::new()), cfg.dns_timeout);
    let dns_samples = dns
        .run(&cfg.servers, &cfg.domains, cfg.queries_per_domain, live_sink(live))
        .await?;

    let per_server = stats::reduce_per_server(&dns_samples);
    let per_domain = stats::reduce_per_domain(&dns_samples);
    let top = stats::select_top(&per_server, &cfg.servers, cfg.top_n);
    for (i, ranked) in top.iter().enumerate() {
        tracing::info!(
            "#{} {} - avg {:.2} ms",
            i + 1,
            ranked.identity,
            ranked.mean.as_secs_f64() * 1000.0
        );
    }

    // HTTP phase
    let prober = ReqwestProber::new(cfg.http_timeout)?;
    let http = HttpScheduler::new(Arc::new(prober), cfg.http_timeout)
        .with_retry_delay(cfg.retry_delay)
        .with_scheme(cfg.scheme.clone())
        .with_parallel(cfg.http_parallel);
    let identities: Vec<ServerIdentity> = top.iter().map(|r| r.identity.clone()).collect();
    let http_samples = http.run(&identities, &cfg.domains, live_sink(live)).await;

    let report = RunReport {
        servers: per_server,
        domains: per_domain,
        top,
        http: stats::group_by_identity(http_samples),
    };

    match cfg.format {
        OutputFormat::Text => print!("{}", report::render_text(&report)),
        OutputFormat::Json => println!("{}", report::render_json(&report)?),
    }

    tracing::info!("Benchmark completed");
    Ok(())
}
