//! Console and JSON rendering of benchmark results.

use serde::Serialize;
use std::fmt::Write as _;
use std::io::{self, Write};
use std::time::Duration;

use crate::model::{AggregateStat, Outcome, ProbeKind, RankedIdentity, Sample, SampleGroup};

/// Everything a finished run produced.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub servers: Vec<AggregateStat>,
    pub domains: Vec<AggregateStat>,
    pub top: Vec<RankedIdentity>,
    pub http: Vec<SampleGroup>,
}

/// Sample sink writing one line per sample.
pub struct LiveLog<W: Write + Send + 'static> {
    out: W,
}

impl LiveLog<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write + Send + 'static> LiveLog<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send + 'static> crate::scheduler::SampleSink for LiveLog<W> {
    fn record(&mut self, sample: &Sample) {
        // Write errors are ignored; the sample is still collected.
        let _ = writeln!(self.out, "{}", format_sample_line(sample));
    }
}

fn ms(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1_000_000.0
}

fn symbol(sample: &Sample) -> &'static str {
    match (sample.kind, sample.outcome) {
        (_, Outcome::Success) if sample.status_code.map_or(true, |c| c == 200) => "+",
        (ProbeKind::Http, Outcome::Success) => "!",
        (_, Outcome::Timeout) => "T",
        _ => "x",
    }
}

/// Render one live log line.
pub fn format_sample_line(sample: &Sample) -> String {
    let time = sample.timestamp.format("%H:%M:%S%.3f");
    let mut line = match sample.kind {
        ProbeKind::Dns => format!(
            "[{}] {} {:<25} | {:<18} | {:8.2} ms",
            time,
            symbol(sample),
            sample.server_address,
            sample.domain,
            ms(sample.latency)
        ),
        ProbeKind::Http => format!(
            "    [{}] {} {:<25} | {:3} | {:6.0} ms",
            time,
            symbol(sample),
            sample.domain,
            sample.status_code.unwrap_or(0),
            ms(sample.latency)
        ),
    };

    if !sample.is_success() {
        match (sample.kind, &sample.error) {
            (ProbeKind::Http, Some(err)) => {
                let _ = write!(line, " | [ERROR: {}]", err);
            }
            _ => {
                let _ = write!(line, " | [{}]", sample.outcome);
            }
        }
    }
    line
}

fn fmt_opt(d: Option<Duration>) -> String {
    format!("{:8.2} ms", d.map(ms).unwrap_or(0.0))
}

/// Render the full text report.
pub fn render_text(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nServer statistics (sorted by average RTT):\n");
    let _ = writeln!(
        out,
        "{:<40} | {:<11} | {:<11} | {:<11} | {:<11} | {}",
        "Server", "Min RTT", "Avg RTT", "P95 RTT", "Max RTT", "Success Rate"
    );
    for stat in &report.servers {
        let _ = writeln!(
            out,
            "{:<40} | {} | {} | {} | {} | {:6.1}%",
            stat.key.to_string(),
            fmt_opt(stat.min),
            fmt_opt(stat.mean),
            fmt_opt(stat.p95),
            fmt_opt(stat.max),
            stat.success_rate() * 100.0
        );
    }

    let _ = writeln!(out, "\nPer-domain statistics (sorted by average RTT):\n");
    let _ = writeln!(out, "{:<25} | {:<11} | {}", "Domain", "Avg RTT", "Success Rate");
    for stat in &report.domains {
        let _ = writeln!(
            out,
            "{:<25} | {:8.2} ms | {:6.1}%",
            stat.key.to_string(),
            ms(stat.mean_or_zero()),
            stat.success_rate() * 100.0
        );
    }

    let _ = writeln!(out, "\nTop {} fastest DNS servers:", report.top.len());
    for (i, ranked) in report.top.iter().enumerate() {
        let _ = writeln!(
            out,
            "    {}. {} - avg: {:.2} ms",
            i + 1,
            ranked.identity,
            ms(ranked.mean)
        );
    }

    if !report.http.is_empty() {
        let _ = writeln!(out, "\nOverall load time summary (grouped by DNS server):");
    }
    for (i, group) in report.http.iter().enumerate() {
        let _ = writeln!(
            out,
            "\nDNS server #{}: {} (avg {:.0} ms)",
            i + 1,
            group.name,
            ms(group.mean)
        );
        let _ = writeln!(out, "{:<25} | {:<10} | {}", "Domain", "Status", "Response Time");
        for sample in &group.samples {
            let status = match (sample.outcome, sample.status_code) {
                (Outcome::Success, Some(code)) => format!("HTTP {}", code),
                _ => "ERROR".to_string(),
            };
            let _ = writeln!(
                out,
                "{:<25} | {:<10} | {:6.0} ms",
                sample.domain,
                status,
                ms(sample.latency)
            );
        }
    }

    out
}

/// Render the report as pretty-printed JSON.
pub fn render_json(report: &RunReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProbeTask, ServerIdentity};
    use crate::scheduler::SampleSink;
    use crate::stats::{group_by_identity, reduce_per_domain, reduce_per_server, select_top};

    fn sample(kind: ProbeKind, outcome: Outcome, ms: u64) -> Sample {
        let task = ProbeTask {
            server_name: "Cloudflare".to_string(),
            address: "1.1.1.1:53".to_string(),
            domain: "github.com".to_string(),
            attempt: 0,
            kind,
        };
        Sample::for_task(&task, Duration::from_millis(ms), outcome)
    }

    fn report() -> RunReport {
        let dns = vec![
            sample(ProbeKind::Dns, Outcome::Success, 12),
            sample(ProbeKind::Dns, Outcome::Timeout, 3000),
        ];
        let http = vec![
            sample(ProbeKind::Http, Outcome::Success, 250).with_status(200),
            sample(ProbeKind::Http, Outcome::Failure, 900)
                .with_status(0)
                .with_error("network error: reset"),
        ];
        let servers = reduce_per_server(&dns);
        RunReport {
            domains: reduce_per_domain(&dns),
            top: select_top(&servers, &[], 3),
            servers,
            http: group_by_identity(http),
        }
    }

    #[test]
    fn test_dns_line_marks_timeout() {
        let line = format_sample_line(&sample(ProbeKind::Dns, Outcome::Timeout, 3000));
        assert!(line.contains("1.1.1.1:53"));
        assert!(line.contains("github.com"));
        assert!(line.contains("3000.00 ms"));
        assert!(line.ends_with("[TIMEOUT]"));
    }

    #[test]
    fn test_http_line_shows_error() {
        let s = sample(ProbeKind::Http, Outcome::Failure, 40)
            .with_status(0)
            .with_error("network error: refused");
        let line = format_sample_line(&s);
        assert!(line.contains("[ERROR: network error: refused]"));
    }

    #[test]
    fn test_live_log_writes_lines() {
        let mut log = LiveLog::new(Vec::new());
        log.record(&sample(ProbeKind::Dns, Outcome::Success, 5));
        log.record(&sample(ProbeKind::Dns, Outcome::NoData, 6));
        let text = String::from_utf8(log.out).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().nth(1).unwrap().ends_with("[NO_DATA]"));
    }

    #[test]
    fn test_text_report_sections() {
        let text = render_text(&report());
        assert!(text.contains("Cloudflare (1.1.1.1:53)"));
        assert!(text.contains("50.0%"));
        assert!(text.contains("Top 1 fastest DNS servers"));
        assert!(text.contains("HTTP 200"));
        assert!(text.contains("ERROR"));
    }

    #[test]
    fn test_json_report() {
        let json = render_json(&report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["servers"][0]["mean_ms"], 12.0);
        assert_eq!(value["servers"][0]["successes"], 1);
        assert_eq!(value["domains"][0]["key"]["domain"], "github.com");
        assert_eq!(value["top"][0]["identity"]["name"], "Cloudflare");
        assert_eq!(value["http"][0]["samples"][1]["status_code"], 0);

        let empty = ServerIdentity::new("x", ["y"]).unwrap();
        assert_eq!(serde_json::to_value(&empty).unwrap()["addresses"][0], "y");
    }
}
