//! Benchmark model types shared by the schedulers, reducers and reports.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::ConfigError;

/// A named resolver with one or more network addresses (primary, secondary, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerIdentity {
    name: String,
    addresses: Vec<String>,
}

impl ServerIdentity {
    /// Build an identity, dropping duplicate addresses while keeping first-seen order.
    pub fn new<I, S>(name: impl Into<String>, addresses: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyServerName);
        }

        let mut unique: Vec<String> = Vec::new();
        for addr in addresses {
            let addr = addr.into();
            if !unique.contains(&addr) {
                unique.push(addr);
            }
        }

        if unique.is_empty() {
            return Err(ConfigError::NoAddresses(name));
        }

        Ok(Self {
            name,
            addresses: unique,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    /// The address shown first in reports and recorded on HTTP samples.
    pub fn primary(&self) -> &str {
        // Constructor guarantees at least one address.
        &self.addresses[0]
    }
}

impl fmt::Display for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.addresses.join(" + "))
    }
}

/// Which capability a probe exercises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    Dns,
    Http,
}

/// One unit of scheduled work. Consumed by exactly one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTask {
    pub server_name: String,
    pub address: String,
    pub domain: String,
    pub attempt: u32,
    pub kind: ProbeKind,
}

/// Terminal state of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Outcome {
    Success,
    Timeout,
    Failure,
    NoData,
}

impl Outcome {
    pub fn is_success(self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "SUCCESS",
            Outcome::Timeout => "TIMEOUT",
            Outcome::Failure => "FAILURE",
            Outcome::NoData => "NO_DATA",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable record of one probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub kind: ProbeKind,
    pub server_name: String,
    pub server_address: String,
    pub domain: String,
    #[serde(rename = "latency_ms", serialize_with = "crate::model::serde_ms::serialize")]
    pub latency: Duration,
    pub outcome: Outcome,
    pub error: Option<String>,
    /// HTTP status code; `Some(0)` when every attempt failed, `None` for DNS.
    pub status_code: Option<u16>,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    /// Start a sample for `task`, stamped with the current time.
    pub fn for_task(task: &ProbeTask, latency: Duration, outcome: Outcome) -> Self {
        Self {
            kind: task.kind,
            server_name: task.server_name.clone(),
            server_address: task.address.clone(),
            domain: task.domain.clone(),
            latency,
            outcome,
            error: None,
            status_code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = Some(status_code);
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// What an [`AggregateStat`] was grouped by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(tag = "by", rename_all = "lowercase")]
pub enum StatKey {
    Server { name: String, address: String },
    Domain { domain: String },
}

impl fmt::Display for StatKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatKey::Server { name, address } => write!(f, "{} ({})", name, address),
            StatKey::Domain { domain } => f.write_str(domain),
        }
    }
}

/// Statistics over a group of samples.
///
/// Latency fields are `None` when the group has no successful sample; they
/// are never filled with a placeholder value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateStat {
    pub key: StatKey,
    #[serde(rename = "min_ms", serialize_with = "crate::model::serde_ms::serialize_opt")]
    pub min: Option<Duration>,
    #[serde(rename = "max_ms", serialize_with = "crate::model::serde_ms::serialize_opt")]
    pub max: Option<Duration>,
    #[serde(rename = "mean_ms", serialize_with = "crate::model::serde_ms::serialize_opt")]
    pub mean: Option<Duration>,
    #[serde(rename = "p50_ms", serialize_with = "crate::model::serde_ms::serialize_opt")]
    pub p50: Option<Duration>,
    #[serde(rename = "p95_ms", serialize_with = "crate::model::serde_ms::serialize_opt")]
    pub p95: Option<Duration>,
    pub total: usize,
    pub successes: usize,
    /// Sum of successful latencies, kept so groups can be merged exactly.
    #[serde(skip)]
    pub success_sum: Duration,
}

impl AggregateStat {
    /// Fraction of samples that succeeded, in `0.0..=1.0`.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.successes as f64 / self.total as f64
    }

    /// Mean latency for display; zero when there were no successes.
    pub fn mean_or_zero(&self) -> Duration {
        self.mean.unwrap_or_default()
    }
}

/// A server identity chosen for the HTTP phase, with its combined DNS mean.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedIdentity {
    pub identity: ServerIdentity,
    #[serde(rename = "mean_ms", serialize_with = "crate::model::serde_ms::serialize")]
    pub mean: Duration,
    pub successes: usize,
}

/// HTTP samples of one identity, sorted by latency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleGroup {
    pub name: String,
    #[serde(rename = "mean_ms", serialize_with = "crate::model::serde_ms::serialize")]
    pub mean: Duration,
    pub samples: Vec<Sample>,
}

/// Serialize durations as fractional milliseconds.
pub(crate) mod serde_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_nanos() as f64 / 1_000_000.0)
    }

    pub fn serialize_opt<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => serialize(d, s),
            None => s.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_dedups_addresses_in_order() {
        let id =
            ServerIdentity::new("Cloudflare", ["1.1.1.1:53", "1.0.0.1:53", "1.1.1.1:53"]).unwrap();
        assert_eq!(id.addresses(), ["1.1.1.1:53", "1.0.0.1:53"]);
        assert_eq!(id.primary(), "1.1.1.1:53");
        assert_eq!(id.to_string(), "Cloudflare (1.1.1.1:53 + 1.0.0.1:53)");
    }

    #[test]
    fn test_identity_requires_address_and_name() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            ServerIdentity::new("Quad9", empty),
            Err(ConfigError::NoAddresses(_))
        ));
        assert!(matches!(
            ServerIdentity::new("  ", ["9.9.9.9:53"]),
            Err(ConfigError::EmptyServerName)
        ));
    }

    #[test]
    fn test_success_rate_and_mean_display() {
        let stat = AggregateStat {
            key: StatKey::Domain { domain: "x.com".to_string() },
            min: None,
            max: None,
            mean: None,
            p50: None,
            p95: None,
            total: 4,
            successes: 0,
            success_sum: Duration::ZERO,
        };
        assert_eq!(stat.success_rate(), 0.0);
        assert_eq!(stat.mean_or_zero(), Duration::ZERO);
    }

    #[test]
    fn test_sample_serializes_latency_in_ms() {
        let task = ProbeTask {
            server_name: "Google DNS".to_string(),
            address: "8.8.8.8:53".to_string(),
            domain: "github.com".to_string(),
            attempt: 0,
            kind: ProbeKind::Dns,
        };
        let sample = Sample::for_task(&task, Duration::from_micros(12_500), Outcome::NoData);
        let json = serde_json::to_value(&sample).unwrap();
        assert_eq!(json["latency_ms"], 12.5);
        assert_eq!(json["outcome"], "NO_DATA");
        assert_eq!(json["kind"], "dns");
    }
}
