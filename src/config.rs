//! Configuration module for dnsbench.
//!
//! Starts from the built-in provider and domain lists, then applies an
//! optional JSON file and environment variable overrides.

use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::model::ServerIdentity;

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no DNS servers configured")]
    NoServers,
    #[error("no domains configured")]
    NoDomains,
    #[error("queries per domain must be at least 1")]
    NoRepetitions,
    #[error("server {0:?} has no addresses")]
    NoAddresses(String),
    #[error("server name cannot be empty")]
    EmptyServerName,
    #[error("domain name cannot be empty")]
    EmptyDomain,
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Benchmark configuration.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    /// Resolvers to measure (default: six public providers, primary + secondary)
    pub servers: Vec<ServerIdentity>,
    /// Domains resolved and then fetched over HTTP
    pub domains: Vec<String>,
    /// Queries per (server address, domain) pair (default: 5)
    pub queries_per_domain: u32,
    /// Resolvers carried into the HTTP phase (default: 3)
    pub top_n: usize,
    /// Per-query DNS deadline (default: 3s)
    pub dns_timeout: Duration,
    /// Per-request HTTP deadline (default: 15s)
    pub http_timeout: Duration,
    /// Pause before the single HTTP retry (default: 500ms)
    pub retry_delay: Duration,
    /// URL scheme for HTTP probes (default: "https")
    pub scheme: String,
    /// Probe HTTP identities concurrently (default: false)
    pub http_parallel: bool,
    pub format: OutputFormat,
}

const DEFAULT_SERVERS: &[(&str, &str, &str)] = &[
    ("Google DNS", "8.8.8.8:53", "8.8.4.4:53"),
    ("Cloudflare", "1.1.1.1:53", "1.0.0.1:53"),
    ("Quad9", "9.9.9.9:53", "149.112.112.112:53"),
    ("OpenDNS", "208.67.222.222:53", "208.67.220.220:53"),
    ("NextDNS", "45.90.28.0:53", "45.90.30.0:53"),
    ("tiar.app", "174.138.21.128:53", "188.166.206.224:53"),
];

const DEFAULT_DOMAINS: &[&str] = &[
    "google.com",
    "facebook.com",
    "youtube.com",
    "x.com",
    "github.com",
    "gitlab.com",
    "netflix.com",
    "microsoft.com",
    "apple.com",
    "cloudflare.com",
    "openai.com",
    "shopee.co.id",
];

impl Default for BenchConfig {
    fn default() -> Self {
        let servers = DEFAULT_SERVERS
            .iter()
            .filter_map(|(name, primary, secondary)| {
                ServerIdentity::new(*name, [*primary, *secondary]).ok()
            })
            .collect();

        Self {
            servers,
            domains: DEFAULT_DOMAINS.iter().map(|d| d.to_string()).collect(),
            queries_per_domain: 5,
            top_n: 3,
            dns_timeout: Duration::from_secs(3),
            http_timeout: Duration::from_secs(15),
            retry_delay: Duration::from_millis(500),
            scheme: "https".to_string(),
            http_parallel: false,
            format: OutputFormat::Text,
        }
    }
}

/// On-disk shape of a config file.
#[derive(Debug, Deserialize)]
struct FileConfig {
    servers: Option<Vec<FileServer>>,
    domains: Option<Vec<String>>,
    queries_per_domain: Option<u32>,
    top_n: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct FileServer {
    name: String,
    addresses: Vec<String>,
}

impl BenchConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `DNSBENCH_CONFIG`: JSON file with `servers`, `domains`, `queries_per_domain`, `top_n`
    /// - `DNSBENCH_QUERIES`: queries per domain per address (default: 5)
    /// - `DNSBENCH_TOP_N`: resolvers kept for the HTTP phase (default: 3)
    /// - `DNSBENCH_DNS_TIMEOUT_MS`, `DNSBENCH_HTTP_TIMEOUT_MS`, `DNSBENCH_RETRY_DELAY_MS`
    /// - `DNSBENCH_SCHEME`: URL scheme for HTTP probes (default: "https")
    /// - `DNSBENCH_HTTP_PARALLEL`: `1` or `true` to probe identities concurrently
    /// - `DNSBENCH_FORMAT`: `text` (default) or `json`
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    /// Load configuration using `lookup` in place of the process environment.
    pub fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(path) = lookup("DNSBENCH_CONFIG") {
            cfg.apply_file(path)?;
        }

        if let Some(n) = lookup("DNSBENCH_QUERIES").and_then(|v| v.parse().ok()) {
            cfg.queries_per_domain = n;
        }
        if let Some(n) = lookup("DNSBENCH_TOP_N").and_then(|v| v.parse().ok()) {
            cfg.top_n = n;
        }
        if let Some(ms) = lookup("DNSBENCH_DNS_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            cfg.dns_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("DNSBENCH_HTTP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            cfg.http_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = lookup("DNSBENCH_RETRY_DELAY_MS").and_then(|v| v.parse().ok()) {
            cfg.retry_delay = Duration::from_millis(ms);
        }
        if let Some(scheme) = lookup("DNSBENCH_SCHEME") {
            if !scheme.is_empty() {
                cfg.scheme = scheme;
            }
        }
        if let Some(flag) = lookup("DNSBENCH_HTTP_PARALLEL") {
            cfg.http_parallel = matches!(flag.as_str(), "1" | "true" | "yes");
        }
        if let Some(format) = lookup("DNSBENCH_FORMAT") {
            cfg.format = match format.as_str() {
                "json" => OutputFormat::Json,
                _ => OutputFormat::Text,
            };
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Overlay the fields present in a JSON config file.
    fn apply_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let file: FileConfig = serde_json::from_str(&raw)?;

        if let Some(servers) = file.servers {
            self.servers = servers
                .into_iter()
                .map(|s| ServerIdentity::new(s.name, s.addresses))
                .collect::<Result<_, _>>()?;
        }
        if let Some(domains) = file.domains {
            self.domains = domains;
        }
        if let Some(n) = file.queries_per_domain {
            self.queries_per_domain = n;
        }
        if let Some(n) = file.top_n {
            self.top_n = n;
        }

        Ok(())
    }

    /// Reject configurations that cannot produce a benchmark.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_matrix(&self.servers, &self.domains, self.queries_per_domain)
    }
}

/// Check that a {server x domain x repetition} matrix is non-empty.
pub fn validate_matrix(
    servers: &[ServerIdentity],
    domains: &[String],
    repetitions: u32,
) -> Result<(), ConfigError> {
    if servers.is_empty() {
        return Err(ConfigError::NoServers);
    }
    if domains.is_empty() {
        return Err(ConfigError::NoDomains);
    }
    if domains.iter().any(|d| d.trim().is_empty()) {
        return Err(ConfigError::EmptyDomain);
    }
    if repetitions == 0 {
        return Err(ConfigError::NoRepetitions);
    }
    Ok(())
}
