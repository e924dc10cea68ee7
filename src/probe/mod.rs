//! Probe module for network measurements.
//!
//! Defines the DNS and HTTP capabilities the schedulers depend on, along
//! with their UDP and reqwest implementations.

mod dns;
mod http;

pub use dns::*;
pub use http::*;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Header fields of a DNS response needed to classify a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsReply {
    pub rcode: u8,
    pub answer_count: u16,
}

impl DnsReply {
    pub const NOERROR: u8 = 0;

    pub fn is_success(&self) -> bool {
        self.rcode == Self::NOERROR
    }
}

/// Resolves A records against a specific server address.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Query `server` for the A record of `domain`.
    ///
    /// `Ok(None)` means the exchange completed without a usable response.
    async fn resolve_a(
        &self,
        server: &str,
        domain: &str,
        timeout: Duration,
    ) -> Result<Option<DnsReply>, ProbeError>;
}

/// Issues a bodiless HTTP request and reports the status code.
#[async_trait]
pub trait HttpProber: Send + Sync {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_success() {
        assert!(DnsReply { rcode: 0, answer_count: 0 }.is_success());
        assert!(!DnsReply { rcode: 3, answer_count: 0 }.is_success());
    }

    #[test]
    fn test_error_display() {
        let err = ProbeError::Timeout(Duration::from_secs(3));
        assert_eq!(err.to_string(), "probe timed out after 3s");
        let err = ProbeError::Network("connection refused".to_string());
        assert_eq!(err.to_string(), "network error: connection refused");
    }
}
