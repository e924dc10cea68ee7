//! HTTP probe implementation.

use async_trait::async_trait;
use std::time::Duration;

use super::{HttpProber, ProbeError};

/// HTTP prober backed by a pooled reqwest client.
///
/// Idle connections live as long as the prober; dropping it closes them.
pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    pub fn new(timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn head(&self, url: &str, timeout: Duration) -> Result<u16, ProbeError> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProbeError::Timeout(timeout)
                } else {
                    ProbeError::Network(e.to_string())
                }
            })?;

        Ok(response.status().as_u16())
    }
}

/// Build the probe URL for `domain` using `scheme`.
pub fn probe_url(scheme: &str, domain: &str) -> String {
    if domain.starts_with("http://") || domain.starts_with("https://") {
        domain.to_string()
    } else {
        format!("{}://{}", scheme, domain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_probe_url() {
        assert_eq!(probe_url("https", "github.com"), "https://github.com");
        assert_eq!(probe_url("https", "http://localhost:8080"), "http://localhost:8080");
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url() {
        let prober = ReqwestProber::new(Duration::from_millis(100)).unwrap();
        let result = prober.head("http://256.256.256.256", Duration::from_millis(100)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_http_probe_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&chunk[..n]);
            }
            assert!(buf.starts_with(b"HEAD / HTTP/1.1"));
            stream
                .write_all(b"HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let prober = ReqwestProber::new(Duration::from_secs(5)).unwrap();
        let status = prober
            .head(&format!("http://{}/", addr), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(status, 204);
    }
}
