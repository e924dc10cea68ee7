//! DNS probe implementation using raw UDP packets.

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;

use super::{DnsReply, DnsResolver, ProbeError};

const DNS_HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;

/// Resolver that sends one A query per call over a fresh UDP socket.
#[derive(Debug, Clone, Default)]
pub struct UdpResolver;

impl UdpResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DnsResolver for UdpResolver {
    async fn resolve_a(
        &self,
        server: &str,
        domain: &str,
        timeout: Duration,
    ) -> Result<Option<DnsReply>, ProbeError> {
        let packet = build_dns_query(domain)?;

        match tokio::time::timeout(timeout, exchange(server, &packet)).await {
            Ok(result) => result,
            Err(_) => Err(ProbeError::Timeout(timeout)),
        }
    }
}

/// Send `packet` to `server` and decode the header of the first reply.
async fn exchange(server: &str, packet: &[u8]) -> Result<Option<DnsReply>, ProbeError> {
    let target = resolve_server(server).await?;
    let bind_addr = if target.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };

    let socket = UdpSocket::bind(bind_addr)
        .await
        .map_err(|e| ProbeError::Network(format!("failed to bind socket: {}", e)))?;

    socket
        .connect(target)
        .await
        .map_err(|e| ProbeError::Network(format!("failed to connect: {}", e)))?;

    socket
        .send(packet)
        .await
        .map_err(|e| ProbeError::Network(format!("failed to send: {}", e)))?;

    let mut response = [0u8; 512];
    let n = socket
        .recv(&mut response)
        .await
        .map_err(|e| ProbeError::Network(format!("failed to recv: {}", e)))?;

    let tx_id = u16::from_be_bytes([packet[0], packet[1]]);
    Ok(parse_reply(&response[..n], tx_id))
}

/// Turn a server address into a socket address, defaulting to port 53.
async fn resolve_server(server: &str) -> Result<SocketAddr, ProbeError> {
    if let Ok(addr) = server.parse::<SocketAddr>() {
        return Ok(addr);
    }
    if let Ok(ip) = server.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, 53));
    }

    let target = if server.contains(':') {
        server.to_string()
    } else {
        format!("{}:53", server)
    };

    let found = tokio::net::lookup_host(&target)
        .await
        .map_err(|e| ProbeError::Network(format!("failed to resolve {}: {}", server, e)))?
        .next();
    found.ok_or_else(|| ProbeError::Network(format!("no addresses found for {}", server)))
}

/// Build a DNS query packet for the A record of `domain`.
pub fn build_dns_query(domain: &str) -> Result<Vec<u8>, ProbeError> {
    let tx_id: u16 = rand::random();
    let flags: u16 = 0x0100; // Standard query, recursion desired
    let qd_count: u16 = 1;

    let mut packet = Vec::with_capacity(DNS_HEADER_LEN + domain.len() + 6);
    packet.extend_from_slice(&tx_id.to_be_bytes());
    packet.extend_from_slice(&flags.to_be_bytes());
    packet.extend_from_slice(&qd_count.to_be_bytes());
    packet.extend_from_slice(&[0; 6]); // AN, NS, AR counts

    encode_name(domain, &mut packet)?;

    // QTYPE A, QCLASS IN
    packet.extend_from_slice(&1u16.to_be_bytes());
    packet.extend_from_slice(&1u16.to_be_bytes());

    Ok(packet)
}

/// Append `domain` as length-prefixed labels. A trailing dot is accepted.
fn encode_name(domain: &str, packet: &mut Vec<u8>) -> Result<(), ProbeError> {
    let name = domain.strip_suffix('.').unwrap_or(domain);
    if name.is_empty() {
        return Err(ProbeError::Config("empty domain name".to_string()));
    }

    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL_LEN {
            return Err(ProbeError::Config(format!("invalid label in {:?}", domain)));
        }
        packet.push(label.len() as u8);
        packet.extend_from_slice(label.as_bytes());
    }
    packet.push(0);

    Ok(())
}

/// Decode RCODE and ANCOUNT from a response header.
///
/// Returns `None` for datagrams too short to be a header or answering a
/// different transaction.
pub fn parse_reply(response: &[u8], tx_id: u16) -> Option<DnsReply> {
    if response.len() < DNS_HEADER_LEN {
        return None;
    }
    if u16::from_be_bytes([response[0], response[1]]) != tx_id {
        return None;
    }

    Some(DnsReply {
        rcode: response[3] & 0x0F,
        answer_count: u16::from_be_bytes([response[6], response[7]]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    /// Reply to one query with the given RCODE and answer count.
    async fn fake_server(rcode: u8, answers: u16) -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = [0u8; 512];
            let (n, peer) = socket.recv_from(&mut buf).await.unwrap();
            let mut reply = buf[..n].to_vec();
            reply[2] = 0x81; // QR + RD
            reply[3] = 0x80 | rcode; // RA + RCODE
            reply[6..8].copy_from_slice(&answers.to_be_bytes());
            socket.send_to(&reply, peer).await.unwrap();
        });
        addr
    }

    #[test]
    fn test_build_dns_query() {
        let packet = build_dns_query("github.com").unwrap();
        // 12 (header) + 12 (name) + 4 (type/class)
        assert_eq!(packet.len(), 28);
        assert_eq!(&packet[2..4], &[0x01, 0x00]);
        assert_eq!(&packet[4..6], &[0x00, 0x01]);
        assert_eq!(packet[12], 6);
        assert_eq!(&packet[13..19], b"github");
        assert_eq!(packet[19], 3);
        assert_eq!(&packet[20..23], b"com");
        assert_eq!(packet[23], 0);
    }

    #[test]
    fn test_build_dns_query_rejects_bad_names() {
        assert!(build_dns_query("example.com.").is_ok());
        assert!(build_dns_query("").is_err());
        assert!(build_dns_query("bad..name").is_err());
        assert!(build_dns_query(&format!("{}.com", "a".repeat(64))).is_err());
    }

    #[test]
    fn test_parse_reply() {
        let mut header = [0u8; 12];
        header[0..2].copy_from_slice(&0xBEEFu16.to_be_bytes());
        header[3] = 0x83; // NXDOMAIN
        header[7] = 2;

        let reply = parse_reply(&header, 0xBEEF).unwrap();
        assert_eq!(reply.rcode, 3);
        assert_eq!(reply.answer_count, 2);

        assert!(parse_reply(&header, 0x1234).is_none());
        assert!(parse_reply(&header[..8], 0xBEEF).is_none());
    }

    #[tokio::test]
    async fn test_resolve_against_fake_server() {
        let addr = fake_server(0, 1).await;
        let resolver = UdpResolver::new();
        let reply = assert_ok!(
            resolver
                .resolve_a(&addr.to_string(), "example.com", Duration::from_secs(2))
                .await
        );
        assert_eq!(reply, Some(DnsReply { rcode: 0, answer_count: 1 }));
    }

    #[tokio::test]
    async fn test_resolve_reports_rcode() {
        let addr = fake_server(2, 0).await;
        let reply = UdpResolver::new()
            .resolve_a(&addr.to_string(), "example.com", Duration::from_secs(2))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(reply.rcode, 2);
        assert!(!reply.is_success());
    }

    #[tokio::test]
    async fn test_resolve_server_forms() {
        let addr = assert_ok!(resolve_server("9.9.9.9").await);
        assert_eq!(addr, "9.9.9.9:53".parse().unwrap());

        let addr = assert_ok!(resolve_server("127.0.0.1:5353").await);
        assert_eq!(addr.port(), 5353);

        // Host names go through the system resolver.
        let addr = assert_ok!(resolve_server("localhost:5353").await);
        assert!(addr.ip().is_loopback());
        assert_eq!(addr.port(), 5353);
    }

    #[tokio::test]
    async fn test_resolve_times_out() {
        // Bound but never answers.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = silent.local_addr().unwrap();

        let timeout = Duration::from_millis(100);
        let err = assert_err!(
            UdpResolver::new()
                .resolve_a(&addr.to_string(), "example.com", timeout)
                .await
        );
        assert_eq!(err, ProbeError::Timeout(timeout));
    }
}
