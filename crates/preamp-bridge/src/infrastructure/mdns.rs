//! Multicast DNS responder socket.
//!
//! Binds UDP port 5353 on all interfaces with `SO_REUSEADDR` (so it can share
//! the port with a system mDNS daemon), joins the `224.0.0.251` group, and
//! answers matching queries on the group address.
//!
//! # Why multicast replies? (for beginners)
//!
//! mDNS answers are normally sent to the group, not back to the asker.  Every
//! host on the link sees the answer and can cache it, which is what the
//! cache-flush bit in the answer's class field refers to.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::application::NameResponder;

pub const MDNS_GROUP: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);
pub const MDNS_PORT: u16 = 5353;

/// Largest datagram read; longer ones are truncated and fail to decode.
const MAX_DATAGRAM: usize = 4096;

/// Error type for responder socket setup.
#[derive(Debug, Error)]
pub enum MdnsError {
    #[error("failed to bind mDNS socket on port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
}

/// The group address answers are sent to.
pub fn group_addr() -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(MDNS_GROUP, MDNS_PORT))
}

/// Creates the responder socket on `port` and joins the mDNS group.
///
/// Group membership and TTL failures are logged; the socket is still usable
/// for unicast queries.
///
/// # Errors
///
/// Returns [`MdnsError::Bind`] if the socket cannot be created or bound.
pub fn bind_multicast(port: u16) -> Result<UdpSocket, MdnsError> {
    let bind_err = |source| MdnsError::Bind { port, source };

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    let addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.set_nonblocking(true).map_err(bind_err)?;

    if let Err(e) = socket.join_multicast_v4(&MDNS_GROUP, &Ipv4Addr::UNSPECIFIED) {
        warn!("could not join mDNS group {MDNS_GROUP}: {e}");
    }
    if let Err(e) = socket.set_multicast_ttl_v4(255) {
        warn!("could not set mDNS multicast TTL: {e}");
    }

    UdpSocket::from_std(socket.into()).map_err(bind_err)
}

/// Answers queries on `socket` until a receive error occurs.
pub async fn run_responder(socket: UdpSocket, responder: NameResponder, reply_to: SocketAddr) {
    info!("mDNS responder answering for {}", responder.fqdn());
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!("mDNS receive failed: {e}");
                return;
            }
        };

        let Some(answer) = responder.respond(&buf[..len]) else {
            continue;
        };
        debug!("mDNS query from {peer} answered");
        if let Err(e) = socket.send_to(&answer, reply_to).await {
            debug!("mDNS send to {reply_to} failed: {e}");
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// A standard query for `name` with the given type.
    fn query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
        let mut msg = Vec::new();
        msg.extend_from_slice(&id.to_be_bytes());
        msg.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 0, 0]);
        for label in name.split('.') {
            msg.push(label.len() as u8);
            msg.extend_from_slice(label.as_bytes());
        }
        msg.push(0);
        msg.extend_from_slice(&qtype.to_be_bytes());
        msg.extend_from_slice(&1u16.to_be_bytes());
        msg
    }

    #[test]
    fn test_group_addr_is_standard_mdns() {
        assert_eq!(group_addr().to_string(), "224.0.0.251:5353");
    }

    #[tokio::test]
    async fn test_bind_multicast_on_ephemeral_port() {
        let socket = bind_multicast(0).unwrap();
        assert_ne!(socket.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_responder_answers_matching_query_only() {
        // Arrange
        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();
        let responder = NameResponder::new("preamp", Ipv4Addr::new(192, 168, 1, 50));
        let task = tokio::spawn(run_responder(server, responder, client_addr));

        // Act: one query for another host, then one for us
        client
            .send_to(&query(1, "other.local", 1), server_addr)
            .await
            .unwrap();
        client
            .send_to(&query(2, "Preamp.local", 1), server_addr)
            .await
            .unwrap();

        // Assert: only the second query is answered
        let mut buf = [0u8; 512];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .expect("answer within timeout")
            .unwrap();
        assert_eq!(&buf[0..2], &2u16.to_be_bytes());
        assert_eq!(&buf[len - 4..len], &[192, 168, 1, 50]);

        task.abort();
    }
}
