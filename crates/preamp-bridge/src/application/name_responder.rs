//! Answers `.local` hostname queries for the bridge.
//!
//! Only the first question of each datagram is considered.  It gets an answer
//! when its name equals `<hostname>.local` (ASCII case-insensitive, trailing
//! dot ignored) and it asks for an A record (or ANY).  Everything else,
//! including malformed datagrams, is silently ignored.

use std::net::Ipv4Addr;

use preamp_core::protocol::dns::encode_a_response;
use preamp_core::DnsQuery;
use tracing::{debug, trace};

/// Matches queries against one hostname and answers with one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResponder {
    fqdn: String,
    address: Ipv4Addr,
}

impl NameResponder {
    /// Creates a responder for `<hostname>.local` resolving to `address`.
    pub fn new(hostname: &str, address: Ipv4Addr) -> Self {
        Self {
            fqdn: format!("{}.local", hostname.to_ascii_lowercase()),
            address,
        }
    }

    /// The answered name, e.g. `preamp.local`.
    pub fn fqdn(&self) -> &str {
        &self.fqdn
    }

    /// Builds the answer for `datagram`, or `None` if it is not ours to answer.
    pub fn respond(&self, datagram: &[u8]) -> Option<Vec<u8>> {
        let query = match DnsQuery::parse(datagram) {
            Ok(q) => q,
            Err(e) => {
                trace!("ignoring undecodable mDNS datagram: {e}");
                return None;
            }
        };

        if !query
            .name
            .trim_end_matches('.')
            .eq_ignore_ascii_case(&self.fqdn)
        {
            return None;
        }
        if !query.wants_address() {
            return None;
        }

        debug!("answering mDNS query for {} with {}", self.fqdn, self.address);
        Some(encode_a_response(&query, self.address))
    }
}
