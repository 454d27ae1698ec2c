//! Host address discovery for server workers.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

/// The IPv4 address this machine's hostname resolves to, or loopback.
pub fn local_ip() -> IpAddr {
    hostname()
        .and_then(|name| {
            (name.as_str(), 0)
                .to_socket_addrs()
                .ok()?
                .map(|addr| addr.ip())
                .find(IpAddr::is_ipv4)
        })
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn hostname() -> Option<String> {
    gethostname::gethostname()
        .into_string()
        .ok()
        .filter(|name| !name.is_empty())
}
