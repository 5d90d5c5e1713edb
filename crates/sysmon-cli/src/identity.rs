//! Identity of the measured host: name and address.

use std::net::{IpAddr, Ipv4Addr, ToSocketAddrs};

use sysmon_store::Origin;
use tracing::debug;

/// Recorded when the host name cannot be determined.
const UNKNOWN_HOST: &str = "unknown";

/// Builds the origin for a measurement. Overrides win; otherwise the host
/// name comes from the OS and the address from resolving that name.
#[must_use]
pub fn resolve_origin(host: Option<&str>, address: Option<&str>) -> Origin {
    let host = host.map_or_else(local_hostname, ToString::to_string);
    let address = address.map_or_else(|| resolve_address(&host).to_string(), ToString::to_string);
    debug!(%host, %address, "resolved origin");
    Origin::new(host, address)
}

fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| UNKNOWN_HOST.to_string())
}

/// First IPv4 address the name resolves to, then any address, then loopback.
fn resolve_address(host: &str) -> IpAddr {
    let addrs: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .map(|iter| iter.map(|sa| sa.ip()).collect())
        .unwrap_or_default();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
