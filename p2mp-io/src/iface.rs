//! Local interface discovery
//!
//! The receiver learns its own bind address from the host's interface
//! table: the first non-loopback IPv4 address on a platform-preferred
//! interface name, falling back to the first non-loopback address on any
//! interface. This is a startup concern only; nothing in the protocol
//! depends on it.

use network_interface::{Addr, NetworkInterface, NetworkInterfaceConfig};
use std::net::Ipv4Addr;
use thiserror::Error;
use tracing::debug;

/// Interface discovery errors
#[derive(Error, Debug)]
pub enum IfaceError {
    #[error("interface lookup failed: {0}")]
    Lookup(#[from] network_interface::Error),

    #[error("no non-loopback IPv4 address found")]
    NoAddress,
}

#[cfg(target_os = "macos")]
const PREFERRED_NAMES: &[&str] = &["en0", "en1"];

#[cfg(not(target_os = "macos"))]
const PREFERRED_NAMES: &[&str] = &["eth0", "ens160", "enp0s3"];

/// Find the IPv4 address the receiver should bind to.
pub fn discover_ipv4() -> Result<Ipv4Addr, IfaceError> {
    let interfaces = NetworkInterface::show()?;

    let candidates = interfaces.iter().flat_map(|ifc| {
        ifc.addr.iter().filter_map(move |addr| match addr {
            Addr::V4(v4) => Some((ifc.name.as_str(), v4.ip)),
            Addr::V6(_) => None,
        })
    });

    let ip = select_ipv4(candidates, PREFERRED_NAMES).ok_or(IfaceError::NoAddress)?;
    debug!(%ip, "discovered bind address");
    Ok(ip)
}

/// Pick from (interface name, address) candidates: preferred names first,
/// in preference order, then any non-loopback address.
fn select_ipv4<'a>(
    candidates: impl IntoIterator<Item = (&'a str, Ipv4Addr)>,
    preferred: &[&str],
) -> Option<Ipv4Addr> {
    let usable: Vec<(&str, Ipv4Addr)> = candidates
        .into_iter()
        .filter(|(_, ip)| !ip.is_loopback())
        .collect();

    for name in preferred {
        if let Some((_, ip)) = usable.iter().find(|(n, _)| n == name) {
            return Some(*ip);
        }
    }

    usable.first().map(|(_, ip)| *ip)
}
