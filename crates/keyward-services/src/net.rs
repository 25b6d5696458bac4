//! Host locality checks.

use std::net::{IpAddr, SocketAddr, ToSocketAddrs, UdpSocket};
use tracing::debug;

/// Whether `host` refers to this machine.
///
/// `host` is an address literal or a name; a name is local only when every
/// address it resolves to is local. Unresolvable names are not local.
pub fn is_local_host(host: &str) -> bool {
    let addrs = match (host, 0).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Cannot resolve {}: {}", host, e);
            return false;
        }
    };

    let mut any_local = false;
    for addr in addrs {
        if !is_local_address(addr.ip()) {
            return false;
        }
        any_local = true;
    }
    any_local
}

/// Whether `ip` is assigned to an interface of this machine.
///
/// Binding succeeds only for addresses of local interfaces.
pub fn is_local_address(ip: IpAddr) -> bool {
    if ip.is_unspecified() || ip.is_multicast() {
        return false;
    }
    ip.is_loopback() || UdpSocket::bind(SocketAddr::new(ip, 0)).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_is_local() {
        assert!(is_local_host("127.0.0.1"));
        assert!(is_local_address("127.0.0.1".parse().unwrap()));
    }

    #[test]
    fn test_remote_and_unknown_hosts() {
        assert!(!is_local_host("192.0.2.1"));
        assert!(!is_local_host("0.0.0.0"));
        assert!(!is_local_host("no-such-host.invalid"));
    }
}
