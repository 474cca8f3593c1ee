//! Decoders for the textual encodings the port collector meets: socket
//! `address:port` strings, `ss` process descriptors, firewalld `port/protocol`
//! entries, plus the address-to-interface lookup.

use std::net::{IpAddr, SocketAddrV4, SocketAddrV6};
use std::path::Path;

/// Socket type reported for stream (TCP) sockets.
pub const SOCK_STREAM: u32 = 1;
/// Socket type reported for datagram (UDP) sockets.
pub const SOCK_DGRAM: u32 = 2;

/// Map a socket type to the `protocol` label value.
pub fn protocol_label(socket_type: u32) -> &'static str {
    match socket_type {
        SOCK_STREAM => "tcp",
        SOCK_DGRAM => "udp",
        _ => "unknown",
    }
}

/// Split `addr:port` or `[addr]:port` into its two halves.
///
/// Anything that is not exactly one of those shapes yields `("", "")`.
pub fn split_address_port(addr_port: &str) -> (&str, &str) {
    if addr_port.contains('[') {
        let parts: Vec<&str> = addr_port.split("]:").collect();
        if let [address, port] = parts[..] {
            return (address.strip_prefix('[').unwrap_or(address), port);
        }
    } else {
        let parts: Vec<&str> = addr_port.split(':').collect();
        if let [address, port] = parts[..] {
            return (address, port);
        }
    }
    ("", "")
}

/// Extract `(pid, process)` from a descriptor such as
/// `users:(pid=123,exe="/usr/bin/sshd")`.
///
/// The executable is reduced to its file name. `""` and `-` mean "no
/// process"; missing fields come back empty.
pub fn split_pid_process(descriptor: &str) -> (String, String) {
    if descriptor.is_empty() || descriptor == "-" {
        return (String::new(), String::new());
    }

    let inner = match descriptor.strip_prefix("users:(") {
        Some(rest) => rest.strip_suffix(')').unwrap_or(rest),
        None => descriptor,
    };

    let mut pid = String::new();
    let mut process = String::new();
    for part in inner.split(',').map(str::trim) {
        if let Some(value) = part.strip_prefix("pid=") {
            pid = value.trim_matches('"').to_string();
        } else if let Some(value) = part.strip_prefix("exe=") {
            let exe = value.trim_matches('"');
            process = Path::new(exe)
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or(exe)
                .to_string();
        }
    }

    (pid, process)
}

/// Split a firewalld `port/protocol` entry. Port ranges (`8000-8100/tcp`)
/// are kept as-is in the port half.
pub fn split_port_protocol(entry: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = entry.split('/').collect();
    match parts[..] {
        [port, protocol] => Some((port, protocol)),
        _ => None,
    }
}

/// Name of the first local interface bound to `address`, compared textually.
///
/// Returns an empty string for empty input, when interfaces cannot be
/// enumerated, or when nothing matches.
pub fn interface_for_address(address: &str) -> String {
    if address.is_empty() {
        return String::new();
    }

    let Ok(ifaddrs) = nix::ifaddrs::getifaddrs() else {
        return String::new();
    };

    for ifaddr in ifaddrs {
        let Some(storage) = ifaddr.address else {
            continue;
        };
        let ip = if let Some(v4) = storage.as_sockaddr_in() {
            IpAddr::V4(*SocketAddrV4::from(*v4).ip())
        } else if let Some(v6) = storage.as_sockaddr_in6() {
            IpAddr::V6(*SocketAddrV6::from(*v6).ip())
        } else {
            continue;
        };
        if ip.to_string() == address {
            return ifaddr.interface_name;
        }
    }

    String::new()
}
