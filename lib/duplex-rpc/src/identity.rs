// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Server name and caller address for unary responses.
//!
//! Resolution never fails a request: anything that cannot be determined is
//! reported as [`UNKNOWN`].

use std::net::{IpAddr, SocketAddr};

use tonic::Request;

use crate::config::format_socket_addr;

/// Placeholder for a value that could not be resolved.
pub const UNKNOWN: &str = "unknown";

const HOSTNAME_ENV: &str = "HOSTNAME";
/// Kernel's current host name on Linux. Tracks transient renames.
const KERNEL_HOSTNAME_FILE: &str = "/proc/sys/kernel/hostname";
const HOSTNAME_FILE: &str = "/etc/hostname";

/// The serving machine's advertised name, fixed at server start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    hostname: String,
}

impl ServerIdentity {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
        }
    }

    /// Resolve the local host name: `hostname_override`, then `$HOSTNAME`, then
    /// `/proc/sys/kernel/hostname`, then `/etc/hostname`, then [`UNKNOWN`].
    pub fn resolve_local(hostname_override: Option<&str>) -> Self {
        let hostname = hostname_override
            .map(str::to_string)
            .and_then(non_blank)
            .or_else(|| std::env::var(HOSTNAME_ENV).ok().and_then(non_blank))
            .or_else(|| read_non_blank(KERNEL_HOSTNAME_FILE))
            .or_else(|| read_non_blank(HOSTNAME_FILE))
            .unwrap_or_else(|| UNKNOWN.to_string());

        Self { hostname }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// `(hostname, peer address)` for one incoming call.
    pub fn resolve<T>(&self, request: &Request<T>) -> (String, String) {
        let descriptor = peer_descriptor(request.remote_addr());
        (self.hostname.clone(), peer_address(&descriptor).to_string())
    }
}

fn non_blank(name: String) -> Option<String> {
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

fn read_non_blank(path: &str) -> Option<String> {
    std::fs::read_to_string(path).ok().and_then(non_blank)
}

/// Describe a remote address as `ipv4:ip:port` or `ipv6:[ip]:port`.
///
/// IPv4 callers accepted on a dual-stack socket arrive as `::ffff:a.b.c.d` and are
/// described as `ipv4:` peers.
pub fn peer_descriptor(remote: Option<SocketAddr>) -> String {
    let Some(addr) = remote else {
        return UNKNOWN.to_string();
    };

    let ip = match addr.ip() {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    };

    let family = if ip.is_ipv4() { "ipv4" } else { "ipv6" };
    format!("{}:{}", family, format_socket_addr(&ip.to_string(), addr.port()))
}

/// Extract the IP from an `ipv4:ip:port` descriptor. Any other shape yields
/// [`UNKNOWN`].
pub fn peer_address(descriptor: &str) -> &str {
    descriptor
        .strip_prefix("ipv4:")
        .and_then(|rest| rest.rsplit_once(':'))
        .map(|(ip, _port)| ip)
        .filter(|ip| ip.parse::<std::net::Ipv4Addr>().is_ok())
        .unwrap_or(UNKNOWN)
}
