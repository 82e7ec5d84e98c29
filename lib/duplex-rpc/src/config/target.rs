// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Remote endpoints the client visits, in order.

use std::fmt;

use super::ConfigError;

/// A remote `host:port` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Target {
    host: String,
    port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Result<Self, ConfigError> {
        let host = host.into();
        if host.is_empty() {
            return Err(invalid(&host, "host is empty"));
        }
        if port == 0 {
            return Err(invalid(
                &format_socket_addr(&host, port),
                "port must be between 1 and 65535",
            ));
        }
        Ok(Self { host, port })
    }

    /// Parse `host`, `host:port`, `[v6]:port` or a bare IPv6 address.
    ///
    /// Entries without a port use `default_port`.
    pub fn parse(raw: &str, default_port: u16) -> Result<Self, ConfigError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(invalid(raw, "target is empty"));
        }

        if let Some(rest) = raw.strip_prefix('[') {
            let (host, after) = rest
                .split_once(']')
                .ok_or_else(|| invalid(raw, "missing closing ']'"))?;
            let port = match after {
                "" => default_port,
                _ => {
                    let port = after
                        .strip_prefix(':')
                        .ok_or_else(|| invalid(raw, "expected ':' after ']'"))?;
                    parse_port(raw, port)?
                }
            };
            return Target::new(host, port).map_err(|e| relabel(e, raw));
        }

        // more than one ':' without brackets is a bare IPv6 address
        if raw.matches(':').count() > 1 {
            return Target::new(raw, default_port).map_err(|e| relabel(e, raw));
        }

        match raw.split_once(':') {
            Some((host, port)) => {
                let port = parse_port(raw, port)?;
                Target::new(host, port).map_err(|e| relabel(e, raw))
            }
            None => Target::new(raw, default_port).map_err(|e| relabel(e, raw)),
        }
    }

    /// Parse every entry of a target list, failing on the first malformed one.
    pub fn parse_all<S: AsRef<str>>(
        raw: &[S],
        default_port: u16,
    ) -> Result<Vec<Target>, ConfigError> {
        raw.iter()
            .map(|entry| Target::parse(entry.as_ref(), default_port))
            .collect()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, with IPv6 hosts bracketed.
    pub fn authority(&self) -> String {
        format_socket_addr(&self.host, self.port)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.authority())
    }
}

/// Split a comma-separated target list, dropping blank entries.
pub fn split_target_list(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}

/// Format a host and port into a valid socket address string
///
/// IPv6 addresses are wrapped in brackets as required by the socket address syntax.
///
/// # Examples
/// ```
/// use duplex_rpc::config::format_socket_addr;
///
/// assert_eq!(format_socket_addr("192.168.1.1", 8080), "192.168.1.1:8080");
/// assert_eq!(format_socket_addr("::1", 8080), "[::1]:8080");
/// assert_eq!(format_socket_addr("localhost", 3000), "localhost:3000");
/// ```
pub fn format_socket_addr(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

fn parse_port(raw: &str, port: &str) -> Result<u16, ConfigError> {
    match port.parse::<u16>() {
        Ok(0) => Err(invalid(raw, "port must be between 1 and 65535")),
        Ok(port) => Ok(port),
        Err(_) => Err(invalid(raw, &format!("invalid port '{}'", port))),
    }
}

fn invalid(target: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidTarget {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

fn relabel(err: ConfigError, raw: &str) -> ConfigError {
    match err {
        ConfigError::InvalidTarget { reason, .. } => invalid(raw, &reason),
        other => other,
    }
}
