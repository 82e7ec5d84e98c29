// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Client and server configuration.
//!
//! Both sides load their settings the same way, lowest priority first:
//! 1. Code defaults
//! 2. TOML file named by `DUPLEX_CLIENT_CONFIG_PATH` / `DUPLEX_SERVER_CONFIG_PATH`
//! 3. Legacy `GRPC_*` environment variables
//! 4. `DUPLEX_*` environment variables
//! 5. Programmatic overrides (the CLI merges its flags here)
//!
//! Everything is validated on extraction, so a config that reaches the core is
//! already known to be well formed. Any [`ConfigError`] is fatal.

mod client;
mod delay;
mod server;
mod target;

pub use client::{ClientConfig, ClientTlsSettings};
pub use delay::{DelayMode, DelayPolicy};
pub use server::{ServerConfig, ServerTlsSettings};
pub use target::{Target, format_socket_addr, split_target_list};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::ValidationErrors;

/// Port used by both sides when nothing else is configured.
pub const DEFAULT_PORT: u16 = 50051;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to extract configuration: {0}")]
    Extraction(#[from] Box<figment::Error>),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Invalid target '{target}': {reason}")]
    InvalidTarget { target: String, reason: String },

    #[error("Unknown service type: '{0}' (expected 'unary' or 'bidirectional')")]
    UnknownServiceKind(String),

    #[error("Invalid bind address '{ip}': {source}")]
    InvalidBindAddress {
        ip: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

/// Which call shape the client drives against every target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ServiceKind {
    #[default]
    Unary,
    Bidirectional,
}

impl ServiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceKind::Unary => "unary",
            ServiceKind::Bidirectional => "bidirectional",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unary" => Ok(ServiceKind::Unary),
            "bidirectional" => Ok(ServiceKind::Bidirectional),
            _ => Err(ConfigError::UnknownServiceKind(s.to_string())),
        }
    }
}

impl TryFrom<String> for ServiceKind {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ServiceKind> for String {
    fn from(kind: ServiceKind) -> Self {
        kind.as_str().to_string()
    }
}
