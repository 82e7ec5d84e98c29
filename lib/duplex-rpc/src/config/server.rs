// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Server configuration.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use figment::{
    Figment, Provider,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{ConfigError, DEFAULT_PORT};

/// ENV naming a TOML file with server settings
const CONFIG_PATH_ENV: &str = "DUPLEX_SERVER_CONFIG_PATH";

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    /// IP address to bind, e.g. "0.0.0.0" or "::".
    #[serde(default = "default_ip")]
    pub ip: String,

    /// TCP port to bind. 0 means OS-assigned.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Size of the worker pool (default: 10). Each unary call holds one worker for
    /// its duration, each bidirectional call for the lifetime of its stream.
    #[serde(default = "default_workers")]
    #[validate(range(min = 1, max = 4096))]
    pub workers: usize,

    /// Name reported in unary responses. Resolved from the host when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,

    #[serde(default)]
    pub tls: ServerTlsSettings,
}

/// Server side transport security.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerTlsSettings {
    #[serde(default)]
    pub secure: bool,

    /// Certificate chain (PEM) presented to clients.
    #[serde(default = "default_cert_path")]
    pub cert_path: PathBuf,

    /// Private key (PEM) for `cert_path`.
    #[serde(default = "default_key_path")]
    pub key_path: PathBuf,
}

impl Default for ServerTlsSettings {
    fn default() -> Self {
        Self {
            secure: false,
            cert_path: default_cert_path(),
            key_path: default_key_path(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ip: default_ip(),
            port: default_port(),
            workers: default_workers(),
            hostname: None,
            tls: ServerTlsSettings::default(),
        }
    }
}

impl ServerConfig {
    /// Create a Figment configuration with all sources merged.
    ///
    /// Sources in priority order (lowest to highest):
    /// 1. Code defaults
    /// 2. TOML file from `DUPLEX_SERVER_CONFIG_PATH`
    /// 3. `GRPC_SERVER_IP`, `GRPC_SERVER_PORT`
    /// 4. `DUPLEX_SERVER_*`, `DUPLEX_SERVER_TLS_*`
    pub fn figment() -> Figment {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(&config_path))
            .merge(
                Env::raw()
                    .only(&["GRPC_SERVER_IP", "GRPC_SERVER_PORT"])
                    .map(|k| {
                        k.as_str()
                            .to_lowercase()
                            .trim_start_matches("grpc_server_")
                            .to_string()
                            .into()
                    }),
            )
            .merge(Env::prefixed("DUPLEX_SERVER_"))
            .merge(
                Env::prefixed("DUPLEX_SERVER_TLS_")
                    .map(|k| format!("tls.{}", k.as_str().to_lowercase()).into()),
            )
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    pub fn figment_with<T: Provider>(extra: T) -> Figment {
        Self::figment().merge(extra)
    }

    pub fn extract_from<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        config.validate()?;
        config.bind_addr()?;
        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        let ip = self
            .ip
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .parse::<IpAddr>()
            .map_err(|source| ConfigError::InvalidBindAddress {
                ip: self.ip.clone(),
                source,
            })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn default_ip() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_workers() -> usize {
    10
}

fn default_cert_path() -> PathBuf {
    PathBuf::from("./certs/server.crt")
}

fn default_key_path() -> PathBuf {
    PathBuf::from("./certs/server.key")
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: [&str; 8] = [
        "DUPLEX_SERVER_CONFIG_PATH",
        "DUPLEX_SERVER_IP",
        "DUPLEX_SERVER_PORT",
        "DUPLEX_SERVER_WORKERS",
        "DUPLEX_SERVER_HOSTNAME",
        "DUPLEX_SERVER_TLS_SECURE",
        "GRPC_SERVER_IP",
        "GRPC_SERVER_PORT",
    ];

    #[test]
    fn test_figment_defaults() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let config = ServerConfig::from_env().unwrap();
            assert_eq!(config.ip, "0.0.0.0");
            assert_eq!(config.port, 50051);
            assert_eq!(config.workers, 10);
            assert!(config.hostname.is_none());
            assert!(!config.tls.secure);
            assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:50051".parse().unwrap());
        });
    }

    #[test]
    fn test_legacy_env_names() {
        temp_env::with_vars(
            [
                ("GRPC_SERVER_IP", Some("127.0.0.1")),
                ("GRPC_SERVER_PORT", Some("6001")),
                ("DUPLEX_SERVER_IP", None),
                ("DUPLEX_SERVER_PORT", None),
                ("DUPLEX_SERVER_CONFIG_PATH", None),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:6001".parse().unwrap());
            },
        );
    }

    #[test]
    fn test_prefixed_env_wins_over_legacy() {
        temp_env::with_vars(
            [
                ("GRPC_SERVER_PORT", Some("6001")),
                ("DUPLEX_SERVER_PORT", Some("7001")),
                ("DUPLEX_SERVER_WORKERS", Some("4")),
                ("DUPLEX_SERVER_TLS_SECURE", Some("true")),
                ("DUPLEX_SERVER_CONFIG_PATH", None),
            ],
            || {
                let config = ServerConfig::from_env().unwrap();
                assert_eq!(config.port, 7001);
                assert_eq!(config.workers, 4);
                assert!(config.tls.secure);
            },
        );
    }

    #[test]
    fn test_ipv6_bind_addr() {
        let config = ServerConfig {
            ip: "[::]".to_string(),
            port: 0,
            ..Default::default()
        };
        assert_eq!(config.bind_addr().unwrap(), "[::]:0".parse().unwrap());
    }

    #[test]
    fn test_invalid_ip_is_fatal() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let err = ServerConfig::extract_from(ServerConfig::figment_with(("ip", "not-an-ip")))
                .unwrap_err();
            assert!(matches!(err, ConfigError::InvalidBindAddress { .. }), "{err:?}");
        });
    }

    #[test]
    fn test_zero_workers_rejected() {
        temp_env::with_vars_unset(ENV_KEYS, || {
            let err =
                ServerConfig::extract_from(ServerConfig::figment_with(("workers", 0))).unwrap_err();
            assert!(matches!(err, ConfigError::Validation(_)), "{err:?}");
        });
    }
}
