// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Client configuration.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment, Provider,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use validator::Validate;

use super::{ConfigError, DEFAULT_PORT, DelayPolicy, ServiceKind, Target, split_target_list};

/// ENV naming a TOML file with client settings
const CONFIG_PATH_ENV: &str = "DUPLEX_CLIENT_CONFIG_PATH";

/// Top-level client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClientConfig {
    /// Servers to visit in order, e.g. `["localhost:50051", "10.0.0.2"]`.
    /// A comma-separated string is accepted as well.
    #[serde(default, deserialize_with = "deserialize_target_list")]
    #[validate(length(min = 1, message = "At least one target is required."))]
    pub targets: Vec<String>,

    /// Call shape to drive against every target.
    #[serde(default)]
    pub service: ServiceKind,

    /// Port for targets given without one.
    #[serde(default = "default_port")]
    #[validate(range(min = 1))]
    pub port: u16,

    /// Number of passes over the target list. 0 runs until interrupted.
    #[serde(default = "default_repeat")]
    pub repeat: u64,

    #[serde(default)]
    #[validate(nested)]
    pub delay: DelayPolicy,

    #[serde(default)]
    pub tls: ClientTlsSettings,

    /// Request text sent by unary calls.
    #[serde(default = "default_message")]
    pub message: String,

    #[serde(default = "default_connect_timeout_secs")]
    #[validate(range(min = 0.0, max = 600.0))]
    pub connect_timeout_secs: f64,

    /// Per-call deadline. 0 disables it.
    #[serde(default = "default_request_timeout_secs")]
    #[validate(range(min = 0.0, max = 3600.0))]
    pub request_timeout_secs: f64,
}

/// Client side transport security.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientTlsSettings {
    /// Use an encrypted channel.
    #[serde(default)]
    pub secure: bool,

    /// Root certificate (PEM) trusted for the server.
    #[serde(default = "default_ca_cert_path")]
    pub ca_cert_path: PathBuf,

    /// Name to verify the server certificate against. Defaults to the target host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_name: Option<String>,
}

impl Default for ClientTlsSettings {
    fn default() -> Self {
        Self {
            secure: false,
            ca_cert_path: default_ca_cert_path(),
            domain_name: None,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            targets: Vec::new(),
            service: ServiceKind::default(),
            port: default_port(),
            repeat: default_repeat(),
            delay: DelayPolicy::default(),
            tls: ClientTlsSettings::default(),
            message: default_message(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ClientConfig {
    /// Create a Figment configuration with all sources merged.
    ///
    /// Sources in priority order (lowest to highest):
    /// 1. Code defaults
    /// 2. TOML file from `DUPLEX_CLIENT_CONFIG_PATH`
    /// 3. `GRPC_CLIENT_PORT`, `GRPC_CERT_PATH`
    /// 4. `DUPLEX_CLIENT_*`, `DUPLEX_DELAY_*`, `DUPLEX_CLIENT_TLS_*`
    pub fn figment() -> Figment {
        let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_default();

        Figment::new()
            .merge(Serialized::defaults(ClientConfig::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::raw().only(&["GRPC_CLIENT_PORT"]).map(|_| "port".into()))
            .merge(
                Env::raw()
                    .only(&["GRPC_CERT_PATH"])
                    .map(|_| "tls.ca_cert_path".into()),
            )
            // DUPLEX_CLIENT_TARGETS, DUPLEX_CLIENT_SERVICE, DUPLEX_CLIENT_REPEAT, ...
            .merge(Env::prefixed("DUPLEX_CLIENT_"))
            // DUPLEX_DELAY_MODE, DUPLEX_DELAY_FIXED_SECS, ...
            .merge(
                Env::prefixed("DUPLEX_DELAY_")
                    .map(|k| format!("delay.{}", k.as_str().to_lowercase()).into()),
            )
            // DUPLEX_CLIENT_TLS_SECURE, DUPLEX_CLIENT_TLS_CA_CERT_PATH, ...
            .merge(
                Env::prefixed("DUPLEX_CLIENT_TLS_")
                    .map(|k| format!("tls.{}", k.as_str().to_lowercase()).into()),
            )
    }

    /// Load configuration from the default figment (env and files).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::extract_from(Self::figment())
    }

    /// Build a figment from defaults, then merge a provider with highest priority.
    ///
    /// # Example
    /// ```rust,ignore
    /// let figment = ClientConfig::figment_with(("targets", "a:50051,b:50051"));
    /// let config = ClientConfig::extract_from(figment)?;
    /// ```
    pub fn figment_with<T: Provider>(extra: T) -> Figment {
        Self::figment().merge(extra)
    }

    /// Extract, validate, and check every target parses.
    pub fn extract_from<T: Provider>(provider: T) -> Result<Self, ConfigError> {
        let config: Self = Figment::from(provider)
            .extract()
            .map_err(|e| ConfigError::Extraction(Box::new(e)))?;
        config.validate()?;
        config.resolve_targets()?;
        Ok(config)
    }

    /// Targets in configured order, bare hosts completed with [`ClientConfig::port`].
    pub fn resolve_targets(&self) -> Result<Vec<Target>, ConfigError> {
        Target::parse_all(&self.targets, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.connect_timeout_secs).unwrap_or_default()
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.request_timeout_secs)
            .ok()
            .filter(|timeout| !timeout.is_zero())
    }
}

fn deserialize_target_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TargetList {
        List(Vec<String>),
        Csv(String),
    }

    Ok(match TargetList::deserialize(deserializer)? {
        TargetList::List(entries) => entries
            .iter()
            .flat_map(|entry| split_target_list(entry))
            .collect(),
        TargetList::Csv(csv) => split_target_list(&csv),
    })
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_repeat() -> u64 {
    1
}

fn default_message() -> String {
    "Hello Server you there?".to_string()
}

fn default_ca_cert_path() -> PathBuf {
    PathBuf::from("./certs/server.crt")
}

fn default_connect_timeout_secs() -> f64 {
    5.0
}

fn default_request_timeout_secs() -> f64 {
    30.0
}
