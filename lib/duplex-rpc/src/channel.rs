// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Channel construction for the client and credential loading for the server.
//!
//! Plaintext channels always open: they connect lazily, so an unreachable target shows
//! up as an [`crate::error::RpcError`] on first use. Secure channels read their PEM
//! material on every open and fail with a [`ChannelError`] when it is missing or
//! unreadable. There is no retry at this layer.

use std::path::Path;
use std::time::Duration;

use tonic::transport::{
    Certificate, Channel, ClientTlsConfig, Endpoint, Identity, ServerTlsConfig,
};

use crate::config::{ClientConfig, ClientTlsSettings, ServerTlsSettings, Target};
use crate::error::ChannelError;

/// Builds one channel per call to [`ChannelFactory::open`]. Channels are not cached.
#[derive(Debug, Clone)]
pub struct ChannelFactory {
    tls: ClientTlsSettings,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl ChannelFactory {
    pub fn new(tls: ClientTlsSettings) -> Self {
        Self {
            tls,
            connect_timeout: Duration::from_secs(5),
            request_timeout: None,
        }
    }

    pub fn plaintext() -> Self {
        Self::new(ClientTlsSettings::default())
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            tls: config.tls.clone(),
            connect_timeout: config.connect_timeout(),
            request_timeout: config.request_timeout(),
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn is_secure(&self) -> bool {
        self.tls.secure
    }

    /// Open a channel to `target`.
    pub async fn open(&self, target: &Target) -> Result<Channel, ChannelError> {
        let scheme = if self.tls.secure { "https" } else { "http" };
        let uri = format!("{}://{}", scheme, target.authority());

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|e| ChannelError::transport(format!("invalid endpoint {uri}"), e))?
            .tcp_nodelay(true)
            .connect_timeout(self.connect_timeout);

        if let Some(timeout) = self.request_timeout {
            endpoint = endpoint.timeout(timeout);
        }

        if self.tls.secure {
            let ca = read_pem(&self.tls.ca_cert_path).await?;
            let domain = self
                .tls
                .domain_name
                .clone()
                .unwrap_or_else(|| target.host().to_string());

            let tls = ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(ca))
                .domain_name(domain);

            endpoint = endpoint
                .tls_config(tls)
                .map_err(|e| ChannelError::transport("failed to apply client tls config", e))?;

            tracing::debug!(endpoint = %target, ca = %self.tls.ca_cert_path.display(), "Opened secure channel");
        } else {
            tracing::debug!(endpoint = %target, "Opened plaintext channel");
        }

        Ok(endpoint.connect_lazy())
    }
}

/// Load the server's key and certificate chain. `Ok(None)` when TLS is disabled.
pub async fn server_tls_config(
    settings: &ServerTlsSettings,
) -> Result<Option<ServerTlsConfig>, ChannelError> {
    if !settings.secure {
        return Ok(None);
    }

    let cert = read_pem(&settings.cert_path).await?;
    let key = read_pem(&settings.key_path).await?;

    tracing::info!(
        cert = %settings.cert_path.display(),
        key = %settings.key_path.display(),
        "Loaded server credentials"
    );

    Ok(Some(
        ServerTlsConfig::new().identity(Identity::from_pem(cert, key)),
    ))
}

/// Read a PEM file, classifying failures by cause.
pub async fn read_pem(path: &Path) -> Result<Vec<u8>, ChannelError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| ChannelError::from_io(path, e))
}
