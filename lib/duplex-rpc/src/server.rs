// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! gRPC server hosting both the unary and the bidirectional service.
//!
//! Calls are admitted through a fixed-size [`WorkerPool`]. Nothing else is shared
//! between calls: each handler sees its own request plus the immutable
//! [`ServerIdentity`] and credentials fixed at startup.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;
use tonic::transport::server::Router;
use tonic::transport::{Server, ServerTlsConfig};
use tracing::Instrument;

use crate::bidirectional::BidirectionalService;
use crate::channel::server_tls_config;
use crate::config::ServerConfig;
use crate::error::ChannelError;
use crate::identity::ServerIdentity;
use crate::unary::UnaryService;

/// Bounded pool of call slots shared by both services.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free worker. The worker returns to the pool when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, Status> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| Status::unavailable("server is shutting down"))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Refuse new calls. Calls already holding a worker run to completion.
    pub fn close(&self) {
        self.permits.close();
    }
}

pub struct DuplexServer {
    identity: ServerIdentity,
    workers: WorkerPool,
    tls: Option<ServerTlsConfig>,
    span: tracing::Span,
}

impl DuplexServer {
    pub fn new(identity: ServerIdentity, workers: usize) -> Self {
        Self {
            identity,
            workers: WorkerPool::new(workers),
            tls: None,
            span: tracing::info_span!("duplex_server"),
        }
    }

    pub fn with_tls(mut self, tls: ServerTlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Build a server from configuration. Missing or unreadable credentials are fatal
    /// here, before anything is bound.
    pub async fn from_config(config: &ServerConfig) -> Result<Self, ChannelError> {
        let identity = ServerIdentity::resolve_local(config.hostname.as_deref());
        let mut server = Self::new(identity, config.workers);
        if let Some(tls) = server_tls_config(&config.tls).await? {
            server = server.with_tls(tls);
        }
        Ok(server)
    }

    pub fn identity(&self) -> &ServerIdentity {
        &self.identity
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.workers
    }

    pub fn is_secure(&self) -> bool {
        self.tls.is_some()
    }

    fn router(&self) -> Result<Router, ChannelError> {
        let mut builder = Server::builder();
        if let Some(tls) = &self.tls {
            builder = builder
                .tls_config(tls.clone())
                .map_err(|e| ChannelError::transport("invalid server tls config", e))?;
        }

        let unary = UnaryService::new(self.identity.clone(), self.workers.clone());
        let echo = BidirectionalService::new(self.workers.clone());

        Ok(builder
            .add_service(unary.into_server())
            .add_service(echo.into_server()))
    }

    /// Bind `addr` and serve until `cancel_token` fires.
    pub async fn run(
        self,
        addr: SocketAddr,
        cancel_token: CancellationToken,
    ) -> Result<(), ChannelError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ChannelError::transport(format!("failed to bind {addr}"), e))?;
        self.run_with_listener(listener, cancel_token).await
    }

    /// Serve on a pre-bound listener until `cancel_token` fires.
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        cancel_token: CancellationToken,
    ) -> Result<(), ChannelError> {
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChannelError::transport("failed to read listener address", e))?;
        let router = self.router()?;
        let workers = self.workers.clone();
        let span = self.span.clone();

        async move {
            tracing::info!(
                hostname = %self.identity.hostname(),
                workers = workers.size(),
                secure = self.tls.is_some(),
                "Server started, listening on {local_addr}"
            );

            let shutdown = {
                let workers = workers.clone();
                async move {
                    cancel_token.cancelled().await;
                    tracing::info!("Shutdown requested, draining in-flight calls");
                    workers.close();
                }
            };

            router
                .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
                .await
                .map_err(|e| ChannelError::transport("server terminated", e))?;

            tracing::info!("Server shut down");
            Ok(())
        }
        .instrument(span)
        .await
    }
}
