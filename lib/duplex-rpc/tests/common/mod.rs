// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Shared helpers for the client/server integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Once;

use duplex_rpc::proto::bidirectional::{
    Message,
    bidirectional_server::{Bidirectional, BidirectionalServer},
};
use duplex_rpc::config::{ClientTlsSettings, ServerTlsSettings};
use duplex_rpc::{
    ChannelError, ChannelFactory, DuplexServer, ServerConfig, ServerIdentity, Target, WorkerPool,
};
use futures::Stream;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status, Streaming};
use tracing_subscriber::FmtSubscriber;

pub const TEST_HOSTNAME: &str = "test-host";

/// Name the generated server certificates are issued for.
pub const TLS_DOMAIN: &str = "localhost";

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = FmtSubscriber::builder()
            .with_env_filter("duplex_rpc=debug")
            .with_test_writer()
            .try_init();
    });
}

/// A server running on an OS-assigned loopback port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub workers: WorkerPool,
    token: CancellationToken,
    handle: JoinHandle<Result<(), ChannelError>>,
}

impl TestServer {
    pub async fn start(workers: usize) -> Self {
        Self::spawn(DuplexServer::new(ServerIdentity::new(TEST_HOSTNAME), workers)).await
    }

    /// Start a TLS server presenting `credentials`.
    pub async fn start_secure(workers: usize, credentials: &TestCredentials) -> Self {
        let config = ServerConfig {
            ip: "127.0.0.1".to_string(),
            port: 0,
            workers,
            hostname: Some(TEST_HOSTNAME.to_string()),
            tls: ServerTlsSettings {
                secure: true,
                cert_path: credentials.cert_path.clone(),
                key_path: credentials.key_path.clone(),
            },
        };
        let server = DuplexServer::from_config(&config).await.unwrap();
        assert!(server.is_secure());
        Self::spawn(server).await
    }

    async fn spawn(server: DuplexServer) -> Self {
        init_tracing();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let token = CancellationToken::new();

        let workers = server.workers().clone();
        let handle = tokio::spawn(server.run_with_listener(listener, token.clone()));

        Self {
            addr,
            workers,
            token,
            handle,
        }
    }

    pub fn target(&self) -> Target {
        Target::new("127.0.0.1", self.addr.port()).unwrap()
    }

    pub async fn shutdown(self) {
        self.token.cancel();
        self.handle.await.unwrap().unwrap();
    }
}

/// A self-signed certificate and its key, written to a temporary directory.
pub struct TestCredentials {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    _dir: TempDir,
}

impl TestCredentials {
    pub fn generate() -> Self {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![TLS_DOMAIN.to_string()]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let cert_path = dir.path().join("server.crt");
        let key_path = dir.path().join("server.key");
        std::fs::write(&cert_path, cert.pem()).unwrap();
        std::fs::write(&key_path, key_pair.serialize_pem()).unwrap();

        Self {
            cert_path,
            key_path,
            _dir: dir,
        }
    }

    /// A client factory that trusts this certificate.
    pub fn channel_factory(&self) -> ChannelFactory {
        ChannelFactory::new(ClientTlsSettings {
            secure: true,
            ca_cert_path: self.cert_path.clone(),
            domain_name: Some(TLS_DOMAIN.to_string()),
        })
    }
}

/// A loopback target with nothing listening on it.
pub fn unreachable_target() -> Target {
    let port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();
    Target::new("127.0.0.1", port).unwrap()
}

/// Echoes `limit` messages, then aborts the stream.
struct FlakyEcho {
    limit: usize,
}

#[tonic::async_trait]
impl Bidirectional for FlakyEcho {
    type GetServerResponseStream =
        Pin<Box<dyn Stream<Item = Result<Message, Status>> + Send + 'static>>;

    async fn get_server_response(
        &self,
        request: Request<Streaming<Message>>,
    ) -> Result<Response<Self::GetServerResponseStream>, Status> {
        let mut inbound = request.into_inner();
        let limit = self.limit;
        let output = async_stream::try_stream! {
            let mut echoed = 0;
            while let Some(message) = inbound.message().await? {
                if echoed == limit {
                    Err::<(), Status>(Status::aborted("connection reset by test server"))?;
                }
                echoed += 1;
                yield message;
            }
        };
        Ok(Response::new(Box::pin(output) as Self::GetServerResponseStream))
    }
}

/// Start a bidirectional server that fails after `limit` echoes.
pub async fn start_flaky_echo(limit: usize) -> (Target, CancellationToken) {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let token = CancellationToken::new();

    let shutdown = token.clone().cancelled_owned();
    tokio::spawn(async move {
        let _ = tonic::transport::Server::builder()
            .add_service(BidirectionalServer::new(FlakyEcho { limit }))
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await;
    });

    (Target::new("127.0.0.1", port).unwrap(), token)
}
