// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::Parser;
use duplex_rpc::{DuplexServer, ServerConfig, logging};
use figment::Figment;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Parser)]
#[command(name = "duplex-server")]
#[command(about = "Serve the unary and bidirectional gRPC services")]
struct Args {
    /// IP address to bind to
    #[arg(long)]
    ip: Option<String>,

    /// Port to bind to
    #[arg(long)]
    port: Option<u16>,

    /// Serve over TLS
    #[arg(long)]
    secure: bool,

    /// Number of calls served at once
    #[arg(long)]
    workers: Option<usize>,

    /// Certificate chain presented to clients
    #[arg(long)]
    cert_path: Option<String>,

    /// Private key for the certificate
    #[arg(long)]
    key_path: Option<String>,

    /// Host name reported in unary responses
    #[arg(long)]
    hostname: Option<String>,
}

impl Args {
    fn into_figment(self) -> Figment {
        let mut figment = ServerConfig::figment();

        if let Some(ip) = self.ip {
            figment = figment.merge(("ip", ip));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("port", port));
        }
        if self.secure {
            figment = figment.merge(("tls.secure", true));
        }
        if let Some(workers) = self.workers {
            figment = figment.merge(("workers", workers));
        }
        if let Some(path) = self.cert_path {
            figment = figment.merge(("tls.cert_path", path));
        }
        if let Some(path) = self.key_path {
            figment = figment.merge(("tls.key_path", path));
        }
        if let Some(hostname) = self.hostname {
            figment = figment.merge(("hostname", hostname));
        }

        figment
    }
}

fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let config = ServerConfig::extract_from(args.into_figment())
        .context("invalid server configuration")?;

    // one runtime thread per worker
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.workers)
        .thread_name("duplex-server")
        .enable_all()
        .build()
        .context("failed to build tokio runtime")?;

    runtime.block_on(serve(config))
}

async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let bind_addr = config.bind_addr()?;
    let server = DuplexServer::from_config(&config)
        .await
        .context("failed to load server credentials")?;

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, shutting down");
            signal_token.cancel();
        }
    });

    server
        .run(bind_addr, cancel_token)
        .await
        .with_context(|| format!("server on {bind_addr} failed"))
}
