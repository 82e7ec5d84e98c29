// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

use anyhow::Context;
use clap::Parser;
use duplex_rpc::config::DelayMode;
use duplex_rpc::{ClientConfig, RetryLoop, ServiceKind, logging};
use figment::Figment;
use tokio_util::sync::CancellationToken;

/// Command line arguments for the duplex client.
///
/// Every flag is optional; anything not given falls back to the environment, the
/// TOML file named by `DUPLEX_CLIENT_CONFIG_PATH`, then built-in defaults.
#[derive(Debug, Parser)]
#[command(name = "duplex-client")]
#[command(about = "Visit gRPC targets with unary or bidirectional calls")]
struct Args {
    /// Comma-separated list of server addresses (e.g. localhost:50051,localhost:50052)
    #[arg(long)]
    targets: Option<String>,

    /// Type of call to make: 'unary' or 'bidirectional'
    #[arg(long = "type", value_parser = parse_service_kind)]
    service: Option<ServiceKind>,

    /// Use a TLS channel
    #[arg(long)]
    secure: bool,

    /// Port for targets given without one
    #[arg(long)]
    port: Option<u16>,

    /// Number of passes over all targets (0 for infinite)
    #[arg(long)]
    repeat: Option<u64>,

    /// Delay between attempts: 'fixed' or 'random'
    #[arg(long, value_enum)]
    delay_mode: Option<DelayModeArg>,

    /// Fixed delay in seconds
    #[arg(long)]
    delay: Option<f64>,

    /// Minimum random delay in seconds
    #[arg(long)]
    random_min: Option<f64>,

    /// Maximum random delay in seconds
    #[arg(long)]
    random_max: Option<f64>,

    /// Root certificate used to verify the server
    #[arg(long)]
    cert_path: Option<String>,

    /// Request text for unary calls
    #[arg(long)]
    message: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum DelayModeArg {
    Fixed,
    Random,
}

impl From<DelayModeArg> for DelayMode {
    fn from(mode: DelayModeArg) -> Self {
        match mode {
            DelayModeArg::Fixed => DelayMode::Fixed,
            DelayModeArg::Random => DelayMode::Random,
        }
    }
}

fn parse_service_kind(raw: &str) -> Result<ServiceKind, String> {
    raw.parse().map_err(|e: duplex_rpc::ConfigError| e.to_string())
}

impl Args {
    /// Layer the flags that were given over the configuration figment.
    fn into_figment(self) -> Figment {
        let mut figment = ClientConfig::figment();

        if let Some(targets) = self.targets {
            figment = figment.merge(("targets", targets));
        }
        if let Some(service) = self.service {
            figment = figment.merge(("service", service.as_str()));
        }
        if self.secure {
            figment = figment.merge(("tls.secure", true));
        }
        if let Some(port) = self.port {
            figment = figment.merge(("port", port));
        }
        if let Some(repeat) = self.repeat {
            figment = figment.merge(("repeat", repeat));
        }
        if let Some(mode) = self.delay_mode {
            figment = figment.merge(("delay.mode", DelayMode::from(mode)));
        }
        if let Some(delay) = self.delay {
            figment = figment.merge(("delay.fixed_secs", delay));
        }
        if let Some(min) = self.random_min {
            figment = figment.merge(("delay.random_min_secs", min));
        }
        if let Some(max) = self.random_max {
            figment = figment.merge(("delay.random_max_secs", max));
        }
        if let Some(path) = self.cert_path {
            figment = figment.merge(("tls.ca_cert_path", path));
        }
        if let Some(message) = self.message {
            figment = figment.merge(("message", message));
        }

        figment
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args = Args::parse();
    let config = ClientConfig::extract_from(args.into_figment())
        .context("invalid client configuration")?;

    if let Some(err) = unreadable_root_certificate(&config) {
        // every attempt will fail until the file can be read
        tracing::warn!(
            "Root certificate {} cannot be read ({err}); secure attempts will fail",
            config.tls.ca_cert_path.display()
        );
    }

    tracing::info!(
        targets = ?config.targets,
        service = %config.service,
        repeat = config.repeat,
        secure = config.tls.secure,
        delay_mode = ?config.delay.mode,
        "Starting client"
    );

    let cancel_token = CancellationToken::new();
    let retry = RetryLoop::from_config(&config, cancel_token.clone())
        .context("invalid client configuration")?;

    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, finishing the current attempt");
            signal_token.cancel();
        }
    });

    let summary = retry.run().await;

    for tally in &summary.targets {
        tracing::info!(
            endpoint = %tally.target,
            successes = tally.successes,
            failures = tally.failures,
            "Target summary"
        );
    }
    tracing::info!(
        passes = summary.passes_completed,
        attempts = summary.attempts,
        successes = summary.successes(),
        failures = summary.failures(),
        interrupted = summary.interrupted,
        "Client finished"
    );

    Ok(())
}

/// Open the configured root certificate once, as every secure attempt will.
fn unreadable_root_certificate(config: &ClientConfig) -> Option<std::io::Error> {
    if !config.tls.secure {
        return None;
    }
    std::fs::File::open(&config.tls.ca_cert_path)
        .and_then(|file| file.metadata())
        .and_then(|meta| {
            if meta.is_file() {
                Ok(())
            } else {
                Err(std::io::Error::other("not a regular file"))
            }
        })
        .err()
}
