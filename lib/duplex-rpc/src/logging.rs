// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Logging setup shared by the client and server binaries.
//!
//! - Filters come from the `DUPLEX_LOG` environment variable (EnvFilter syntax), the
//!   default level is `info`. Chatty transport crates are held at `error` unless
//!   `DUPLEX_LOG` names them explicitly.
//! - Output is READABLE by default. Set `DUPLEX_LOGGING_JSONL=1` for one JSON object
//!   per line.
//! - Set `DUPLEX_DISABLE_ANSI_LOGGING=1` to strip colour codes.
//!
//! The library itself only emits `tracing` events inside per-component spans; it never
//! installs a subscriber on its own.

use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// ENV used to set the log filter
const FILTER_ENV: &str = "DUPLEX_LOG";

/// ENV switching to JSONL output
const JSONL_ENV: &str = "DUPLEX_LOGGING_JSONL";

/// ENV disabling ANSI colours
const DISABLE_ANSI_ENV: &str = "DUPLEX_DISABLE_ANSI_LOGGING";

/// Default log level
const DEFAULT_FILTER_LEVEL: &str = "info";

/// Crates whose own logging is too noisy at `info`.
const QUIET_TARGETS: [&str; 5] = ["h2", "tower", "hyper_util", "rustls", "tonic"];

/// Once instance to ensure the logger is only initialized once
static INIT: Once = Once::new();

/// Initialize the logger
pub fn init() {
    INIT.call_once(setup_logging);
}

fn setup_logging() {
    let filter_layer = filters(std::env::var(FILTER_ENV).ok().as_deref());

    if env_is_truthy(JSONL_ENV) {
        let l = fmt::layer()
            .json()
            .with_ansi(false)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .with_filter(filter_layer);
        tracing_subscriber::registry().with(l).init();
    } else {
        let l = fmt::layer()
            .compact()
            .with_ansi(!env_is_truthy(DISABLE_ANSI_ENV))
            .with_writer(std::io::stderr)
            .with_filter(filter_layer);
        tracing_subscriber::registry().with(l).init();
    }
}

fn filters(directives: Option<&str>) -> EnvFilter {
    let directives = directives.unwrap_or_default();
    let mut filter_layer = EnvFilter::builder()
        .with_default_directive(
            DEFAULT_FILTER_LEVEL
                .parse()
                .unwrap_or_else(|_| tracing::level_filters::LevelFilter::INFO.into()),
        )
        .parse_lossy(directives);

    // quiet transport crates unless the user asked about them
    for target in QUIET_TARGETS {
        if directives.contains(target) {
            continue;
        }
        match format!("{target}=error").parse::<Directive>() {
            Ok(d) => {
                filter_layer = filter_layer.add_directive(d);
            }
            Err(e) => {
                eprintln!("Failed parsing filter for module '{target}': {e}");
            }
        }
    }
    filter_layer
}

fn env_is_truthy(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
