// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Duplex RPC: a gRPC client/server pair exercising a unary call and a
//! bidirectional streaming call over optionally TLS-encrypted channels.
//!
//! - [`server::DuplexServer`] hosts both services behind a bounded worker pool.
//! - [`retry::RetryLoop`] visits a list of targets with one of the two call shapes,
//!   isolating per-target failures and pacing attempts with a [`config::DelayPolicy`].

pub mod bidirectional;
pub mod channel;
pub mod config;
pub mod error;
pub mod identity;
pub mod logging;
pub mod retry;
pub mod server;
pub mod unary;

/// Generated protobuf types and service stubs.
pub mod proto {
    pub mod unary {
        tonic::include_proto!("unary");
    }

    pub mod bidirectional {
        tonic::include_proto!("bidirectional");
    }
}

pub use channel::ChannelFactory;
pub use config::{ClientConfig, ConfigError, ServerConfig, ServiceKind, Target};
pub use error::{AttemptError, ChannelError, RpcError};
pub use identity::ServerIdentity;
pub use retry::{AttemptOutcome, LoopSummary, RetryLoop, ServiceClient, TargetCaller};
pub use server::{DuplexServer, WorkerPool};
