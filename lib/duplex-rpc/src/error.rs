// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Errors raised while opening channels and issuing calls.
//!
//! Configuration failures live in [`crate::config::ConfigError`]; they are fatal and
//! surface before any channel is opened. Everything in this module is recoverable at
//! the attempt boundary of the [`crate::retry::RetryLoop`].

use std::io;
use std::path::{Path, PathBuf};

use tonic::{Code, Status};

/// Failure to build a transport channel or listener.
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    #[error("certificate file not found: {}", path.display())]
    CertificateNotFound { path: PathBuf },

    #[error("permission denied reading certificate file: {}", path.display())]
    CertificatePermissionDenied { path: PathBuf },

    #[error("transport setup failed: {context}: {source}")]
    TransportSetup {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ChannelError {
    /// Classify an I/O error raised while reading credential material at `path`.
    pub fn from_io(path: &Path, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => ChannelError::CertificateNotFound {
                path: path.to_path_buf(),
            },
            io::ErrorKind::PermissionDenied => ChannelError::CertificatePermissionDenied {
                path: path.to_path_buf(),
            },
            _ => ChannelError::TransportSetup {
                context: format!("failed to read {}", path.display()),
                source: Box::new(err),
            },
        }
    }

    pub(crate) fn transport(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ChannelError::TransportSetup {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// A network, timeout or protocol failure reported by the transport for one call.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("rpc failed with status {code:?}: {message}")]
pub struct RpcError {
    pub code: Code,
    pub message: String,
}

impl From<Status> for RpcError {
    fn from(status: Status) -> Self {
        RpcError {
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Why a single attempt against a single target failed.
#[derive(thiserror::Error, Debug)]
pub enum AttemptError {
    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The duplex stream broke after some echoes had already arrived.
    #[error("stream aborted after {} echoes: {source}", received.len())]
    StreamAborted {
        received: Vec<String>,
        #[source]
        source: RpcError,
    },
}

impl AttemptError {
    /// Echoes that made it back before a bidirectional call failed.
    pub fn partial_echoes(&self) -> &[String] {
        match self {
            AttemptError::StreamAborted { received, .. } => received,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_not_found_maps_to_certificate_not_found() {
        let err = ChannelError::from_io(
            Path::new("/missing/ca.crt"),
            io::Error::from(io::ErrorKind::NotFound),
        );
        assert!(matches!(err, ChannelError::CertificateNotFound { ref path } if path == Path::new("/missing/ca.crt")));
    }

    #[test]
    fn test_io_permission_denied_maps_to_permission_error() {
        let err = ChannelError::from_io(
            Path::new("/root/ca.crt"),
            io::Error::from(io::ErrorKind::PermissionDenied),
        );
        assert!(matches!(err, ChannelError::CertificatePermissionDenied { .. }));
    }

    #[test]
    fn test_other_io_maps_to_transport_setup() {
        let err = ChannelError::from_io(
            Path::new("/dev/ca.crt"),
            io::Error::other("device busy"),
        );
        assert!(matches!(err, ChannelError::TransportSetup { .. }));
        assert!(err.to_string().contains("/dev/ca.crt"));
    }

    #[test]
    fn test_rpc_error_from_status() {
        let err = RpcError::from(Status::unavailable("connection refused"));
        assert_eq!(err.code, Code::Unavailable);
        assert_eq!(err.message, "connection refused");
    }

    #[test]
    fn test_partial_echoes() {
        let err = AttemptError::StreamAborted {
            received: vec!["First message".to_string()],
            source: RpcError::from(Status::aborted("reset")),
        };
        assert_eq!(err.partial_echoes(), ["First message".to_string()]);
        assert!(err.to_string().contains("after 1 echoes"));

        let err = AttemptError::Rpc(RpcError::from(Status::internal("boom")));
        assert!(err.partial_echoes().is_empty());
    }
}
