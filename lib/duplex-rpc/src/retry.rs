// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Client control loop.
//!
//! The loop visits every target in order, once per pass, for `repeat` passes
//! (`0` runs until cancelled). Each attempt opens a fresh channel and drives the
//! selected service. A failed attempt is logged once and tallied; it never stops
//! the loop. After every attempt, successful or not, the loop sleeps for a delay
//! drawn from the [`DelayPolicy`].
//!
//! Cancellation is checked before each attempt and cuts a pending delay short. An
//! attempt that has already started is allowed to finish.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::bidirectional;
use crate::channel::ChannelFactory;
use crate::config::{ClientConfig, ConfigError, DelayMode, DelayPolicy, ServiceKind, Target};
use crate::error::AttemptError;
use crate::proto::unary::MessageResponse;
use crate::unary;

/// Result of one successful attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Unary(MessageResponse),
    /// Echoes in arrival order.
    Bidirectional(Vec<String>),
}

/// One attempt against one target: open a channel and invoke a service.
#[async_trait]
pub trait TargetCaller: Send + Sync {
    async fn attempt(&self, target: &Target) -> Result<AttemptOutcome, AttemptError>;
}

/// The service the client drives, chosen once at startup.
#[derive(Debug, Clone)]
pub enum ServiceClient {
    Unary {
        factory: ChannelFactory,
        message: String,
    },
    Bidirectional {
        factory: ChannelFactory,
    },
}

impl ServiceClient {
    pub fn new(kind: ServiceKind, factory: ChannelFactory, message: impl Into<String>) -> Self {
        match kind {
            ServiceKind::Unary => ServiceClient::Unary {
                factory,
                message: message.into(),
            },
            ServiceKind::Bidirectional => ServiceClient::Bidirectional { factory },
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(
            config.service,
            ChannelFactory::from_config(config),
            config.message.clone(),
        )
    }

    pub fn kind(&self) -> ServiceKind {
        match self {
            ServiceClient::Unary { .. } => ServiceKind::Unary,
            ServiceClient::Bidirectional { .. } => ServiceKind::Bidirectional,
        }
    }

    fn factory(&self) -> &ChannelFactory {
        match self {
            ServiceClient::Unary { factory, .. } | ServiceClient::Bidirectional { factory } => {
                factory
            }
        }
    }
}

#[async_trait]
impl TargetCaller for ServiceClient {
    async fn attempt(&self, target: &Target) -> Result<AttemptOutcome, AttemptError> {
        let channel = self.factory().open(target).await?;
        match self {
            ServiceClient::Unary { message, .. } => {
                let response = unary::call(channel, message.clone()).await?;
                Ok(AttemptOutcome::Unary(response))
            }
            ServiceClient::Bidirectional { .. } => {
                let echoes = bidirectional::run(channel).await?;
                Ok(AttemptOutcome::Bidirectional(echoes))
            }
        }
    }
}

/// Attempt counts for one entry of the target list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetTally {
    pub target: Target,
    pub successes: u64,
    pub failures: u64,
}

/// What a finished loop did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopSummary {
    pub passes_completed: u64,
    pub attempts: u64,
    /// Stopped by cancellation rather than by reaching the repeat count.
    pub interrupted: bool,
    /// One tally per configured target, in configured order.
    pub targets: Vec<TargetTally>,
}

impl LoopSummary {
    fn new(targets: &[Target]) -> Self {
        Self {
            passes_completed: 0,
            attempts: 0,
            interrupted: false,
            targets: targets
                .iter()
                .map(|target| TargetTally {
                    target: target.clone(),
                    successes: 0,
                    failures: 0,
                })
                .collect(),
        }
    }

    pub fn successes(&self) -> u64 {
        self.targets.iter().map(|t| t.successes).sum()
    }

    pub fn failures(&self) -> u64 {
        self.targets.iter().map(|t| t.failures).sum()
    }
}

pub struct RetryLoop<C> {
    targets: Vec<Target>,
    policy: DelayPolicy,
    repeat: u64,
    caller: C,
    cancel_token: CancellationToken,
    span: tracing::Span,
}

impl RetryLoop<ServiceClient> {
    pub fn from_config(
        config: &ClientConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            config.resolve_targets()?,
            config.delay.clone(),
            config.repeat,
            ServiceClient::from_config(config),
            cancel_token,
        ))
    }
}

impl<C: TargetCaller> RetryLoop<C> {
    pub fn new(
        targets: Vec<Target>,
        policy: DelayPolicy,
        repeat: u64,
        caller: C,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            targets,
            policy,
            repeat,
            caller,
            cancel_token,
            span: tracing::info_span!("retry_loop"),
        }
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    /// Run to completion or cancellation.
    pub async fn run(self) -> LoopSummary {
        let span = self.span.clone();
        self.run_passes().instrument(span).await
    }

    async fn run_passes(self) -> LoopSummary {
        let mut summary = LoopSummary::new(&self.targets);

        if self.targets.is_empty() {
            tracing::warn!("No targets configured, nothing to do");
            return summary;
        }

        while self.repeat == 0 || summary.passes_completed < self.repeat {
            if self.cancel_token.is_cancelled() {
                summary.interrupted = true;
                break;
            }

            tracing::info!("Starting iteration {}", summary.passes_completed + 1);

            for (index, target) in self.targets.iter().enumerate() {
                if self.cancel_token.is_cancelled() {
                    summary.interrupted = true;
                    break;
                }

                tracing::info!("Trying to connect to {target}");
                summary.attempts += 1;

                match self.caller.attempt(target).await {
                    Ok(outcome) => {
                        summary.targets[index].successes += 1;
                        tracing::debug!(endpoint = %target, ?outcome, "Attempt succeeded");
                    }
                    Err(e) => {
                        summary.targets[index].failures += 1;
                        tracing::error!(endpoint = %target, "Attempt failed: {e}");
                    }
                }

                self.pause().await;
            }

            if summary.interrupted {
                break;
            }
            summary.passes_completed += 1;
        }

        if summary.interrupted {
            tracing::info!(
                passes_completed = summary.passes_completed,
                "Interrupted, stopping before the next attempt"
            );
        }
        summary
    }

    async fn pause(&self) {
        let delay = self.policy.next_delay();
        if self.policy.mode == DelayMode::Random {
            tracing::info!("Sleeping for {:.2} seconds", delay.as_secs_f64());
        }

        tokio::select! {
            _ = self.cancel_token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}
