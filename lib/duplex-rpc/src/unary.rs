// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Unary call: one request, one response.

use tonic::transport::Channel;
use tonic::{Request, Response, Status};
use tracing::Instrument;

use crate::error::RpcError;
use crate::identity::ServerIdentity;
use crate::proto::unary::{
    Message, MessageResponse,
    unary_client::UnaryClient,
    unary_server::{Unary, UnaryServer},
};
use crate::server::WorkerPool;

/// Server side of the unary call.
#[derive(Debug, Clone)]
pub struct UnaryService {
    identity: ServerIdentity,
    workers: WorkerPool,
    span: tracing::Span,
}

impl UnaryService {
    pub fn new(identity: ServerIdentity, workers: WorkerPool) -> Self {
        Self {
            identity,
            workers,
            span: tracing::info_span!("unary"),
        }
    }

    pub fn into_server(self) -> UnaryServer<Self> {
        UnaryServer::new(self)
    }
}

/// Reply text for a request from `peer` carrying `text`.
pub fn response_text(hostname: &str, peer: &str, text: &str) -> String {
    format!("Hello from {hostname} at {peer}! received your message: {text}")
}

#[tonic::async_trait]
impl Unary for UnaryService {
    async fn get_server_response(
        &self,
        request: Request<Message>,
    ) -> Result<Response<MessageResponse>, Status> {
        let _worker = self.workers.acquire().await?;
        let (hostname, peer) = self.identity.resolve(&request);
        let text = request.into_inner().message;

        tracing::info!(parent: &self.span, %peer, %hostname, "Processed request: {text}");

        Ok(Response::new(MessageResponse {
            message: response_text(&hostname, &peer, &text),
            received: true,
        }))
    }
}

/// Issue exactly one unary request over `channel`.
pub async fn call(channel: Channel, text: impl Into<String>) -> Result<MessageResponse, RpcError> {
    let span = tracing::info_span!("unary");
    async move {
        let mut client = UnaryClient::new(channel);
        let response = client
            .get_server_response(Message {
                message: text.into(),
            })
            .await?
            .into_inner();

        tracing::info!(received = response.received, "{}", response.message);
        Ok(response)
    }
    .instrument(span)
    .await
}
