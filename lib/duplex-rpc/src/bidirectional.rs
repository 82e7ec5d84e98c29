// SPDX-FileCopyrightText: Copyright (c) 2025 NVIDIA CORPORATION & AFFILIATES. All rights reserved.
// SPDX-License-Identifier: Apache-2.0

//! Bidirectional streaming call.
//!
//! The server is an echo pump: every inbound message is sent straight back, in
//! arrival order, and the outbound half closes when the inbound half does.
//!
//! The client sends a fixed sequence of five messages from a producer task while the
//! calling task consumes echoes from the same call. The two halves are not run in
//! lock-step; the call is complete once the server closes its side.

use std::pin::Pin;

use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::transport::Channel;
use tonic::{Request, Response, Status, Streaming};
use tracing::Instrument;

use crate::error::{AttemptError, RpcError};
use crate::identity::peer_descriptor;
use crate::proto::bidirectional::{
    Message,
    bidirectional_client::BidirectionalClient,
    bidirectional_server::{Bidirectional, BidirectionalServer},
};
use crate::server::WorkerPool;

/// Contents of the outbound sequence, in send order.
pub const OUTBOUND_MESSAGES: [&str; 5] = [
    "First message",
    "Second message",
    "Third message",
    "Fourth message",
    "Fifth message",
];

/// Finite producer of the outbound sequence. Once drained it stays empty.
#[derive(Debug, Clone)]
pub struct OutboundMessages {
    inner: std::slice::Iter<'static, &'static str>,
}

impl OutboundMessages {
    pub fn new() -> Self {
        Self {
            inner: OUTBOUND_MESSAGES.iter(),
        }
    }
}

impl Default for OutboundMessages {
    fn default() -> Self {
        Self::new()
    }
}

impl Iterator for OutboundMessages {
    type Item = Message;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|text| Message {
            message: (*text).to_string(),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl ExactSizeIterator for OutboundMessages {}

/// Server side of the bidirectional call.
#[derive(Debug, Clone)]
pub struct BidirectionalService {
    workers: WorkerPool,
    span: tracing::Span,
}

impl BidirectionalService {
    pub fn new(workers: WorkerPool) -> Self {
        Self {
            workers,
            span: tracing::info_span!("bidirectional"),
        }
    }

    pub fn into_server(self) -> BidirectionalServer<Self> {
        BidirectionalServer::new(self)
    }
}

#[tonic::async_trait]
impl Bidirectional for BidirectionalService {
    type GetServerResponseStream =
        Pin<Box<dyn Stream<Item = Result<Message, Status>> + Send + 'static>>;

    async fn get_server_response(
        &self,
        request: Request<Streaming<Message>>,
    ) -> Result<Response<Self::GetServerResponseStream>, Status> {
        let worker = self.workers.acquire().await?;
        let peer = peer_descriptor(request.remote_addr());
        let mut inbound = request.into_inner();
        let span = self.span.clone();

        tracing::debug!(parent: &span, %peer, "Stream opened");

        let output = async_stream::try_stream! {
            // the worker stays checked out until the stream is dropped
            let _worker = worker;
            while let Some(message) = inbound.message().await? {
                tracing::info!(parent: &span, %peer, "Echoing: {}", message.message);
                yield message;
            }
            tracing::debug!(parent: &span, %peer, "Stream closed by client");
        };

        Ok(Response::new(Box::pin(output) as Self::GetServerResponseStream))
    }
}

/// Run one bidirectional call over `channel` and return the echoes in arrival order.
///
/// A failure after the stream was established returns
/// [`AttemptError::StreamAborted`] carrying the echoes received so far.
pub async fn run(channel: Channel) -> Result<Vec<String>, AttemptError> {
    let span = tracing::info_span!("bidirectional");
    async move {
        let mut client = BidirectionalClient::new(channel);
        let (tx, rx) = mpsc::channel::<Message>(OUTBOUND_MESSAGES.len());

        let producer = tokio::spawn(
            async move {
                for message in OutboundMessages::new() {
                    tracing::info!("Sending message: {}", message.message);
                    if tx.send(message).await.is_err() {
                        // the call is gone; nothing left to send to
                        break;
                    }
                }
            }
            .in_current_span(),
        );

        let mut inbound = match client.get_server_response(ReceiverStream::new(rx)).await {
            Ok(response) => response.into_inner(),
            Err(status) => {
                producer.abort();
                return Err(AttemptError::Rpc(status.into()));
            }
        };

        let mut received = Vec::with_capacity(OUTBOUND_MESSAGES.len());
        loop {
            match inbound.message().await {
                Ok(Some(message)) => {
                    tracing::info!("Received message: {}", message.message);
                    received.push(message.message);
                }
                Ok(None) => break,
                Err(status) => {
                    producer.abort();
                    return Err(AttemptError::StreamAborted {
                        received,
                        source: RpcError::from(status),
                    });
                }
            }
        }

        if let Err(e) = producer.await {
            tracing::warn!("Outbound producer did not finish cleanly: {e}");
        }

        Ok(received)
    }
    .instrument(span)
    .await
}
