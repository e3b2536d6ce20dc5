// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The seam between a session and the wire.
//!
//! A [`Transport`] speaks the publish/subscribe protocol for one client
//! connection. Sessions only rely on the guarantees listed on each method;
//! packet encoding, keep-alive pings and socket handling live behind it.

use std::sync::Arc;
use std::time::Duration;

use crate::errors::{ConnectError, TransportError};

use super::message::{ArrivedMessage, ConnectOptions, MessageId, QoS};

pub trait Transport: Send + Sync {
    /// Open the connection. Fails if the broker is unreachable or rejects
    /// the credentials.
    fn connect(&self, options: &ConnectOptions) -> Result<(), ConnectError>;

    /// Queue a publish. Must not wait for the broker's acknowledgment, and
    /// publishes issued one after another must reach the wire in that order.
    fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), TransportError>;

    fn subscribe(&self, topic_filter: &str, qos: QoS) -> Result<(), TransportError>;

    fn unsubscribe(&self, topic_filter: &str) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next inbound message. `Ok(None)` means
    /// nothing arrived in time. An error ends the connection; after
    /// [`Transport::close`] it returns [`TransportError::Closed`].
    fn poll(&self, timeout: Duration) -> Result<Option<ArrivedMessage>, TransportError>;

    /// Send the protocol acknowledgment (PUBACK / PUBREC) for a delivery.
    fn acknowledge(&self, message_id: MessageId) -> Result<(), TransportError>;

    /// Block until every queued QoS >= 1 publish has been handed to the broker.
    fn flush(&self) -> Result<(), TransportError>;

    fn close(&self);
}

/// Produces a transport for a broker address. One transport per session.
pub trait TransportFactory: Send + Sync {
    fn create(&self, broker_address: &str) -> Result<Arc<dyn Transport>, ConnectError>;
}
