// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for messaging session events:
//! * Connection lifecycle and state transitions
//! * Per-message delivery and acknowledgment
//! * Forced shutdowns and callback failures

use crate::messaging::{MessageId, QoS, SessionState};
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Session connected and its threads are running.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SessionConnected<'a> {
    pub client_id: &'a str,
    pub broker_address: &'a str,
    pub clean_session: bool,
}

impl Display for SessionConnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' connected to {} (clean_session={})",
            self.client_id, self.broker_address, self.clean_session
        )
    }
}

impl StructuredLog for SessionConnected<'_> {
    fn log(&self) {
        tracing::info!(
            client_id = self.client_id,
            broker_address = self.broker_address,
            clean_session = self.clean_session,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "session",
            span_name = name,
            client_id = self.client_id,
            broker_address = self.broker_address,
        )
    }
}

/// Broker refused or could not be reached.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct SessionConnectFailed<'a> {
    pub client_id: &'a str,
    pub broker_address: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for SessionConnectFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' failed to connect to {}: {}",
            self.client_id, self.broker_address, self.error
        )
    }
}

impl StructuredLog for SessionConnectFailed<'_> {
    fn log(&self) {
        tracing::error!(
            client_id = self.client_id,
            broker_address = self.broker_address,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "session_connect_failed",
            span_name = name,
            client_id = self.client_id,
            error = %self.error,
        )
    }
}

/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct SessionStateChanged<'a> {
    pub client_id: &'a str,
    pub from: SessionState,
    pub to: SessionState,
}

impl Display for SessionStateChanged<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' {} -> {}",
            self.client_id, self.from, self.to
        )
    }
}

impl StructuredLog for SessionStateChanged<'_> {
    fn log(&self) {
        tracing::debug!(
            client_id = self.client_id,
            from = %self.from,
            to = %self.to,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "session_state",
            span_name = name,
            client_id = self.client_id,
            to = %self.to,
        )
    }
}

/// A message is about to be handed to `message_arrived`.
///
/// # Log Level
/// `trace!` - One per message, before the handler runs
pub struct MessageArrived<'a> {
    pub client_id: &'a str,
    pub topic: &'a str,
    pub message_id: MessageId,
    pub qos: QoS,
    pub duplicate: bool,
}

impl Display for MessageArrived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' received message {} from '{}' (qos {}{})",
            self.client_id,
            self.message_id,
            self.topic,
            self.qos,
            if self.duplicate { ", redelivery" } else { "" }
        )
    }
}

impl StructuredLog for MessageArrived<'_> {
    fn log(&self) {
        tracing::trace!(
            client_id = self.client_id,
            topic = self.topic,
            message_id = self.message_id.0,
            qos = self.qos.level(),
            duplicate = self.duplicate,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "message",
            span_name = name,
            client_id = self.client_id,
            topic = self.topic,
            message_id = self.message_id.0,
        )
    }
}

/// Handler accepted a message and, for QoS >= 1, the broker was acknowledged.
///
/// # Log Level
/// `debug!` - One per message
pub struct MessageDelivered<'a> {
    pub client_id: &'a str,
    pub topic: &'a str,
    pub message_id: MessageId,
    pub qos: QoS,
    pub duration: Duration,
}

impl Display for MessageDelivered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' delivered message {} from '{}' (qos {}) in {:?}",
            self.client_id, self.message_id, self.topic, self.qos, self.duration
        )
    }
}

impl StructuredLog for MessageDelivered<'_> {
    fn log(&self) {
        tracing::debug!(
            client_id = self.client_id,
            topic = self.topic,
            message_id = self.message_id.0,
            qos = self.qos.level(),
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "delivery",
            span_name = name,
            client_id = self.client_id,
            topic = self.topic,
            message_id = self.message_id.0,
        )
    }
}

/// Graceful disconnect completed.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SessionDisconnected<'a> {
    pub client_id: &'a str,
}

impl Display for SessionDisconnected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Session '{}' disconnected", self.client_id)
    }
}

impl StructuredLog for SessionDisconnected<'_> {
    fn log(&self) {
        tracing::info!(client_id = self.client_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("session_disconnected", span_name = name, client_id = self.client_id)
    }
}

/// Session was shut down without a graceful disconnect.
///
/// # Log Level
/// `warn!` for transport loss, `error!` when a handler rejected a message
pub struct SessionLost<'a> {
    pub client_id: &'a str,
    pub cause: &'a crate::errors::LostCause,
}

impl Display for SessionLost<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Session '{}' lost: {}", self.client_id, self.cause)
    }
}

impl StructuredLog for SessionLost<'_> {
    fn log(&self) {
        if self.cause.is_delivery_failure() {
            tracing::error!(client_id = self.client_id, cause = %self.cause, "{}", self);
        } else {
            tracing::warn!(client_id = self.client_id, cause = %self.cause, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "session_lost",
            span_name = name,
            client_id = self.client_id,
            cause = %self.cause,
        )
    }
}

/// Disconnect was called from the delivery thread and refused.
///
/// # Log Level
/// `warn!` - Programming error in a handler
pub struct DisconnectRejected<'a> {
    pub client_id: &'a str,
}

impl Display for DisconnectRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' refused disconnect from its own delivery thread",
            self.client_id
        )
    }
}

impl StructuredLog for DisconnectRejected<'_> {
    fn log(&self) {
        tracing::warn!(client_id = self.client_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("disconnect_rejected", span_name = name, client_id = self.client_id)
    }
}

/// # Log Level
/// `warn!` - Outbound messages may not have reached the broker
pub struct FlushFailed<'a> {
    pub client_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for FlushFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' could not flush pending publishes: {}",
            self.client_id, self.error
        )
    }
}

impl StructuredLog for FlushFailed<'_> {
    fn log(&self) {
        tracing::warn!(client_id = self.client_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "flush_failed",
            span_name = name,
            client_id = self.client_id,
            error = %self.error,
        )
    }
}

/// A terminal callback panicked. The session is already disconnected.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct CallbackPanicked<'a> {
    pub client_id: &'a str,
    pub callback: &'a str,
    pub panic: &'a str,
}

impl Display for CallbackPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Session '{}' {} callback panicked: {}",
            self.client_id, self.callback, self.panic
        )
    }
}

impl StructuredLog for CallbackPanicked<'_> {
    fn log(&self) {
        tracing::error!(
            client_id = self.client_id,
            callback = self.callback,
            panic = self.panic,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "callback_panicked",
            span_name = name,
            client_id = self.client_id,
            callback = self.callback,
        )
    }
}
