// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for messaging sessions and the transports beneath them.

use crate::messaging::{MessageId, SessionState};
use thiserror::Error;

/// Failure to open a connection to a broker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConnectError {
    #[error("Broker at '{0}' is unreachable")]
    Unreachable(String),

    #[error("Broker rejected the supplied credentials")]
    BadCredentials,

    #[error("Invalid broker address '{address}': {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("Client id '{0}' is already connected")]
    ClientIdInUse(String),

    /// The runtime was launched without any transport for this address.
    #[error("No messaging transport is available for '{0}'")]
    NoTransport(String),
}

/// Failures reported by a transport after the connection was established.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Keep-alive timeout")]
    KeepAliveTimeout,

    #[error("Transport is closed")]
    Closed,

    #[error("No in-flight message with id {0}")]
    UnknownPacket(MessageId),
}

/// Errors returned to callers of session operations.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Session is {0}, expected connected")]
    NotConnected(SessionState),

    #[error("Session is already {0}")]
    AlreadyActive(SessionState),

    /// Synchronous disconnect was requested from inside a handler callback.
    /// Disconnect drains through the delivery thread, so honoring the request
    /// there would wait on itself forever.
    #[error("Cannot disconnect a session from its own delivery thread")]
    DisconnectFromDeliveryThread,

    #[error("Invalid topic '{topic}': {reason}")]
    InvalidTopic { topic: String, reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Failed to start delivery thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Why a session ended through the `connection_lost` path.
#[derive(Error, Debug)]
pub enum LostCause {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Handler failed on message {message_id} from '{topic}': {error:#}")]
    HandlerFailed {
        topic: String,
        message_id: MessageId,
        error: anyhow::Error,
    },

    #[error("Handler panicked on message {message_id} from '{topic}': {panic}")]
    HandlerPanicked {
        topic: String,
        message_id: MessageId,
        panic: String,
    },
}

impl LostCause {
    /// True when the session ended because filter code rejected a message,
    /// as opposed to the transport going away.
    pub fn is_delivery_failure(&self) -> bool {
        matches!(
            self,
            LostCause::HandlerFailed { .. } | LostCause::HandlerPanicked { .. }
        )
    }
}
