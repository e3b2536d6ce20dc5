// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Publish/subscribe messaging for filters.
//!
//! A [`MessagingSession`] owns one broker connection. Inbound messages are
//! handed from the receive loop to a dedicated delivery thread, which calls
//! the filter's [`MessagingEventHandler`] one message at a time and
//! acknowledges each QoS >= 1 message only after the handler succeeds.
//!
//! The wire protocol sits behind [`Transport`]. [`InMemoryBroker`] provides
//! an in-process implementation.

use std::sync::{Mutex, MutexGuard};

pub mod broker;
pub mod handler;
pub mod message;
pub mod session;
pub mod topic;
pub mod transport;

#[cfg(test)]
mod integration_tests;

pub use broker::{AckRecord, InMemoryBroker, InMemoryTransport, PublishRecord};
pub use handler::MessagingEventHandler;
pub use message::{ArrivedMessage, ConnectOptions, Credentials, MessageId, QoS};
pub use session::{MessagingSession, SessionConfig, SessionHandle, SessionState};
pub use topic::{normalize_broker_address, topic_matches, validate_topic_filter, validate_topic_name};
pub use transport::{Transport, TransportFactory};

/// Lock a mutex, recovering the data if a panicking thread poisoned it.
/// Handler panics are caught and reported, so they must not wedge a session.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
