// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Callbacks a filter supplies to receive session events.
//!
//! # Delivery contract
//!
//! * Every callback runs on the session's delivery thread, one at a time.
//!   A second `message_arrived` never starts before the previous one returns,
//!   and messages are delivered in receipt order.
//! * `message_arrived` is a blocking handoff. While it runs the session
//!   processes no further inbound traffic, and for QoS >= 1 the broker
//!   acknowledgment is sent only after it returns `Ok`. A slow handler
//!   throttles the whole session.
//! * Returning `Err` (or panicking) is fatal to the connection: the session
//!   shuts down without acknowledging the message and reports the failure
//!   through `connection_lost`.
//! * Exactly one of `disconnected` or `connection_lost` fires per connection.
//! * Never call [`SessionHandle::disconnect`] from a callback. It needs the
//!   delivery thread to drain, so it returns
//!   [`crate::errors::SessionError::DisconnectFromDeliveryThread`] instead of
//!   waiting forever. Signal another thread to disconnect instead.

use crate::errors::LostCause;

use super::message::ArrivedMessage;
use super::session::SessionHandle;

pub trait MessagingEventHandler: Send + Sync {
    /// A graceful disconnect completed.
    fn disconnected(&self, _session: &SessionHandle) {}

    /// The connection ended without a graceful disconnect.
    fn connection_lost(&self, _session: &SessionHandle, _cause: &LostCause) {}

    fn message_arrived(
        &self,
        session: &SessionHandle,
        message: &ArrivedMessage,
    ) -> anyhow::Result<()>;
}
