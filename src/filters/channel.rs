// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handoff from a session's delivery thread to the filter body.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::errors::{LostCause, SessionError};
use crate::filter::ChannelBinding;
use crate::messaging::{ArrivedMessage, MessagingEventHandler, MessagingSession, SessionHandle};
use crate::runtime::FilterContext;

pub(crate) enum Inbound {
    Message(ArrivedMessage),
    Lost(String),
}

/// Hands each arrived message to the body, optionally republishing it
/// first, and accepts at most `quota` of them.
///
/// The handoff is a rendezvous: `message_arrived` returns only once the body
/// has taken the message, so the broker is acknowledged for exactly the
/// messages the body holds and a slow body slows the session. A message past
/// the quota, or one the body is no longer there to take, is rejected and
/// stays unacknowledged. A republish failure rejects the message as well.
pub(crate) struct ForwardingHandler {
    inbound: Sender<Inbound>,
    republish_to: Option<ChannelBinding>,
    remaining: AtomicUsize,
}

impl ForwardingHandler {
    pub(crate) fn new(republish_to: Option<ChannelBinding>, quota: usize) -> (Self, Receiver<Inbound>) {
        let (inbound, receiver) = bounded(0);
        (
            Self {
                inbound,
                republish_to,
                remaining: AtomicUsize::new(quota),
            },
            receiver,
        )
    }
}

impl MessagingEventHandler for ForwardingHandler {
    fn connection_lost(&self, _session: &SessionHandle, cause: &LostCause) {
        // The body may already be gone
        let _ = self.inbound.send(Inbound::Lost(cause.to_string()));
    }

    fn message_arrived(&self, session: &SessionHandle, message: &ArrivedMessage) -> anyhow::Result<()> {
        if self.remaining.load(Ordering::Acquire) == 0 {
            bail!("quota reached, leaving {} unacknowledged", message.message_id);
        }
        if let Some(target) = &self.republish_to {
            session
                .publish(&target.topic, &message.payload, target.qos)
                .with_context(|| format!("republishing {} to '{}'", message.message_id, target.topic))?;
        }
        self.inbound
            .send(Inbound::Message(message.clone()))
            .map_err(|_| anyhow!("filter body stopped receiving"))?;
        self.remaining.fetch_sub(1, Ordering::AcqRel);
        Ok(())
    }
}

pub(crate) enum Received {
    Message(ArrivedMessage),
    Lost(String),
    TimedOut,
}

/// A session together with the body's end of its handoff.
pub(crate) struct Inbox {
    // Dropped before the session so a handler blocked on a handoff is released
    inbound: Receiver<Inbound>,
    session: MessagingSession,
}

impl Inbox {
    /// Connect to the broker behind `channel` and take at most `quota`
    /// messages from it.
    pub(crate) fn open(
        context: &mut FilterContext,
        channel: &ChannelBinding,
        republish_to: Option<ChannelBinding>,
        quota: usize,
    ) -> Result<Self, SessionError> {
        let (handler, inbound) = ForwardingHandler::new(republish_to, quota);
        let session = context.open_session(channel, Arc::new(handler))?;
        Ok(Self { inbound, session })
    }

    pub(crate) fn subscribe(&self, channel: &ChannelBinding) -> Result<(), SessionError> {
        self.session.subscribe(&channel.topic, channel.qos)
    }

    pub(crate) fn receive(&self, timeout: Duration) -> Received {
        match self.inbound.recv_timeout(timeout) {
            Ok(Inbound::Message(message)) => Received::Message(message),
            Ok(Inbound::Lost(cause)) => Received::Lost(cause),
            Err(RecvTimeoutError::Timeout) => Received::TimedOut,
            Err(RecvTimeoutError::Disconnected) => Received::Lost("session handler dropped".to_string()),
        }
    }

    /// Stop taking messages and disconnect. Anything still queued for the
    /// session is rejected and left for the broker to redeliver.
    pub(crate) fn close(self) -> Result<(), SessionError> {
        let Self { inbound, session } = self;
        drop(inbound);
        session.disconnect()
    }
}

/// Parse a positive message count parameter.
pub(crate) fn parse_count(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(0) => Err("count must be at least 1".to_string()),
        Ok(count) => Ok(count),
        Err(error) => Err(format!("invalid count '{}': {}", raw, error)),
    }
}
