// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::sync::Arc;

use anyhow::bail;

use crate::errors::LostCause;
use crate::filter::{ArgumentType, FilterDefinition};
use crate::messaging::{ArrivedMessage, MessagingEventHandler, SessionHandle};
use crate::runtime::FilterContext;
use crate::traits::{Filter, FilterExit};

use super::{EXIT_BROKER_UNAVAILABLE, EXIT_INPUT_UNAVAILABLE};

/// Publishes every non-empty line of a file, in file order, as one message.
pub struct PublishLinesFilter {
    definition: Arc<FilterDefinition>,
}

impl Default for PublishLinesFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishLinesFilter {
    pub fn new() -> Self {
        let definition = FilterDefinition::declare(
            "publish_lines",
            "Publish lines",
            "Publishes each non-empty line of a file to a channel",
        )
        .add_argument(ArgumentType::InputFile, "File to read")
        .add_argument(ArgumentType::PublishChannel, "Channel to publish to")
        .build();
        Self {
            definition: Arc::new(definition),
        }
    }
}

impl Filter for PublishLinesFilter {
    fn definition(&self) -> Arc<FilterDefinition> {
        self.definition.clone()
    }

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit> {
        let input = context.input_path(0)?.to_path_buf();
        let channel = context.publish_channel(1)?.clone();

        let contents = match fs::read_to_string(&input) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::error!("Cannot read {}: {}", input.display(), error);
                return Ok(FilterExit::Failure(EXIT_INPUT_UNAVAILABLE));
            }
        };

        let session = match context.open_session(&channel, Arc::new(PublishOnly)) {
            Ok(session) => session,
            Err(error) => {
                tracing::error!("Cannot connect to {}: {}", channel.broker_address, error);
                return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
            }
        };

        let mut published = 0usize;
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            if let Err(error) = session.publish(&channel.topic, line.as_bytes(), channel.qos) {
                tracing::error!("Publishing to '{}' failed after {} line(s): {}", channel.topic, published, error);
                return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
            }
            published += 1;
        }
        session.disconnect()?;

        tracing::info!("Published {} line(s) to '{}'", published, channel.topic);
        Ok(FilterExit::Success)
    }
}

/// Handler for a session that never subscribes.
struct PublishOnly;

impl MessagingEventHandler for PublishOnly {
    fn connection_lost(&self, session: &SessionHandle, cause: &LostCause) {
        tracing::warn!("Publishing session '{}' lost: {}", session.client_id(), cause);
    }

    fn message_arrived(&self, _session: &SessionHandle, message: &ArrivedMessage) -> anyhow::Result<()> {
        bail!("unexpected message {} on '{}'", message.message_id, message.topic)
    }
}
