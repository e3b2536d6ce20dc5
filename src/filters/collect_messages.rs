// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use crate::config::consts::DEFAULT_RECEIVE_TIMEOUT_MS;
use crate::filter::{ArgumentType, FilterDefinition};
use crate::runtime::FilterContext;
use crate::traits::{Filter, FilterExit};

use super::channel::{parse_count, Inbox, Received};
use super::{EXIT_BROKER_UNAVAILABLE, EXIT_DATA_INVALID, EXIT_OUTPUT_UNWRITABLE, EXIT_TIMED_OUT};

/// Subscribes to a channel and writes the first `count` payloads to a file,
/// one per line, in arrival order.
///
/// Only the `count` messages taken are acknowledged. Anything else that
/// reaches the session is left for the broker to redeliver.
pub struct CollectMessagesFilter {
    definition: Arc<FilterDefinition>,
    receive_timeout: Duration,
}

impl Default for CollectMessagesFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectMessagesFilter {
    pub fn new() -> Self {
        let definition = FilterDefinition::declare(
            "collect_messages",
            "Collect messages",
            "Writes a fixed number of messages from a channel to a file",
        )
        .add_argument(ArgumentType::SubscribeChannel, "Channel to read from")
        .add_argument(ArgumentType::OutputFile, "File to write, one payload per line")
        .add_argument(ArgumentType::StringParam, "Number of messages to collect")
        .build();
        Self {
            definition: Arc::new(definition),
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
        }
    }

    /// Longest wait for any single message before the run fails.
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

impl Filter for CollectMessagesFilter {
    fn definition(&self) -> Arc<FilterDefinition> {
        self.definition.clone()
    }

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit> {
        let channel = context.subscribe_channel(0)?.clone();
        let output = context.output_path(1)?.to_path_buf();
        let count = match parse_count(context.text(2)?) {
            Ok(count) => count,
            Err(reason) => {
                tracing::error!("{}", reason);
                return Ok(FilterExit::Failure(EXIT_DATA_INVALID));
            }
        };

        let inbox = match Inbox::open(context, &channel, None, count) {
            Ok(inbox) => inbox,
            Err(error) => {
                tracing::error!("Cannot connect to {}: {}", channel.broker_address, error);
                return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
            }
        };
        if let Err(error) = inbox.subscribe(&channel) {
            tracing::error!("Cannot subscribe to '{}': {}", channel.topic, error);
            return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
        }

        let mut lines = Vec::with_capacity(count);
        while lines.len() < count {
            match inbox.receive(self.receive_timeout) {
                Received::Message(message) => {
                    lines.push(String::from_utf8_lossy(&message.payload).into_owned());
                }
                Received::Lost(cause) => {
                    tracing::error!("Session lost after {} message(s): {}", lines.len(), cause);
                    return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
                }
                Received::TimedOut => {
                    tracing::error!(
                        "No message on '{}' within {:?} ({} of {} collected)",
                        channel.topic,
                        self.receive_timeout,
                        lines.len(),
                        count
                    );
                    return Ok(FilterExit::Failure(EXIT_TIMED_OUT));
                }
            }
        }
        inbox.close()?;

        let mut contents = lines.join("\n");
        contents.push('\n');
        if let Err(error) = fs::write(&output, contents) {
            tracing::error!("Cannot write {}: {}", output.display(), error);
            return Ok(FilterExit::Failure(EXIT_OUTPUT_UNWRITABLE));
        }
        Ok(FilterExit::Success)
    }
}
