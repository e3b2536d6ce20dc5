// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;
use std::time::Duration;

use crate::config::consts::DEFAULT_RECEIVE_TIMEOUT_MS;
use crate::filter::{ArgumentType, FilterDefinition};
use crate::runtime::FilterContext;
use crate::traits::{Filter, FilterExit};

use super::channel::{parse_count, Inbox, Received};
use super::{EXIT_BROKER_UNAVAILABLE, EXIT_DATA_INVALID, EXIT_TIMED_OUT};

/// Republishes `count` messages from one channel to another.
///
/// Republishing happens inside the delivery callback, so a message is only
/// acknowledged upstream once it has been handed to the target topic. No
/// more than `count` messages are republished or acknowledged. Both channels
/// must live on the same broker.
pub struct RelayFilter {
    definition: Arc<FilterDefinition>,
    receive_timeout: Duration,
}

impl Default for RelayFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl RelayFilter {
    pub fn new() -> Self {
        let definition = FilterDefinition::declare(
            "relay",
            "Relay",
            "Forwards a fixed number of messages from one channel to another",
        )
        .add_argument(ArgumentType::SubscribeChannel, "Channel to read from")
        .add_argument(ArgumentType::PublishChannel, "Channel to forward to")
        .add_argument(ArgumentType::StringParam, "Number of messages to forward")
        .build();
        Self {
            definition: Arc::new(definition),
            receive_timeout: Duration::from_millis(DEFAULT_RECEIVE_TIMEOUT_MS),
        }
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }
}

impl Filter for RelayFilter {
    fn definition(&self) -> Arc<FilterDefinition> {
        self.definition.clone()
    }

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit> {
        let source = context.subscribe_channel(0)?.clone();
        let target = context.publish_channel(1)?.clone();
        let count = match parse_count(context.text(2)?) {
            Ok(count) => count,
            Err(reason) => {
                tracing::error!("{}", reason);
                return Ok(FilterExit::Failure(EXIT_DATA_INVALID));
            }
        };
        if source.broker_address != target.broker_address {
            tracing::error!(
                "Relay channels must share a broker: {} vs {}",
                source.broker_address,
                target.broker_address
            );
            return Ok(FilterExit::Failure(EXIT_DATA_INVALID));
        }

        let inbox = match Inbox::open(context, &source, Some(target.clone()), count) {
            Ok(inbox) => inbox,
            Err(error) => {
                tracing::error!("Cannot connect to {}: {}", source.broker_address, error);
                return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
            }
        };
        if let Err(error) = inbox.subscribe(&source) {
            tracing::error!("Cannot subscribe to '{}': {}", source.topic, error);
            return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
        }

        let mut relayed = 0usize;
        while relayed < count {
            match inbox.receive(self.receive_timeout) {
                Received::Message(_) => relayed += 1,
                Received::Lost(cause) => {
                    tracing::error!("Session lost after relaying {} message(s): {}", relayed, cause);
                    return Ok(FilterExit::Failure(EXIT_BROKER_UNAVAILABLE));
                }
                Received::TimedOut => {
                    tracing::error!(
                        "No message on '{}' within {:?} ({} of {} relayed)",
                        source.topic,
                        self.receive_timeout,
                        relayed,
                        count
                    );
                    return Ok(FilterExit::Failure(EXIT_TIMED_OUT));
                }
            }
        }
        inbox.close()?;

        tracing::info!("Relayed {} message(s) from '{}' to '{}'", relayed, source.topic, target.topic);
        Ok(FilterExit::Success)
    }
}
