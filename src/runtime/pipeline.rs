// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Running every instance of a [`FilterNodeGraph`] at once.
//!
//! All argument bindings are resolved before anything starts, so a
//! configuration problem in one instance keeps the whole pipeline from
//! launching. Instances then run concurrently, each on a blocking worker,
//! and the pipeline reports the first failing exit code in declaration
//! order.

use std::sync::Arc;
use std::time::Duration;

use crate::config::BrokerConfig;
use crate::errors::{ConfigurationError, SessionError};
use crate::filter::{
    resolve_arguments, ArgumentType, ChannelBinding, ResolutionDefaults, ResolvedArgument,
};
use crate::graph::FilterNodeGraph;
use crate::messaging::{ConnectOptions, SessionConfig, TransportFactory};
use crate::observability::messages::pipeline::{
    InstanceExited, InstanceLaunched, PipelineRejected, PrimingFailed, SubscriptionPrimed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::Filter;

use super::{FilterRuntime, MessagingOptions, EXIT_CONFIGURATION_ERROR, EXIT_INTERNAL_ERROR, EXIT_SUCCESS};

/// A built graph plus the filters behind its instances.
pub struct Pipeline {
    graph: FilterNodeGraph,
    filters: Vec<Arc<dyn Filter>>,
    defaults: ResolutionDefaults,
    broker: BrokerConfig,
}

/// One instance, ready to start.
struct Launch {
    instance: String,
    filter: Arc<dyn Filter>,
    arguments: Vec<ResolvedArgument>,
}

impl Pipeline {
    /// `filters[i]` runs instance `i` of `graph`.
    pub(crate) fn new(
        graph: FilterNodeGraph,
        filters: Vec<Arc<dyn Filter>>,
        defaults: ResolutionDefaults,
        broker: BrokerConfig,
    ) -> Self {
        Self {
            graph,
            filters,
            defaults,
            broker,
        }
    }

    pub fn graph(&self) -> &FilterNodeGraph {
        &self.graph
    }

    /// Session settings every instance shares, drawing transports from
    /// `transports`.
    pub fn messaging_options(&self, transports: Arc<dyn TransportFactory>) -> MessagingOptions {
        MessagingOptions {
            transports,
            client_id_prefix: self.broker.client_id_prefix.clone(),
            credentials: self.broker.credentials.clone(),
            keep_alive: Duration::from_secs(self.broker.keep_alive_secs),
            clean_session: self.broker.clean_session,
            session: SessionConfig {
                delivery_queue_capacity: self.broker.delivery_queue_capacity,
                poll_interval: Duration::from_millis(self.broker.poll_interval_ms),
            },
        }
    }

    /// Run every instance and wait for all of them.
    ///
    /// Returns [`EXIT_CONFIGURATION_ERROR`] without starting anything when
    /// an instance can't be resolved. Otherwise returns [`EXIT_SUCCESS`] if
    /// every instance succeeded, or the exit code of the first instance, in
    /// declaration order, that did not.
    pub async fn run(&self, transports: Arc<dyn TransportFactory>) -> i32 {
        let launches = match self.resolve() {
            Ok(launches) => launches,
            Err(error) => {
                PipelineRejected { error: &error }.log();
                return EXIT_CONFIGURATION_ERROR;
            }
        };

        let messaging = self.messaging_options(transports);
        if !messaging.clean_session {
            prime_subscriptions(&messaging, &launches);
        }

        let mut handles = Vec::with_capacity(launches.len());
        for launch in launches {
            let definition = launch.filter.definition();
            let launched = InstanceLaunched {
                instance: &launch.instance,
                filter: definition.name(),
            };
            launched.log();
            let span = launched.span("instance");

            let runtime = FilterRuntime::new(launch.filter)
                .with_instance(launch.instance.clone())
                .with_defaults(self.defaults.clone())
                .with_messaging(messaging.clone());
            let arguments = launch.arguments;
            let handle = tokio::task::spawn_blocking(move || span.in_scope(|| runtime.run(arguments)));
            handles.push((launch.instance, handle));
        }

        let mut result = EXIT_SUCCESS;
        for (instance, handle) in handles {
            let exit_code = match handle.await {
                Ok(code) => code,
                Err(error) => {
                    tracing::error!(instance = %instance, "Instance worker failed: {}", error);
                    EXIT_INTERNAL_ERROR
                }
            };
            InstanceExited {
                instance: &instance,
                exit_code,
            }
            .log();
            if result == EXIT_SUCCESS {
                result = exit_code;
            }
        }
        result
    }

    fn resolve(&self) -> Result<Vec<Launch>, ConfigurationError> {
        self.graph
            .instances()
            .iter()
            .zip(&self.filters)
            .map(|(instance, filter)| {
                let tokens = self.graph.resolve_bindings_for(instance.id())?;
                let arguments = resolve_arguments(instance.definition(), &tokens, &self.defaults)?;
                Ok(Launch {
                    instance: instance.name().to_string(),
                    filter: filter.clone(),
                    arguments,
                })
            })
            .collect()
    }
}

/// Register each instance's subscribe channels under the client id of its
/// first session, so messages published before it subscribes are kept.
fn prime_subscriptions(messaging: &MessagingOptions, launches: &[Launch]) {
    for launch in launches {
        let channels: Vec<&ChannelBinding> = launch
            .arguments
            .iter()
            .filter(|argument| argument.arg_type() == ArgumentType::SubscribeChannel)
            .filter_map(|argument| argument.as_channel())
            .collect();
        let Some(first) = channels.first() else {
            continue;
        };
        // The first session only talks to one broker
        let channels: Vec<&ChannelBinding> = channels
            .iter()
            .copied()
            .filter(|channel| channel.broker_address == first.broker_address)
            .collect();

        let client_id = messaging.client_id(&launch.instance, 0);
        match prime_client(messaging, &client_id, &channels) {
            Ok(()) => {
                for channel in &channels {
                    SubscriptionPrimed {
                        client_id: &client_id,
                        topic_filter: &channel.topic,
                    }
                    .log();
                }
            }
            Err(error) => PrimingFailed {
                client_id: &client_id,
                error: &error,
            }
            .log(),
        }
    }
}

fn prime_client(
    messaging: &MessagingOptions,
    client_id: &str,
    channels: &[&ChannelBinding],
) -> Result<(), SessionError> {
    let Some(first) = channels.first() else {
        return Ok(());
    };
    let transport = messaging.transports.create(&first.broker_address)?;
    let mut options = ConnectOptions::new(first.broker_address.clone(), client_id);
    options.keep_alive = messaging.keep_alive;
    options.clean_session = false;
    options.credentials = messaging.credentials.clone();
    transport.connect(&options)?;

    let subscribed = channels
        .iter()
        .try_for_each(|channel| transport.subscribe(&channel.topic, channel.qos));
    transport.close();
    Ok(subscribed?)
}
