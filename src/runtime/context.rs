// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::consts::{DEFAULT_CLIENT_ID_PREFIX, DEFAULT_KEEP_ALIVE_SECS};
use crate::errors::{ArgumentAccessError, ConnectError, SessionError};
use crate::filter::{ArgumentType, ChannelBinding, FilterDefinition, ResolvedArgument};
use crate::messaging::{
    ConnectOptions, Credentials, MessagingEventHandler, MessagingSession, SessionConfig,
    TransportFactory,
};

/// How filters reach their brokers.
#[derive(Clone)]
pub struct MessagingOptions {
    pub transports: Arc<dyn TransportFactory>,
    pub client_id_prefix: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    pub clean_session: bool,
    pub session: SessionConfig,
}

impl MessagingOptions {
    pub fn new(transports: Arc<dyn TransportFactory>) -> Self {
        Self {
            transports,
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
            credentials: None,
            keep_alive: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            clean_session: true,
            session: SessionConfig::default(),
        }
    }

    /// Client id of the `n`th session an instance opens. The first one is
    /// predictable so subscriptions can be registered ahead of the launch.
    pub fn client_id(&self, instance: &str, n: usize) -> String {
        if n == 0 {
            format!("{}-{}", self.client_id_prefix, instance)
        } else {
            format!("{}-{}-{}", self.client_id_prefix, instance, n)
        }
    }
}

impl fmt::Debug for MessagingOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagingOptions")
            .field("client_id_prefix", &self.client_id_prefix)
            .field("credentials", &self.credentials)
            .field("keep_alive", &self.keep_alive)
            .field("clean_session", &self.clean_session)
            .field("session", &self.session)
            .finish()
    }
}

/// What a filter body sees of its launch: the resolved arguments, by
/// position and type, and a way to open messaging sessions.
///
/// The context never opens files itself. Bodies open paths with whatever
/// I/O they need and close them before returning.
pub struct FilterContext {
    instance: String,
    definition: Arc<FilterDefinition>,
    arguments: Vec<ResolvedArgument>,
    messaging: Option<MessagingOptions>,
    sessions_opened: usize,
}

impl FilterContext {
    pub(crate) fn new(
        instance: String,
        definition: Arc<FilterDefinition>,
        arguments: Vec<ResolvedArgument>,
        messaging: Option<MessagingOptions>,
    ) -> Self {
        Self {
            instance,
            definition,
            arguments,
            messaging,
            sessions_opened: 0,
        }
    }

    pub fn instance(&self) -> &str {
        &self.instance
    }

    pub fn definition(&self) -> &FilterDefinition {
        &self.definition
    }

    pub fn arguments(&self) -> &[ResolvedArgument] {
        &self.arguments
    }

    pub fn argument(&self, position: usize) -> Result<&ResolvedArgument, ArgumentAccessError> {
        self.arguments.get(position).ok_or(ArgumentAccessError::Missing {
            position,
            len: self.arguments.len(),
        })
    }

    fn typed(
        &self,
        position: usize,
        requested: ArgumentType,
    ) -> Result<&ResolvedArgument, ArgumentAccessError> {
        let argument = self.argument(position)?;
        if argument.arg_type() != requested {
            return Err(ArgumentAccessError::WrongType {
                position,
                requested,
                actual: argument.arg_type(),
            });
        }
        Ok(argument)
    }

    pub fn input_path(&self, position: usize) -> Result<&Path, ArgumentAccessError> {
        self.path_of(position, ArgumentType::InputFile)
    }

    pub fn output_path(&self, position: usize) -> Result<&Path, ArgumentAccessError> {
        self.path_of(position, ArgumentType::OutputFile)
    }

    fn path_of(&self, position: usize, requested: ArgumentType) -> Result<&Path, ArgumentAccessError> {
        let argument = self.typed(position, requested)?;
        argument.as_path().ok_or(ArgumentAccessError::WrongType {
            position,
            requested,
            actual: argument.arg_type(),
        })
    }

    pub fn text(&self, position: usize) -> Result<&str, ArgumentAccessError> {
        let argument = self.typed(position, ArgumentType::StringParam)?;
        argument.as_text().ok_or(ArgumentAccessError::WrongType {
            position,
            requested: ArgumentType::StringParam,
            actual: argument.arg_type(),
        })
    }

    pub fn publish_channel(&self, position: usize) -> Result<&ChannelBinding, ArgumentAccessError> {
        self.channel_of(position, ArgumentType::PublishChannel)
    }

    pub fn subscribe_channel(&self, position: usize) -> Result<&ChannelBinding, ArgumentAccessError> {
        self.channel_of(position, ArgumentType::SubscribeChannel)
    }

    fn channel_of(
        &self,
        position: usize,
        requested: ArgumentType,
    ) -> Result<&ChannelBinding, ArgumentAccessError> {
        let argument = self.typed(position, requested)?;
        argument.as_channel().ok_or(ArgumentAccessError::WrongType {
            position,
            requested,
            actual: argument.arg_type(),
        })
    }

    /// Connect a new session to the broker behind `channel`.
    ///
    /// The session belongs to this run. Disconnect it (or drop it) before
    /// the body returns; never share it with another filter.
    pub fn open_session(
        &mut self,
        channel: &ChannelBinding,
        handler: Arc<dyn MessagingEventHandler>,
    ) -> Result<MessagingSession, SessionError> {
        let messaging = self
            .messaging
            .as_ref()
            .ok_or_else(|| ConnectError::NoTransport(channel.broker_address.clone()))?;

        let client_id = messaging.client_id(&self.instance, self.sessions_opened);
        self.sessions_opened += 1;

        let transport = messaging.transports.create(&channel.broker_address)?;
        let session = MessagingSession::with_config(transport, handler, messaging.session.clone());

        let mut options = ConnectOptions::new(channel.broker_address.clone(), client_id)
            .with_clean_session(messaging.clean_session)
            .with_keep_alive(messaging.keep_alive);
        if let Some(credentials) = &messaging.credentials {
            options = options.with_credentials(credentials.clone());
        }
        session.connect(&options)?;
        Ok(session)
    }
}

impl fmt::Debug for FilterContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterContext")
            .field("instance", &self.instance)
            .field("filter", &self.definition.name())
            .field("arguments", &self.arguments)
            .finish()
    }
}
