// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Positional resolution of binding tokens against a filter definition.
//!
//! Tokens arrive as plain strings (command-line positionals or the output of
//! [`crate::graph::FilterNodeGraph::resolve_bindings_for`]). Each token is
//! paired with the declaration at the same position and coerced according to
//! the declared [`ArgumentType`]:
//!
//! * file types take the token as a path; empty tokens, NUL bytes and channel
//!   URIs are rejected
//! * `StringParam` takes the token verbatim
//! * channel types accept `scheme://host[:port]/<topic>[?qos=N]` or a bare
//!   topic resolved against [`ResolutionDefaults::broker_address`]

use std::path::PathBuf;

use crate::config::consts::{DEFAULT_BROKER_ADDRESS, DEFAULT_QOS_LEVEL};
use crate::errors::ConfigurationError;
use crate::messaging::{normalize_broker_address, validate_topic_filter, validate_topic_name, QoS};
use crate::observability::messages::resolution::{ArgumentsResolved, ResolutionFailed};
use crate::observability::messages::StructuredLog;

use super::argument::{ArgumentType, ArgumentValue, ChannelBinding, ResolvedArgument};
use super::definition::FilterDefinition;

/// Values used for channel tokens that omit the broker or QoS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDefaults {
    pub broker_address: String,
    pub qos: QoS,
}

impl Default for ResolutionDefaults {
    fn default() -> Self {
        Self {
            broker_address: DEFAULT_BROKER_ADDRESS.to_string(),
            qos: QoS::try_from(DEFAULT_QOS_LEVEL).unwrap_or(QoS::AtLeastOnce),
        }
    }
}

/// Pair `tokens` with the arguments of `definition` by position.
///
/// Fails with [`ConfigurationError::ArgumentCountMismatch`] when the counts
/// differ and with [`ConfigurationError::ArgumentTypeMismatch`] for the first
/// token that cannot be coerced to its declared type.
pub fn resolve_arguments<S: AsRef<str>>(
    definition: &FilterDefinition,
    tokens: &[S],
    defaults: &ResolutionDefaults,
) -> Result<Vec<ResolvedArgument>, ConfigurationError> {
    let result = resolve_inner(definition, tokens, defaults);
    match &result {
        Ok(arguments) => ArgumentsResolved {
            filter: definition.name(),
            count: arguments.len(),
        }
        .log(),
        Err(error) => ResolutionFailed {
            filter: definition.name(),
            error,
        }
        .log(),
    }
    result
}

fn resolve_inner<S: AsRef<str>>(
    definition: &FilterDefinition,
    tokens: &[S],
    defaults: &ResolutionDefaults,
) -> Result<Vec<ResolvedArgument>, ConfigurationError> {
    if tokens.len() != definition.arity() {
        return Err(ConfigurationError::ArgumentCountMismatch {
            filter: definition.name().to_string(),
            expected: definition.arity(),
            actual: tokens.len(),
        });
    }

    definition
        .arguments()
        .iter()
        .zip(tokens)
        .enumerate()
        .map(|(position, (declaration, token))| {
            let token = token.as_ref();
            let mismatch = |reason: String| ConfigurationError::ArgumentTypeMismatch {
                filter: definition.name().to_string(),
                position,
                expected: declaration.arg_type(),
                token: token.to_string(),
                reason,
            };
            let value = coerce_token(declaration.arg_type(), token, defaults).map_err(mismatch)?;
            ResolvedArgument::new(declaration.clone(), value).map_err(mismatch)
        })
        .collect()
}

/// Coerce one token to the value shape `arg_type` requires.
pub fn coerce_token(
    arg_type: ArgumentType,
    token: &str,
    defaults: &ResolutionDefaults,
) -> Result<ArgumentValue, String> {
    match arg_type {
        ArgumentType::InputFile | ArgumentType::OutputFile => coerce_path(token),
        ArgumentType::StringParam => Ok(ArgumentValue::Text(token.to_string())),
        ArgumentType::PublishChannel => {
            let binding = parse_channel_token(token, defaults)?;
            validate_topic_name(&binding.topic)?;
            Ok(ArgumentValue::Channel(binding))
        }
        ArgumentType::SubscribeChannel => {
            let binding = parse_channel_token(token, defaults)?;
            validate_topic_filter(&binding.topic)?;
            Ok(ArgumentValue::Channel(binding))
        }
    }
}

fn coerce_path(token: &str) -> Result<ArgumentValue, String> {
    if token.trim().is_empty() {
        return Err("file path is empty".to_string());
    }
    if token.contains('\0') {
        return Err("file path contains a NUL byte".to_string());
    }
    if token.contains("://") {
        return Err("expected a file path, found a channel address".to_string());
    }
    Ok(ArgumentValue::File(PathBuf::from(token)))
}

/// Parse `scheme://host[:port]/<topic>[?qos=N]` or a bare `<topic>[?qos=N]`.
pub fn parse_channel_token(
    token: &str,
    defaults: &ResolutionDefaults,
) -> Result<ChannelBinding, String> {
    let (broker_address, rest) = match token.split_once("://") {
        Some((scheme, remainder)) => {
            let (authority, rest) = remainder
                .split_once('/')
                .ok_or_else(|| "channel address has no topic".to_string())?;
            let address = normalize_broker_address(&format!("{}://{}", scheme, authority))?;
            (address, rest)
        }
        None => (defaults.broker_address.clone(), token),
    };

    let (topic, qos) = split_qos_query(rest, defaults.qos)?;
    if topic.is_empty() {
        return Err("channel address has no topic".to_string());
    }

    Ok(ChannelBinding::new(broker_address, topic, qos))
}

fn split_qos_query(rest: &str, default_qos: QoS) -> Result<(&str, QoS), String> {
    let Some((topic, query)) = rest.rsplit_once('?') else {
        return Ok((rest, default_qos));
    };
    if !query.starts_with("qos=") {
        // '?' is a legal topic character; only a qos query is split off
        return Ok((rest, default_qos));
    }

    let mut qos = default_qos;
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if key == "qos" {
            let level: u8 = value
                .parse()
                .map_err(|_| format!("qos '{}' is not a number", value))?;
            qos = QoS::try_from(level)?;
        }
    }
    Ok((topic, qos))
}
