// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Argument typing for filters.
//!
//! A filter declares an ordered list of arguments, each carrying exactly one
//! [`ArgumentType`]. The type decides how a bound token is resolved:
//!
//! | Type | Marker | Resolves to |
//! |------|--------|-------------|
//! | `InputFile` | `[IN]` | filesystem path |
//! | `OutputFile` | `[OUT]` | filesystem path |
//! | `StringParam` | `[PARAM]` | literal string |
//! | `PublishChannel` | `[PUB]` | broker address, topic name, QoS |
//! | `SubscribeChannel` | `[SUB]` | broker address, topic filter, QoS |
//!
//! Markers only exist at the boundary (pipeline files, `describe` output) and
//! are parsed into the enumeration there.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigurationError;
use crate::messaging::QoS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentType {
    InputFile,
    OutputFile,
    StringParam,
    PublishChannel,
    SubscribeChannel,
}

impl ArgumentType {
    pub const ALL: [ArgumentType; 5] = [
        ArgumentType::InputFile,
        ArgumentType::OutputFile,
        ArgumentType::StringParam,
        ArgumentType::PublishChannel,
        ArgumentType::SubscribeChannel,
    ];

    pub fn marker(&self) -> &'static str {
        match self {
            ArgumentType::InputFile => "[IN]",
            ArgumentType::OutputFile => "[OUT]",
            ArgumentType::StringParam => "[PARAM]",
            ArgumentType::PublishChannel => "[PUB]",
            ArgumentType::SubscribeChannel => "[SUB]",
        }
    }

    pub fn from_marker(marker: &str) -> Result<Self, ConfigurationError> {
        Self::ALL
            .into_iter()
            .find(|t| t.marker().eq_ignore_ascii_case(marker.trim()))
            .ok_or_else(|| ConfigurationError::UnknownMarker(marker.to_string()))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ArgumentType::InputFile | ArgumentType::OutputFile)
    }

    pub fn is_channel(&self) -> bool {
        matches!(
            self,
            ArgumentType::PublishChannel | ArgumentType::SubscribeChannel
        )
    }

    /// Data flows into the filter through this argument.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            ArgumentType::InputFile | ArgumentType::SubscribeChannel
        )
    }

    /// Data flows out of the filter through this argument.
    pub fn is_sink(&self) -> bool {
        matches!(
            self,
            ArgumentType::OutputFile | ArgumentType::PublishChannel
        )
    }
}

impl fmt::Display for ArgumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArgumentType::InputFile => "input file",
            ArgumentType::OutputFile => "output file",
            ArgumentType::StringParam => "string parameter",
            ArgumentType::PublishChannel => "publish channel",
            ArgumentType::SubscribeChannel => "subscribe channel",
        };
        f.write_str(name)
    }
}

/// Accepts either a marker (`[IN]`) or the snake_case name (`input_file`).
impl FromStr for ArgumentType {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim_start().starts_with('[') {
            return Self::from_marker(s);
        }
        match s.trim() {
            "input_file" => Ok(ArgumentType::InputFile),
            "output_file" => Ok(ArgumentType::OutputFile),
            "string_param" => Ok(ArgumentType::StringParam),
            "publish_channel" => Ok(ArgumentType::PublishChannel),
            "subscribe_channel" => Ok(ArgumentType::SubscribeChannel),
            other => Err(ConfigurationError::UnknownMarker(other.to_string())),
        }
    }
}

/// One declared argument slot of a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgumentDeclaration {
    #[serde(rename = "type")]
    arg_type: ArgumentType,
    description: String,
}

impl ArgumentDeclaration {
    pub fn new(arg_type: ArgumentType, description: impl Into<String>) -> Self {
        Self {
            arg_type,
            description: description.into(),
        }
    }

    pub fn arg_type(&self) -> ArgumentType {
        self.arg_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

/// A message channel a filter argument is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelBinding {
    pub broker_address: String,
    pub topic: String,
    pub qos: QoS,
}

impl ChannelBinding {
    pub fn new(broker_address: impl Into<String>, topic: impl Into<String>, qos: QoS) -> Self {
        Self {
            broker_address: broker_address.into(),
            topic: topic.into(),
            qos,
        }
    }

    /// Render as a binding token that [`crate::filter::resolve_arguments`] accepts.
    pub fn to_token(&self) -> String {
        format!(
            "{}/{}?qos={}",
            self.broker_address.trim_end_matches('/'),
            self.topic,
            self.qos.level()
        )
    }
}

impl fmt::Display for ChannelBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_token())
    }
}

/// The concrete resource behind an argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentValue {
    File(PathBuf),
    Channel(ChannelBinding),
    Text(String),
}

impl ArgumentValue {
    fn accepts(&self, arg_type: ArgumentType) -> bool {
        match self {
            ArgumentValue::File(_) => arg_type.is_file(),
            ArgumentValue::Channel(_) => arg_type.is_channel(),
            ArgumentValue::Text(_) => arg_type == ArgumentType::StringParam,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ArgumentValue::File(_) => "file path",
            ArgumentValue::Channel(_) => "channel binding",
            ArgumentValue::Text(_) => "string",
        }
    }
}

/// A declaration paired with the value bound to it at launch.
///
/// Construction checks that the value's variant fits the declared type, so a
/// `ResolvedArgument` can never carry a path where a channel was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArgument {
    declaration: ArgumentDeclaration,
    value: ArgumentValue,
}

impl ResolvedArgument {
    pub fn new(declaration: ArgumentDeclaration, value: ArgumentValue) -> Result<Self, String> {
        if !value.accepts(declaration.arg_type()) {
            return Err(format!(
                "a {} cannot be bound to a {} argument",
                value.kind(),
                declaration.arg_type()
            ));
        }
        Ok(Self { declaration, value })
    }

    pub fn declaration(&self) -> &ArgumentDeclaration {
        &self.declaration
    }

    pub fn arg_type(&self) -> ArgumentType {
        self.declaration.arg_type()
    }

    pub fn value(&self) -> &ArgumentValue {
        &self.value
    }

    pub fn as_path(&self) -> Option<&Path> {
        match &self.value {
            ArgumentValue::File(path) => Some(path),
            _ => None,
        }
    }

    pub fn as_channel(&self) -> Option<&ChannelBinding> {
        match &self.value {
            ArgumentValue::Channel(binding) => Some(binding),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            ArgumentValue::Text(text) => Some(text),
            _ => None,
        }
    }
}
