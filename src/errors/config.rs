// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration errors raised while binding a filter's arguments.
//!
//! Every variant is detected before a filter body starts. They are fatal to the
//! launch attempt and are never retried by the runtime.

use crate::filter::ArgumentType;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The number of binding tokens differs from the number of declared arguments.
    #[error("Filter '{filter}' declares {expected} argument(s) but {actual} token(s) were supplied")]
    ArgumentCountMismatch {
        filter: String,
        expected: usize,
        actual: usize,
    },

    /// A token could not be coerced to the type declared at its position.
    #[error("Filter '{filter}' argument {position} expects {expected}, got '{token}': {reason}")]
    ArgumentTypeMismatch {
        filter: String,
        position: usize,
        expected: ArgumentType,
        token: String,
        reason: String,
    },

    /// A filter instance slot has no concrete resource behind it.
    #[error("Instance '{instance}' argument {position} is not bound to a resource")]
    UnboundArgument { instance: String, position: usize },

    #[error("Unknown filter: '{0}'")]
    UnknownFilter(String),

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown filter instance: {0}")]
    UnknownInstance(String),

    /// An input node was attached to an output slot or vice versa.
    #[error("Node {node} is an {kind} node and cannot bind argument {position} ({expected})")]
    NodeKindMismatch {
        node: String,
        kind: String,
        position: usize,
        expected: ArgumentType,
    },

    #[error("Argument position {position} is out of range for a filter with {len} argument(s)")]
    PositionOutOfRange { position: usize, len: usize },

    /// An external argument marker did not name a known argument type.
    #[error("Unknown argument marker: '{0}'")]
    UnknownMarker(String),
}

/// Errors raised by a filter body when it reads its arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArgumentAccessError {
    #[error("No argument at position {position} ({len} argument(s) available)")]
    Missing { position: usize, len: usize },

    #[error("Argument {position} is {actual}, not {requested}")]
    WrongType {
        position: usize,
        requested: ArgumentType,
        actual: ArgumentType,
    },
}
