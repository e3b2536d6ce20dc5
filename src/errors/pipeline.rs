// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors for pipeline file loading and validation.

use std::fmt;
use thiserror::Error;

/// Structural problems found while validating a pipeline file.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    DuplicateNodeId { node_id: String },
    DuplicateInstanceId { instance_id: String },
    /// An instance argument or edge references a node that doesn't exist
    UnresolvedNode { referenced_by: String, node_id: String },
    UnknownFilter { instance_id: String, filter: String },
    /// Node has neither a path nor a channel, or both
    AmbiguousBinding { node_id: String },
    ArgumentCount {
        instance_id: String,
        expected: usize,
        actual: usize,
    },
    /// Argument entry is neither a single node reference nor a scalar value
    InvalidArgument {
        instance_id: String,
        position: usize,
        reason: String,
    },
    /// The broker section or a channel names an address that can't be parsed
    InvalidBrokerAddress {
        referenced_by: String,
        address: String,
        reason: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateNodeId { node_id } => {
                write!(f, "Duplicate node ID: '{}'", node_id)
            }
            ValidationError::DuplicateInstanceId { instance_id } => {
                write!(f, "Duplicate instance ID: '{}'", instance_id)
            }
            ValidationError::UnresolvedNode {
                referenced_by,
                node_id,
            } => {
                write!(
                    f,
                    "'{}' references node '{}' which does not exist",
                    referenced_by, node_id
                )
            }
            ValidationError::UnknownFilter {
                instance_id,
                filter,
            } => {
                write!(
                    f,
                    "Instance '{}' uses filter '{}' which is not registered",
                    instance_id, filter
                )
            }
            ValidationError::AmbiguousBinding { node_id } => {
                write!(
                    f,
                    "Node '{}' must declare exactly one of 'path' or 'channel'",
                    node_id
                )
            }
            ValidationError::ArgumentCount {
                instance_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Instance '{}' binds {} argument(s) but its filter declares {}",
                    instance_id, actual, expected
                )
            }
            ValidationError::InvalidArgument {
                instance_id,
                position,
                reason,
            } => {
                write!(
                    f,
                    "Instance '{}' argument {}: {}",
                    instance_id, position, reason
                )
            }
            ValidationError::InvalidBrokerAddress {
                referenced_by,
                address,
                reason,
            } => {
                write!(
                    f,
                    "{} has invalid broker address '{}': {}",
                    referenced_by, address, reason
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

#[derive(Error, Debug)]
pub enum PipelineConfigError {
    #[error("Failed to read pipeline file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse pipeline file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Pipeline validation failed:\n{}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Configuration(#[from] crate::errors::ConfigurationError),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
