// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::path::PathBuf;

use serde::Deserialize;

use crate::filter::{ArgumentType, ChannelBinding};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) usize);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// Which side of a filter a node sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Feeds an input file or subscribe channel argument.
    Input,
    /// Receives an output file or publish channel argument.
    Output,
}

impl NodeKind {
    pub fn accepts(&self, arg_type: ArgumentType) -> bool {
        match self {
            NodeKind::Input => arg_type.is_source(),
            NodeKind::Output => arg_type.is_sink(),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Input => f.write_str("input"),
            NodeKind::Output => f.write_str("output"),
        }
    }
}

/// The concrete resource a node stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeBinding {
    File(PathBuf),
    Channel(ChannelBinding),
}

impl NodeBinding {
    pub fn fits(&self, arg_type: ArgumentType) -> bool {
        match self {
            NodeBinding::File(_) => arg_type.is_file(),
            NodeBinding::Channel(_) => arg_type.is_channel(),
        }
    }

    /// Raw binding token handed to argument resolution.
    pub fn to_token(&self) -> String {
        match self {
            NodeBinding::File(path) => path.to_string_lossy().into_owned(),
            NodeBinding::Channel(channel) => channel.to_token(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilterNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) binding: Option<NodeBinding>,
}

impl FilterNode {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// `None` until the orchestrator assigns a resource.
    pub fn binding(&self) -> Option<&NodeBinding> {
        self.binding.as_ref()
    }
}
