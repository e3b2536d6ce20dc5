// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipeline topology.
//!
//! A [`FilterNodeGraph`] holds typed endpoint nodes, the filter instances that
//! use them, and directed data-dependency edges between nodes. Nothing here
//! executes; the graph only answers which raw binding token belongs at each
//! argument position of an instance.
//!
//! ```text
//!  [Input: in.txt] --> (uppercase) --> [Output: out.txt]
//!       node#0          instance#0          node#1
//! ```
//!
//! Cycle detection belongs to whoever assembles the graph.

mod node;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::filter::FilterDefinition;

pub use node::{FilterNode, InstanceId, NodeBinding, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Node(NodeId),
    Literal(String),
}

/// One use of a filter definition inside a graph.
#[derive(Debug, Clone)]
pub struct FilterInstance {
    id: InstanceId,
    name: String,
    definition: Arc<FilterDefinition>,
    slots: Vec<Option<Slot>>,
}

impl FilterInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn definition(&self) -> &Arc<FilterDefinition> {
        &self.definition
    }

    /// Nodes attached to this instance, in argument order.
    pub fn attached_nodes(&self) -> impl Iterator<Item = (usize, NodeId)> + '_ {
        self.slots.iter().enumerate().filter_map(|(position, slot)| match slot {
            Some(Slot::Node(node)) => Some((position, *node)),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct FilterNodeGraph {
    nodes: Vec<FilterNode>,
    edges: BTreeSet<(NodeId, NodeId)>,
    instances: Vec<FilterInstance>,
}

impl FilterNodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an endpoint. A node may start unbound and receive its resource
    /// later through [`FilterNodeGraph::bind_node`].
    pub fn add_node(&mut self, kind: NodeKind, binding: Option<NodeBinding>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(FilterNode { id, kind, binding });
        id
    }

    pub fn bind_node(&mut self, node: NodeId, binding: NodeBinding) -> Result<(), ConfigurationError> {
        let entry = self
            .nodes
            .get_mut(node.0)
            .ok_or_else(|| ConfigurationError::UnknownNode(node.to_string()))?;
        entry.binding = Some(binding);
        Ok(())
    }

    /// Record that data produced at `producer` is consumed at `consumer`.
    /// Edges are dependencies, not channels; they carry no data.
    pub fn connect(&mut self, producer: NodeId, consumer: NodeId) -> Result<(), ConfigurationError> {
        self.node(producer)?;
        self.node(consumer)?;
        self.edges.insert((producer, consumer));
        Ok(())
    }

    pub fn add_instance(&mut self, name: impl Into<String>, definition: Arc<FilterDefinition>) -> InstanceId {
        let id = InstanceId(self.instances.len());
        self.instances.push(FilterInstance {
            id,
            name: name.into(),
            slots: vec![None; definition.arity()],
            definition,
        });
        id
    }

    /// Attach `node` to argument `position` of `instance`. Input nodes only
    /// bind input files and subscribe channels, output nodes only output
    /// files and publish channels.
    pub fn attach(
        &mut self,
        instance: InstanceId,
        position: usize,
        node: NodeId,
    ) -> Result<(), ConfigurationError> {
        let kind = self.node(node)?.kind;
        let entry = self.instance_mut(instance)?;
        let declaration = entry.definition.argument(position).ok_or(
            ConfigurationError::PositionOutOfRange {
                position,
                len: entry.slots.len(),
            },
        )?;
        if !kind.accepts(declaration.arg_type()) {
            return Err(ConfigurationError::NodeKindMismatch {
                node: node.to_string(),
                kind: kind.to_string(),
                position,
                expected: declaration.arg_type(),
            });
        }
        entry.slots[position] = Some(Slot::Node(node));
        Ok(())
    }

    /// Bind a literal token, typically a string parameter.
    pub fn bind_literal(
        &mut self,
        instance: InstanceId,
        position: usize,
        value: impl Into<String>,
    ) -> Result<(), ConfigurationError> {
        let entry = self.instance_mut(instance)?;
        let len = entry.slots.len();
        let slot = entry
            .slots
            .get_mut(position)
            .ok_or(ConfigurationError::PositionOutOfRange { position, len })?;
        *slot = Some(Slot::Literal(value.into()));
        Ok(())
    }

    /// Walk the instance's argument slots in declaration order and produce
    /// the raw token for each. Any slot without a concrete resource fails
    /// with [`ConfigurationError::UnboundArgument`].
    pub fn resolve_bindings_for(&self, instance: InstanceId) -> Result<Vec<String>, ConfigurationError> {
        let entry = self.instance(instance)?;
        let unbound = |position| ConfigurationError::UnboundArgument {
            instance: entry.name.clone(),
            position,
        };

        entry
            .slots
            .iter()
            .enumerate()
            .map(|(position, slot)| match slot {
                None => Err(unbound(position)),
                Some(Slot::Literal(value)) => Ok(value.clone()),
                Some(Slot::Node(node)) => {
                    let binding = self.node(*node)?.binding().ok_or_else(|| unbound(position))?;
                    let arg_type = entry.definition.arguments()[position].arg_type();
                    if !binding.fits(arg_type) {
                        return Err(ConfigurationError::ArgumentTypeMismatch {
                            filter: entry.definition.name().to_string(),
                            position,
                            expected: arg_type,
                            token: binding.to_token(),
                            reason: format!("{} is bound to the wrong kind of resource", node),
                        });
                    }
                    Ok(binding.to_token())
                }
            })
            .collect()
    }

    pub fn node(&self, id: NodeId) -> Result<&FilterNode, ConfigurationError> {
        self.nodes
            .get(id.0)
            .ok_or_else(|| ConfigurationError::UnknownNode(id.to_string()))
    }

    pub fn nodes(&self) -> &[FilterNode] {
        &self.nodes
    }

    pub fn instance(&self, id: InstanceId) -> Result<&FilterInstance, ConfigurationError> {
        self.instances
            .get(id.0)
            .ok_or_else(|| ConfigurationError::UnknownInstance(id.to_string()))
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut FilterInstance, ConfigurationError> {
        self.instances
            .get_mut(id.0)
            .ok_or_else(|| ConfigurationError::UnknownInstance(id.to_string()))
    }

    pub fn instance_by_name(&self, name: &str) -> Option<&FilterInstance> {
        self.instances.iter().find(|i| i.name == name)
    }

    pub fn instances(&self) -> &[FilterInstance] {
        &self.instances
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.edges.iter().copied()
    }

    /// Nodes whose data flows into `node`.
    pub fn producers_of(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(_, consumer)| *consumer == node)
            .map(|(producer, _)| *producer)
            .collect()
    }

    /// Nodes fed by `node`.
    pub fn consumers_of(&self, node: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|(producer, _)| *producer == node)
            .map(|(_, consumer)| *consumer)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{ArgumentType, ChannelBinding};
    use crate::messaging::QoS;
    use std::path::PathBuf;

    fn uppercase() -> Arc<FilterDefinition> {
        Arc::new(
            FilterDefinition::declare("uppercase", "Uppercase", "Uppercases a file")
                .add_argument(ArgumentType::InputFile, "")
                .add_argument(ArgumentType::OutputFile, "")
                .build(),
        )
    }

    fn relay() -> Arc<FilterDefinition> {
        Arc::new(
            FilterDefinition::declare("relay", "Relay", "")
                .add_argument(ArgumentType::SubscribeChannel, "source")
                .add_argument(ArgumentType::PublishChannel, "target")
                .add_argument(ArgumentType::StringParam, "count")
                .build(),
        )
    }

    fn file(path: &str) -> Option<NodeBinding> {
        Some(NodeBinding::File(PathBuf::from(path)))
    }

    #[test]
    fn test_resolve_bindings_in_declaration_order() {
        let mut graph = FilterNodeGraph::new();
        let input = graph.add_node(NodeKind::Input, file("in.txt"));
        let output = graph.add_node(NodeKind::Output, file("out.txt"));
        let instance = graph.add_instance("upper", uppercase());

        // Attach out of order; resolution still follows the declaration
        graph.attach(instance, 1, output).unwrap();
        graph.attach(instance, 0, input).unwrap();

        assert_eq!(
            graph.resolve_bindings_for(instance).unwrap(),
            vec!["in.txt".to_string(), "out.txt".to_string()]
        );
    }

    #[test]
    fn test_channel_and_literal_tokens() {
        let mut graph = FilterNodeGraph::new();
        let source = graph.add_node(
            NodeKind::Input,
            Some(NodeBinding::Channel(ChannelBinding::new(
                "mqtt://broker:1883",
                "sensor/+",
                QoS::AtLeastOnce,
            ))),
        );
        let target = graph.add_node(
            NodeKind::Output,
            Some(NodeBinding::Channel(ChannelBinding::new(
                "mqtt://broker:1883",
                "alerts",
                QoS::ExactlyOnce,
            ))),
        );
        let instance = graph.add_instance("relay", relay());
        graph.attach(instance, 0, source).unwrap();
        graph.attach(instance, 1, target).unwrap();
        graph.bind_literal(instance, 2, "5").unwrap();

        assert_eq!(
            graph.resolve_bindings_for(instance).unwrap(),
            vec![
                "mqtt://broker:1883/sensor/+?qos=1".to_string(),
                "mqtt://broker:1883/alerts?qos=2".to_string(),
                "5".to_string(),
            ]
        );
    }

    #[test]
    fn test_unbound_arguments_are_rejected() {
        struct TestCase {
            name: &'static str,
            bind_input: bool,
            input_binding: Option<NodeBinding>,
            expected_position: usize,
        }

        let test_cases = vec![
            TestCase {
                name: "slot never attached",
                bind_input: false,
                input_binding: file("in.txt"),
                expected_position: 0,
            },
            TestCase {
                name: "node without a resource",
                bind_input: true,
                input_binding: None,
                expected_position: 0,
            },
        ];

        for case in test_cases {
            let mut graph = FilterNodeGraph::new();
            let input = graph.add_node(NodeKind::Input, case.input_binding.clone());
            let output = graph.add_node(NodeKind::Output, file("out.txt"));
            let instance = graph.add_instance("upper", uppercase());
            if case.bind_input {
                graph.attach(instance, 0, input).unwrap();
            }
            graph.attach(instance, 1, output).unwrap();

            assert_eq!(
                graph.resolve_bindings_for(instance),
                Err(ConfigurationError::UnboundArgument {
                    instance: "upper".to_string(),
                    position: case.expected_position,
                }),
                "case: {}",
                case.name
            );
        }
    }

    #[test]
    fn test_late_binding_resolves() {
        let mut graph = FilterNodeGraph::new();
        let input = graph.add_node(NodeKind::Input, None);
        let output = graph.add_node(NodeKind::Output, file("out.txt"));
        let instance = graph.add_instance("upper", uppercase());
        graph.attach(instance, 0, input).unwrap();
        graph.attach(instance, 1, output).unwrap();
        assert!(graph.resolve_bindings_for(instance).is_err());

        graph.bind_node(input, NodeBinding::File(PathBuf::from("late.txt"))).unwrap();
        assert_eq!(graph.resolve_bindings_for(instance).unwrap()[0], "late.txt");
    }

    #[test]
    fn test_attach_checks_kind_and_position() {
        let mut graph = FilterNodeGraph::new();
        let input = graph.add_node(NodeKind::Input, file("in.txt"));
        let instance = graph.add_instance("upper", uppercase());

        assert_eq!(
            graph.attach(instance, 1, input),
            Err(ConfigurationError::NodeKindMismatch {
                node: "node#0".to_string(),
                kind: "input".to_string(),
                position: 1,
                expected: ArgumentType::OutputFile,
            })
        );
        assert_eq!(
            graph.attach(instance, 2, input),
            Err(ConfigurationError::PositionOutOfRange { position: 2, len: 2 })
        );
        assert!(matches!(
            graph.attach(instance, 0, NodeId(9)),
            Err(ConfigurationError::UnknownNode(_))
        ));
        assert!(matches!(
            graph.attach(InstanceId(4), 0, input),
            Err(ConfigurationError::UnknownInstance(_))
        ));
    }

    #[test]
    fn test_resource_kind_must_fit_argument() {
        let mut graph = FilterNodeGraph::new();
        let input = graph.add_node(
            NodeKind::Input,
            Some(NodeBinding::Channel(ChannelBinding::new(
                "mqtt://broker:1883",
                "in",
                QoS::AtLeastOnce,
            ))),
        );
        let output = graph.add_node(NodeKind::Output, file("out.txt"));
        let instance = graph.add_instance("upper", uppercase());
        graph.attach(instance, 0, input).unwrap();
        graph.attach(instance, 1, output).unwrap();

        assert!(matches!(
            graph.resolve_bindings_for(instance),
            Err(ConfigurationError::ArgumentTypeMismatch { position: 0, .. })
        ));
    }

    #[test]
    fn test_edges_record_dependencies() {
        let mut graph = FilterNodeGraph::new();
        let a = graph.add_node(NodeKind::Output, file("a.txt"));
        let b = graph.add_node(NodeKind::Input, file("a.txt"));
        let c = graph.add_node(NodeKind::Input, file("a.txt"));
        graph.connect(a, b).unwrap();
        graph.connect(a, c).unwrap();
        graph.connect(a, b).unwrap();

        assert_eq!(graph.edges().count(), 2);
        assert_eq!(graph.consumers_of(a), vec![b, c]);
        assert_eq!(graph.producers_of(c), vec![a]);
        assert!(graph.connect(a, NodeId(7)).is_err());
    }
}
