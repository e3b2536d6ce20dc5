// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::loader::{ArgumentSource, NodeConfig, PipelineConfig};
use crate::config::validate_pipeline;
use crate::errors::{ConfigurationError, PipelineConfigError, ValidationError};
use crate::filter::{ChannelBinding, ResolutionDefaults};
use crate::filters::FilterRegistry;
use crate::graph::{FilterNodeGraph, NodeBinding, NodeId};
use crate::runtime::Pipeline;
use crate::traits::Filter;

/// Pipeline builder - turns a pipeline file into a runnable [`Pipeline`].
///
/// The builder validates the file, adds one graph node per declared node,
/// connects the declared edges, and adds one filter instance per declared
/// instance with its arguments attached. Nodes and literals are checked
/// against the filter's argument types while they are attached, so a wrong
/// wiring fails here rather than inside a running filter.
///
/// # Examples
///
/// ```
/// use filterflow::config::{PipelineBuilder, PipelineConfig};
/// use filterflow::filters::FilterRegistry;
///
/// let cfg: PipelineConfig = serde_yaml::from_str(
///     r#"
/// nodes:
///   - { id: in, kind: input, path: in.txt }
///   - { id: out, kind: output, path: out.txt }
/// instances:
///   - { id: shout, filter: uppercase, arguments: [{ node: in }, { node: out }] }
/// "#,
/// )
/// .unwrap();
///
/// let pipeline = PipelineBuilder::from_config(&cfg, &FilterRegistry::builtin()).unwrap();
/// assert_eq!(pipeline.graph().nodes().len(), 2);
/// assert_eq!(
///     pipeline.graph().resolve_bindings_for(pipeline.graph().instances()[0].id()).unwrap(),
///     vec!["in.txt".to_string(), "out.txt".to_string()]
/// );
/// ```
pub struct PipelineBuilder;

impl PipelineBuilder {
    /// Build a pipeline from configuration.
    ///
    /// # Returns
    /// A [`Pipeline`] whose graph holds every node, edge and instance of
    /// `cfg`, with every instance argument bound.
    pub fn from_config(
        cfg: &PipelineConfig,
        registry: &FilterRegistry,
    ) -> Result<Pipeline, PipelineConfigError> {
        validate_pipeline(cfg, registry).map_err(PipelineConfigError::Invalid)?;

        let defaults = ResolutionDefaults {
            broker_address: cfg.broker.address.clone(),
            qos: cfg.broker.default_qos,
        };

        let mut graph = FilterNodeGraph::new();
        let mut node_ids: HashMap<&str, NodeId> = HashMap::new();
        for node in &cfg.nodes {
            let id = graph.add_node(node.kind, node_binding(node, &defaults));
            node_ids.insert(node.id.as_str(), id);
        }

        let lookup = |id: &str| {
            node_ids
                .get(id)
                .copied()
                .ok_or_else(|| ConfigurationError::UnknownNode(id.to_string()))
        };

        for edge in &cfg.edges {
            graph.connect(lookup(&edge.from)?, lookup(&edge.to)?)?;
        }

        let mut filters: Vec<Arc<dyn Filter>> = Vec::with_capacity(cfg.instances.len());
        for instance in &cfg.instances {
            let filter = registry.get(&instance.filter)?;
            let id = graph.add_instance(instance.id.clone(), filter.definition());
            for (position, argument) in instance.arguments.iter().enumerate() {
                match argument.source() {
                    Ok(ArgumentSource::Node(node)) => graph.attach(id, position, lookup(node)?)?,
                    Ok(ArgumentSource::Literal(value)) => graph.bind_literal(id, position, value)?,
                    Err(reason) => {
                        return Err(PipelineConfigError::Invalid(vec![
                            ValidationError::InvalidArgument {
                                instance_id: instance.id.clone(),
                                position,
                                reason,
                            },
                        ]))
                    }
                }
            }
            filters.push(filter);
        }

        Ok(Pipeline::new(graph, filters, defaults, cfg.broker.clone()))
    }
}

fn node_binding(node: &NodeConfig, defaults: &ResolutionDefaults) -> Option<NodeBinding> {
    if let Some(path) = &node.path {
        return Some(NodeBinding::File(path.clone()));
    }
    node.channel.as_ref().map(|channel| {
        NodeBinding::Channel(ChannelBinding::new(
            channel
                .broker
                .clone()
                .unwrap_or_else(|| defaults.broker_address.clone()),
            channel.topic.clone(),
            channel.qos.unwrap_or(defaults.qos),
        ))
    })
}
