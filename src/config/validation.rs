// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation for pipeline files.
//!
//! Validation runs before any graph is built or any filter starts, and it
//! never stops at the first problem: every check runs and all findings are
//! returned together so a pipeline author can fix them in one pass.
//!
//! # Checks
//!
//! 1. **Node ids** are unique and each node declares exactly one of `path`
//!    or `channel`.
//! 2. **Instance ids** are unique and name a registered filter.
//! 3. **Arguments** match the filter's declared arity, each entry is either
//!    a node reference or a scalar value, and every referenced node exists.
//! 4. **Edges** reference existing nodes.
//! 5. **Broker addresses**, in the `broker` section and on channels, parse
//!    as `scheme://host[:port]` with a supported scheme.
//!
//! Type compatibility between a node and the argument it binds is checked
//! later, when the graph is assembled, because it depends on the filter
//! definitions rather than on the file alone.
//!
//! # Example
//! ```rust
//! use filterflow::config::{validate_pipeline, PipelineConfig};
//! use filterflow::errors::ValidationError;
//! use filterflow::filters::FilterRegistry;
//!
//! let cfg: PipelineConfig = serde_yaml::from_str(
//!     r#"
//! nodes:
//!   - { id: in, kind: input, path: in.txt }
//! instances:
//!   - id: shout
//!     filter: uppercase
//!     arguments: [{ node: in }, { node: out }]
//! "#,
//! )
//! .unwrap();
//!
//! let errors = validate_pipeline(&cfg, &FilterRegistry::builtin()).unwrap_err();
//! assert_eq!(
//!     errors,
//!     vec![ValidationError::UnresolvedNode {
//!         referenced_by: "instance 'shout' argument 1".to_string(),
//!         node_id: "out".to_string(),
//!     }]
//! );
//! ```

use std::collections::HashSet;

use crate::config::loader::{ArgumentSource, PipelineConfig};
use crate::errors::ValidationError;
use crate::filters::FilterRegistry;
use crate::messaging::normalize_broker_address;

/// Validate `cfg` against the filters available in `registry`.
///
/// # Returns
///
/// * `Ok(())` - The pipeline can be assembled into a graph
/// * `Err(Vec<ValidationError>)` - Every problem found, in file order
pub fn validate_pipeline(
    cfg: &PipelineConfig,
    registry: &FilterRegistry,
) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let node_ids = validate_nodes(cfg, &mut errors);
    validate_instances(cfg, registry, &node_ids, &mut errors);
    validate_edges(cfg, &node_ids, &mut errors);
    validate_broker_addresses(cfg, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_nodes<'a>(cfg: &'a PipelineConfig, errors: &mut Vec<ValidationError>) -> HashSet<&'a str> {
    let mut seen = HashSet::new();
    for node in &cfg.nodes {
        if !seen.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
        if node.path.is_some() == node.channel.is_some() {
            errors.push(ValidationError::AmbiguousBinding {
                node_id: node.id.clone(),
            });
        }
    }
    seen
}

fn validate_instances(
    cfg: &PipelineConfig,
    registry: &FilterRegistry,
    node_ids: &HashSet<&str>,
    errors: &mut Vec<ValidationError>,
) {
    let mut seen = HashSet::new();
    for instance in &cfg.instances {
        if !seen.insert(instance.id.as_str()) {
            errors.push(ValidationError::DuplicateInstanceId {
                instance_id: instance.id.clone(),
            });
        }

        match registry.get(&instance.filter) {
            Ok(filter) => {
                let expected = filter.definition().arity();
                if expected != instance.arguments.len() {
                    errors.push(ValidationError::ArgumentCount {
                        instance_id: instance.id.clone(),
                        expected,
                        actual: instance.arguments.len(),
                    });
                }
            }
            Err(_) => errors.push(ValidationError::UnknownFilter {
                instance_id: instance.id.clone(),
                filter: instance.filter.clone(),
            }),
        }

        for (position, argument) in instance.arguments.iter().enumerate() {
            match argument.source() {
                Ok(ArgumentSource::Node(node_id)) if !node_ids.contains(node_id) => {
                    errors.push(ValidationError::UnresolvedNode {
                        referenced_by: format!("instance '{}' argument {}", instance.id, position),
                        node_id: node_id.to_string(),
                    });
                }
                Ok(_) => {}
                Err(reason) => errors.push(ValidationError::InvalidArgument {
                    instance_id: instance.id.clone(),
                    position,
                    reason,
                }),
            }
        }
    }
}

fn validate_edges(cfg: &PipelineConfig, node_ids: &HashSet<&str>, errors: &mut Vec<ValidationError>) {
    for edge in &cfg.edges {
        for endpoint in [&edge.from, &edge.to] {
            if !node_ids.contains(endpoint.as_str()) {
                errors.push(ValidationError::UnresolvedNode {
                    referenced_by: format!("edge {} -> {}", edge.from, edge.to),
                    node_id: endpoint.clone(),
                });
            }
        }
    }
}

fn validate_broker_addresses(cfg: &PipelineConfig, errors: &mut Vec<ValidationError>) {
    let section = std::iter::once(("broker section".to_string(), &cfg.broker.address));
    let channels = cfg.nodes.iter().filter_map(|node| {
        let address = node.channel.as_ref()?.broker.as_ref()?;
        Some((format!("node '{}'", node.id), address))
    });

    for (referenced_by, address) in section.chain(channels) {
        if let Err(reason) = normalize_broker_address(address) {
            errors.push(ValidationError::InvalidBrokerAddress {
                referenced_by,
                address: address.clone(),
                reason,
            });
        }
    }
}
