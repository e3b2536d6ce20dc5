// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_BROKER_ADDRESS, DEFAULT_CLIENT_ID_PREFIX, DEFAULT_DELIVERY_QUEUE_CAPACITY,
    DEFAULT_KEEP_ALIVE_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QOS_LEVEL,
};
use crate::errors::PipelineConfigError;
use crate::filters::FilterRegistry;
use crate::graph::NodeKind;
use crate::messaging::{Credentials, QoS};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// A pipeline file: nodes, the filter instances wired to them, and the
/// broker settings shared by every messaging filter.
///
/// # Example
/// ```yaml
/// broker:
///   address: mem://local
/// nodes:
///   - id: source
///     kind: input
///     path: data/lines.txt
///   - id: raw
///     kind: output
///     channel: { topic: lines/raw, qos: 1 }
///   - id: raw_in
///     kind: input
///     channel: { topic: lines/raw }
///   - id: collected
///     kind: output
///     path: data/collected.txt
/// edges:
///   - { from: raw, to: raw_in }
/// instances:
///   - id: publisher
///     filter: publish_lines
///     arguments: [{ node: source }, { node: raw }]
///   - id: collector
///     filter: collect_messages
///     arguments: [{ node: raw_in }, { node: collected }, { value: 3 }]
/// ```
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub broker: BrokerConfig,
    pub nodes: Vec<NodeConfig>,
    #[serde(default)]
    pub edges: Vec<EdgeConfig>,
    pub instances: Vec<InstanceConfig>,
}

/// Connection settings for every session a pipeline opens.
///
/// `clean_session` defaults to false here: the launcher registers each
/// subscriber's subscriptions before starting any filter, and only a
/// persistent session keeps what was published in between.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub address: String,
    pub client_id_prefix: String,
    pub keep_alive_secs: u64,
    pub clean_session: bool,
    pub credentials: Option<Credentials>,
    pub delivery_queue_capacity: usize,
    pub poll_interval_ms: u64,
    pub default_qos: QoS,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_BROKER_ADDRESS.to_string(),
            client_id_prefix: DEFAULT_CLIENT_ID_PREFIX.to_string(),
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            clean_session: false,
            credentials: None,
            delivery_queue_capacity: DEFAULT_DELIVERY_QUEUE_CAPACITY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            default_qos: QoS::try_from(DEFAULT_QOS_LEVEL).unwrap_or(QoS::AtLeastOnce),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    pub kind: NodeKind,
    pub path: Option<PathBuf>,
    pub channel: Option<ChannelConfig>,
}

/// Missing `qos` and `broker` fall back to the `broker` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
    pub topic: String,
    pub qos: Option<QoS>,
    pub broker: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EdgeConfig {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstanceConfig {
    pub id: String,
    pub filter: String,
    #[serde(default)]
    pub arguments: Vec<ArgumentConfig>,
}

/// One positional argument: `{ node: <id> }` or `{ value: <scalar> }`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArgumentConfig {
    pub node: Option<String>,
    pub value: Option<serde_yaml::Value>,
}

/// Validated form of an [`ArgumentConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArgumentSource<'a> {
    Node(&'a str),
    Literal(String),
}

impl ArgumentConfig {
    pub fn source(&self) -> Result<ArgumentSource<'_>, String> {
        match (&self.node, &self.value) {
            (Some(node), None) => Ok(ArgumentSource::Node(node.as_str())),
            (None, Some(value)) => scalar_to_string(value).map(ArgumentSource::Literal),
            (Some(_), Some(_)) => Err("declare either 'node' or 'value', not both".to_string()),
            (None, None) => Err("declare one of 'node' or 'value'".to_string()),
        }
    }
}

fn scalar_to_string(value: &serde_yaml::Value) -> Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        _ => Err("'value' must be a string, number or boolean".to_string()),
    }
}

/// Load a pipeline from a YAML file
pub fn load_pipeline<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, PipelineConfigError> {
    let content = fs::read_to_string(path)?;
    let cfg: PipelineConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Load a pipeline and check it against the filters in `registry`. Every
/// validation problem is reported at once.
pub fn load_and_validate_pipeline<P: AsRef<Path>>(
    path: P,
    registry: &FilterRegistry,
) -> Result<PipelineConfig, PipelineConfigError> {
    let cfg = load_pipeline(path)?;
    crate::config::validate_pipeline(&cfg, registry).map_err(PipelineConfigError::Invalid)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_basic_pipeline() {
        let yaml = r#"
nodes:
  - id: in
    kind: input
    path: in.txt
  - id: out
    kind: output
    channel: { topic: upper, qos: 2 }
instances:
  - id: upper
    filter: uppercase
    arguments:
      - node: in
      - node: out
"#;

        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.broker.address, DEFAULT_BROKER_ADDRESS);
        assert!(!cfg.broker.clean_session);
        assert_eq!(cfg.nodes.len(), 2);
        assert_eq!(cfg.nodes[0].kind, NodeKind::Input);
        assert_eq!(cfg.nodes[1].channel.as_ref().unwrap().qos, Some(QoS::ExactlyOnce));
        assert!(cfg.edges.is_empty());
        assert_eq!(cfg.instances[0].arguments[1].source(), Ok(ArgumentSource::Node("out")));
    }

    #[test]
    fn parse_broker_section() {
        let yaml = r#"
broker:
  address: mqtt://broker.local:1883
  credentials: { username: filter, password: secret }
  default_qos: 0
  poll_interval_ms: 10
nodes: []
instances: []
"#;

        let cfg: PipelineConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(cfg.broker.address, "mqtt://broker.local:1883");
        assert_eq!(cfg.broker.default_qos, QoS::AtMostOnce);
        assert_eq!(cfg.broker.poll_interval_ms, 10);
        assert_eq!(cfg.broker.delivery_queue_capacity, DEFAULT_DELIVERY_QUEUE_CAPACITY);
        assert_eq!(cfg.broker.credentials, Some(Credentials::new("filter", "secret")));
    }

    #[test]
    fn reject_invalid_qos() {
        let yaml = r#"
broker:
  default_qos: 3
nodes: []
instances: []
"#;
        assert!(serde_yaml::from_str::<PipelineConfig>(yaml).is_err());
    }

    #[test]
    fn argument_sources() {
        let parse = |yaml: &str| serde_yaml::from_str::<ArgumentConfig>(yaml).unwrap();

        assert_eq!(
            parse("value: 3").source(),
            Ok(ArgumentSource::Literal("3".to_string()))
        );
        assert_eq!(
            parse("value: hello").source(),
            Ok(ArgumentSource::Literal("hello".to_string()))
        );
        assert!(parse("{ node: a, value: b }").source().is_err());
        assert!(parse("{}").source().is_err());
        assert!(parse("value: [1, 2]").source().is_err());
    }
}
