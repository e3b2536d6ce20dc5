// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for pipeline files and instance launches.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// # Log Level
/// `info!` - Important operational event
pub struct PipelineLoaded<'a> {
    pub path: &'a str,
    pub node_count: usize,
    pub instance_count: usize,
}

impl Display for PipelineLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded pipeline {}: {} node(s), {} instance(s)",
            self.path, self.node_count, self.instance_count
        )
    }
}

impl StructuredLog for PipelineLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            path = self.path,
            node_count = self.node_count,
            instance_count = self.instance_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("pipeline", span_name = name, path = self.path)
    }
}

/// # Log Level
/// `info!` - Important operational event
pub struct InstanceLaunched<'a> {
    pub instance: &'a str,
    pub filter: &'a str,
}

impl Display for InstanceLaunched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Launching instance '{}' of filter '{}'",
            self.instance, self.filter
        )
    }
}

impl StructuredLog for InstanceLaunched<'_> {
    fn log(&self) {
        tracing::info!(instance = self.instance, filter = self.filter, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "instance",
            span_name = name,
            instance = self.instance,
            filter = self.filter,
        )
    }
}

/// # Log Level
/// `info!` on exit code 0, `error!` otherwise
pub struct InstanceExited<'a> {
    pub instance: &'a str,
    pub exit_code: i32,
}

impl Display for InstanceExited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Instance '{}' exited with code {}",
            self.instance, self.exit_code
        )
    }
}

impl StructuredLog for InstanceExited<'_> {
    fn log(&self) {
        if self.exit_code == 0 {
            tracing::info!(instance = self.instance, exit_code = self.exit_code, "{}", self);
        } else {
            tracing::error!(instance = self.instance, exit_code = self.exit_code, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "instance_exited",
            span_name = name,
            instance = self.instance,
            exit_code = self.exit_code,
        )
    }
}

/// # Log Level
/// `error!` - No instance is started
pub struct PipelineRejected<'a> {
    pub error: &'a dyn std::error::Error,
}

impl Display for PipelineRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline rejected before launch: {}", self.error)
    }
}

impl StructuredLog for PipelineRejected<'_> {
    fn log(&self) {
        tracing::error!(error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("pipeline_rejected", span_name = name)
    }
}

/// # Log Level
/// `debug!` - Persistent subscription registered ahead of a launch
pub struct SubscriptionPrimed<'a> {
    pub client_id: &'a str,
    pub topic_filter: &'a str,
}

impl Display for SubscriptionPrimed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Registered subscription '{}' for client '{}'",
            self.topic_filter, self.client_id
        )
    }
}

impl StructuredLog for SubscriptionPrimed<'_> {
    fn log(&self) {
        tracing::debug!(
            client_id = self.client_id,
            topic_filter = self.topic_filter,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("subscription_primed", span_name = name, client_id = self.client_id)
    }
}

/// # Log Level
/// `warn!` - The instance still subscribes itself but may miss early messages
pub struct PrimingFailed<'a> {
    pub client_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for PrimingFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Could not register subscriptions for client '{}': {}",
            self.client_id, self.error
        )
    }
}

impl StructuredLog for PrimingFailed<'_> {
    fn log(&self) {
        tracing::warn!(client_id = self.client_id, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("priming_failed", span_name = name, client_id = self.client_id)
    }
}
