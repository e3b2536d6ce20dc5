// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for argument resolution.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Every token coerced to its declared type.
///
/// # Log Level
/// `debug!` - Detailed diagnostic information
pub struct ArgumentsResolved<'a> {
    pub filter: &'a str,
    pub count: usize,
}

impl Display for ArgumentsResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Resolved {} argument(s) for filter '{}'",
            self.count, self.filter
        )
    }
}

impl StructuredLog for ArgumentsResolved<'_> {
    fn log(&self) {
        tracing::debug!(filter = self.filter, count = self.count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "resolution",
            span_name = name,
            filter = self.filter,
            count = self.count,
        )
    }
}

/// # Log Level
/// `error!` - The launch is rejected
pub struct ResolutionFailed<'a> {
    pub filter: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ResolutionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Argument resolution failed for filter '{}': {}",
            self.filter, self.error
        )
    }
}

impl StructuredLog for ResolutionFailed<'_> {
    fn log(&self) {
        tracing::error!(filter = self.filter, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "resolution_failed",
            span_name = name,
            filter = self.filter,
            error = %self.error,
        )
    }
}
