// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for filter runs:
//! * Body start and completion with exit code
//! * Internal errors and panics caught at the runtime boundary
//! * Launches rejected before the body starts

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Filter body is about to run.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use filterflow::observability::messages::filter::FilterStarted;
///
/// let msg = FilterStarted {
///     filter: "uppercase",
///     argument_count: 2,
/// };
///
/// assert_eq!(msg.to_string(), "Running filter 'uppercase' with 2 argument(s)");
/// ```
pub struct FilterStarted<'a> {
    pub filter: &'a str,
    pub argument_count: usize,
}

impl Display for FilterStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running filter '{}' with {} argument(s)",
            self.filter, self.argument_count
        )
    }
}

impl StructuredLog for FilterStarted<'_> {
    fn log(&self) {
        tracing::info!(
            filter = self.filter,
            argument_count = self.argument_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "filter",
            span_name = name,
            filter = self.filter,
            argument_count = self.argument_count,
        )
    }
}

/// Filter body returned and the runtime produced an exit code.
///
/// # Log Level
/// `info!` on success, `warn!` on a reported failure
pub struct FilterCompleted<'a> {
    pub filter: &'a str,
    pub exit_code: i32,
    pub duration: Duration,
}

impl Display for FilterCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Filter '{}' finished with exit code {} in {:?}",
            self.filter, self.exit_code, self.duration
        )
    }
}

impl StructuredLog for FilterCompleted<'_> {
    fn log(&self) {
        if self.exit_code == 0 {
            tracing::info!(
                filter = self.filter,
                exit_code = self.exit_code,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        } else {
            tracing::warn!(
                filter = self.filter,
                exit_code = self.exit_code,
                duration_ms = self.duration.as_millis() as u64,
                "{}", self
            );
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "filter_completed",
            span_name = name,
            filter = self.filter,
            exit_code = self.exit_code,
            duration = ?self.duration,
        )
    }
}

/// Filter body returned an error.
///
/// # Log Level
/// `error!` - Internal error
pub struct FilterFailed<'a> {
    pub filter: &'a str,
    pub error: &'a anyhow::Error,
}

impl Display for FilterFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Filter '{}' failed: {:#}", self.filter, self.error)
    }
}

impl StructuredLog for FilterFailed<'_> {
    fn log(&self) {
        tracing::error!(filter = self.filter, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "filter_failed",
            span_name = name,
            filter = self.filter,
            error = %self.error,
        )
    }
}

/// # Log Level
/// `error!` - Internal error
pub struct FilterPanicked<'a> {
    pub filter: &'a str,
    pub panic: &'a str,
}

impl Display for FilterPanicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Filter '{}' panicked: {}", self.filter, self.panic)
    }
}

impl StructuredLog for FilterPanicked<'_> {
    fn log(&self) {
        tracing::error!(filter = self.filter, panic = self.panic, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("filter_panicked", span_name = name, filter = self.filter)
    }
}

/// A filter reported a failure code that collides with success or the
/// internal error code.
///
/// # Log Level
/// `warn!` - Filter bug, run continues
pub struct ExitCodeNormalized<'a> {
    pub filter: &'a str,
    pub reported: i32,
    pub normalized: i32,
}

impl Display for ExitCodeNormalized<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Filter '{}' reported failure with reserved code {}, using {}",
            self.filter, self.reported, self.normalized
        )
    }
}

impl StructuredLog for ExitCodeNormalized<'_> {
    fn log(&self) {
        tracing::warn!(
            filter = self.filter,
            reported = self.reported,
            normalized = self.normalized,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "exit_code_normalized",
            span_name = name,
            filter = self.filter,
            reported = self.reported,
        )
    }
}

/// Arguments did not line up with the definition; the body never ran.
///
/// # Log Level
/// `error!` - Configuration error
pub struct LaunchRejected<'a> {
    pub filter: &'a str,
    pub reason: &'a str,
}

impl Display for LaunchRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Launch of filter '{}' rejected: {}", self.filter, self.reason)
    }
}

impl StructuredLog for LaunchRejected<'_> {
    fn log(&self) {
        tracing::error!(filter = self.filter, reason = self.reason, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("launch_rejected", span_name = name, filter = self.filter)
    }
}
