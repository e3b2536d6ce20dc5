// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for structured logging, grouped by subsystem:
//!
//! * `filter` - filter runs, exit codes and launch failures
//! * `pipeline` - pipeline files and instance launches
//! * `resolution` - positional argument resolution
//! * `session` - messaging session lifecycle and deliveries

use tracing::Span;

pub mod filter;
pub mod pipeline;
pub mod resolution;
pub mod session;

/// A log message that knows its own level and structured fields.
pub trait StructuredLog: std::fmt::Display {
    /// Emit the message as a `tracing` event.
    fn log(&self);

    /// A span carrying the same fields, for scoping work under the message.
    fn span(&self, name: &str) -> Span;
}
