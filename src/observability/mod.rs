// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structured logging for the filter runtime.
//!
//! Runtime, session and pipeline lifecycle events are message structs with a
//! `Display` implementation and a [`messages::StructuredLog`] impl that picks
//! the level and attaches the struct's fields to the `tracing` event. Filter
//! bodies report their own business failures with plain `tracing` macros.
//!
//! # Usage
//!
//! ```rust
//! use filterflow::observability::messages::filter::FilterStarted;
//! use filterflow::observability::messages::StructuredLog;
//!
//! FilterStarted {
//!     filter: "uppercase",
//!     argument_count: 2,
//! }
//! .log();
//! ```

pub mod messages;
