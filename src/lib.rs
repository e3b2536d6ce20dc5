// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod config;     // pipeline files + constants
pub mod errors;     // error handling
pub mod filter;     // argument types, definitions, resolution
pub mod filters;    // built-in filters
pub mod graph;      // filter node graph
pub mod messaging;  // sessions, transports, in-memory broker
pub mod observability;
pub mod runtime;    // filter execution and pipelines
pub mod traits;     // unified abstractions
