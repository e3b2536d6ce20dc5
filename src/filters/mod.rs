// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in filters.
//!
//! | Filter | Signature |
//! |--------|-----------|
//! | `uppercase` | `[IN] [OUT]` |
//! | `lowercase` | `[IN] [OUT]` |
//! | `publish_lines` | `[IN] [PUB]` |
//! | `collect_messages` | `[SUB] [OUT] [PARAM]` |
//! | `relay` | `[SUB] [PUB] [PARAM]` |
//!
//! Failure codes follow the BSD sysexits convention, which keeps them clear
//! of both success and the runtime's internal error code.

mod change_case;
mod channel;
mod collect_messages;
mod publish_lines;
mod registry;
mod relay;

pub use change_case::ChangeCaseFilter;
pub use collect_messages::CollectMessagesFilter;
pub use publish_lines::PublishLinesFilter;
pub use registry::FilterRegistry;
pub use relay::RelayFilter;

/// A string parameter could not be parsed
pub const EXIT_DATA_INVALID: i32 = 65;
/// Input file missing or unreadable
pub const EXIT_INPUT_UNAVAILABLE: i32 = 66;
/// Broker unreachable, rejected the connection or dropped it
pub const EXIT_BROKER_UNAVAILABLE: i32 = 69;
/// Output file could not be written
pub const EXIT_OUTPUT_UNWRITABLE: i32 = 73;
/// No message arrived within the receive timeout
pub const EXIT_TIMED_OUT: i32 = 75;
