// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod messaging;
mod pipeline;

pub use config::{ArgumentAccessError, ConfigurationError};
pub use messaging::{ConnectError, LostCause, SessionError, TransportError};
pub use pipeline::{PipelineConfigError, ValidationError};
