// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Filter definitions, argument typing and positional resolution.

mod argument;
mod definition;
mod resolve;

pub use argument::{
    ArgumentDeclaration, ArgumentType, ArgumentValue, ChannelBinding, ResolvedArgument,
};
pub use definition::{FilterDefinition, FilterDefinitionBuilder};
pub use resolve::{coerce_token, parse_channel_token, resolve_arguments, ResolutionDefaults};
