// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod loader;
mod runtime;
mod validation;

pub mod consts;

pub use loader::{
    load_and_validate_pipeline, load_pipeline, ArgumentConfig, ArgumentSource, BrokerConfig,
    ChannelConfig, EdgeConfig, InstanceConfig, NodeConfig, PipelineConfig,
};
pub use runtime::PipelineBuilder;
pub use validation::validate_pipeline;
