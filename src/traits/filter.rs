// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::filter::FilterDefinition;
use crate::runtime::FilterContext;

/// How a filter body finished on its own terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterExit {
    Success,
    /// Business failure with a filter-defined code. The runtime passes it
    /// through, except for codes that would be mistaken for success or an
    /// internal error.
    Failure(i32),
}

/// A filter body.
///
/// `run` executes once per launch on the calling thread. Returning `Err` or
/// panicking is an internal error, distinct from [`FilterExit::Failure`].
pub trait Filter: Send + Sync {
    fn definition(&self) -> Arc<FilterDefinition>;

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit>;
}
