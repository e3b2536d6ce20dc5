// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ConfigurationError;
use crate::filter::FilterDefinition;
use crate::traits::Filter;

use super::{ChangeCaseFilter, CollectMessagesFilter, PublishLinesFilter, RelayFilter};

/// Filters available by name.
#[derive(Clone, Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Arc<dyn Filter>>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in filter.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ChangeCaseFilter::upper()));
        registry.register(Arc::new(ChangeCaseFilter::lower()));
        registry.register(Arc::new(PublishLinesFilter::new()));
        registry.register(Arc::new(CollectMessagesFilter::new()));
        registry.register(Arc::new(RelayFilter::new()));
        registry
    }

    /// Add a filter under its definition's name, replacing any filter with
    /// the same name.
    pub fn register(&mut self, filter: Arc<dyn Filter>) {
        let name = filter.definition().name().to_string();
        self.filters.insert(name, filter);
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn Filter>, ConfigurationError> {
        self.filters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownFilter(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    /// Names in sorted order.
    pub fn names(&self) -> Vec<&str> {
        self.filters.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<Arc<FilterDefinition>> {
        self.filters.values().map(|f| f.definition()).collect()
    }
}
