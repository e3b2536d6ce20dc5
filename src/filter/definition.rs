// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Serialize;

use super::argument::{ArgumentDeclaration, ArgumentType};

/// Static description of a filter.
///
/// Argument order is the positional binding order used at launch. A built
/// definition is immutable; share it behind an `Arc` across concurrent runs.
///
/// # Example
/// ```
/// use filterflow::filter::{ArgumentType, FilterDefinition};
///
/// let definition = FilterDefinition::declare("uppercase", "Uppercase", "Uppercases a file")
///     .add_argument(ArgumentType::InputFile, "source")
///     .add_argument(ArgumentType::OutputFile, "destination")
///     .build();
///
/// assert_eq!(definition.arity(), 2);
/// assert_eq!(definition.signature(), "[IN] [OUT]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterDefinition {
    name: String,
    title: String,
    description: String,
    arguments: Vec<ArgumentDeclaration>,
}

impl FilterDefinition {
    pub fn declare(
        name: impl Into<String>,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> FilterDefinitionBuilder {
        FilterDefinitionBuilder {
            name: name.into(),
            title: title.into(),
            description: description.into(),
            arguments: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn arguments(&self) -> &[ArgumentDeclaration] {
        &self.arguments
    }

    pub fn argument(&self, position: usize) -> Option<&ArgumentDeclaration> {
        self.arguments.get(position)
    }

    pub fn arity(&self) -> usize {
        self.arguments.len()
    }

    /// Space separated argument markers, e.g. `[SUB] [OUT] [PARAM]`.
    pub fn signature(&self) -> String {
        self.arguments
            .iter()
            .map(|a| a.arg_type().marker())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// True if any argument is backed by a message channel.
    pub fn uses_messaging(&self) -> bool {
        self.arguments.iter().any(|a| a.arg_type().is_channel())
    }
}

pub struct FilterDefinitionBuilder {
    name: String,
    title: String,
    description: String,
    arguments: Vec<ArgumentDeclaration>,
}

impl FilterDefinitionBuilder {
    /// Append an argument. Call order is declaration order.
    pub fn add_argument(mut self, arg_type: ArgumentType, description: impl Into<String>) -> Self {
        self.arguments
            .push(ArgumentDeclaration::new(arg_type, description));
        self
    }

    pub fn build(self) -> FilterDefinition {
        FilterDefinition {
            name: self.name,
            title: self.title,
            description: self.description,
            arguments: self.arguments,
        }
    }
}
