// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fs;
use std::sync::Arc;

use crate::filter::{ArgumentType, FilterDefinition};
use crate::runtime::FilterContext;
use crate::traits::{Filter, FilterExit};

use super::{EXIT_INPUT_UNAVAILABLE, EXIT_OUTPUT_UNWRITABLE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Case {
    Upper,
    Lower,
}

/// Rewrites the ASCII letters of a file in one case. Other bytes pass
/// through untouched, so any encoding survives.
pub struct ChangeCaseFilter {
    case: Case,
    definition: Arc<FilterDefinition>,
}

impl ChangeCaseFilter {
    pub fn upper() -> Self {
        Self::new(Case::Upper, "uppercase", "Uppercase", "Uppercases the ASCII letters of a file")
    }

    pub fn lower() -> Self {
        Self::new(Case::Lower, "lowercase", "Lowercase", "Lowercases the ASCII letters of a file")
    }

    fn new(case: Case, name: &str, title: &str, description: &str) -> Self {
        let definition = FilterDefinition::declare(name, title, description)
            .add_argument(ArgumentType::InputFile, "File to read")
            .add_argument(ArgumentType::OutputFile, "File to write")
            .build();
        Self {
            case,
            definition: Arc::new(definition),
        }
    }

    fn convert(&self, mut bytes: Vec<u8>) -> Vec<u8> {
        match self.case {
            Case::Upper => bytes.make_ascii_uppercase(),
            Case::Lower => bytes.make_ascii_lowercase(),
        }
        bytes
    }
}

impl Filter for ChangeCaseFilter {
    fn definition(&self) -> Arc<FilterDefinition> {
        self.definition.clone()
    }

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit> {
        let input = context.input_path(0)?;
        let output = context.output_path(1)?;

        let contents = match fs::read(input) {
            Ok(contents) => contents,
            Err(error) => {
                tracing::error!("Cannot read {}: {}", input.display(), error);
                return Ok(FilterExit::Failure(EXIT_INPUT_UNAVAILABLE));
            }
        };
        if let Err(error) = fs::write(output, self.convert(contents)) {
            tracing::error!("Cannot write {}: {}", output.display(), error);
            return Ok(FilterExit::Failure(EXIT_OUTPUT_UNWRITABLE));
        }
        Ok(FilterExit::Success)
    }
}
