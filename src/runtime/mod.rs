// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The execution shell around a filter body.
//!
//! A [`FilterRuntime`] turns resolved arguments into one synchronous body
//! execution and one exit code. Three classes of outcome stay
//! distinguishable to the caller:
//!
//! | Outcome | Exit code |
//! |---------|-----------|
//! | body returned [`FilterExit::Success`] | [`EXIT_SUCCESS`] |
//! | body returned [`FilterExit::Failure`] | the filter's code |
//! | body returned `Err` or panicked | [`EXIT_INTERNAL_ERROR`] |
//!
//! | arguments rejected before the body ran | [`EXIT_CONFIGURATION_ERROR`] |
//!
//! A reported failure code that equals [`EXIT_SUCCESS`],
//! [`EXIT_CONFIGURATION_ERROR`] or [`EXIT_INTERNAL_ERROR`] is replaced by
//! [`EXIT_GENERIC_FAILURE`].

mod context;
mod pipeline;

#[cfg(test)]
mod integration_tests;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

pub use context::{FilterContext, MessagingOptions};
pub use pipeline::Pipeline;

pub use crate::config::consts::{
    EXIT_CONFIGURATION_ERROR, EXIT_GENERIC_FAILURE, EXIT_INTERNAL_ERROR, EXIT_SUCCESS,
};
use crate::errors::ConfigurationError;
use crate::filter::{resolve_arguments, FilterDefinition, ResolutionDefaults, ResolvedArgument};
use crate::messaging::session::panic_message;
use crate::observability::messages::filter::{
    ExitCodeNormalized, FilterCompleted, FilterFailed, FilterPanicked, FilterStarted, LaunchRejected,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Filter, FilterExit};

pub struct FilterRuntime {
    filter: Arc<dyn Filter>,
    instance: String,
    defaults: ResolutionDefaults,
    messaging: Option<MessagingOptions>,
}

impl FilterRuntime {
    pub fn new(filter: Arc<dyn Filter>) -> Self {
        let instance = filter.definition().name().to_string();
        Self {
            filter,
            instance,
            defaults: ResolutionDefaults::default(),
            messaging: None,
        }
    }

    /// Name of this launch, used for logging and session client ids.
    pub fn with_instance(mut self, instance: impl Into<String>) -> Self {
        self.instance = instance.into();
        self
    }

    pub fn with_defaults(mut self, defaults: ResolutionDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Without messaging options, opening a session fails with
    /// [`crate::errors::ConnectError::NoTransport`].
    pub fn with_messaging(mut self, messaging: MessagingOptions) -> Self {
        self.messaging = Some(messaging);
        self
    }

    pub fn definition(&self) -> Arc<FilterDefinition> {
        self.filter.definition()
    }

    /// Resolve raw positional tokens and run the body.
    ///
    /// A configuration error is returned before the body is reached.
    pub fn launch<S: AsRef<str>>(&self, tokens: &[S]) -> Result<i32, ConfigurationError> {
        let definition = self.filter.definition();
        let arguments = resolve_arguments(&definition, tokens, &self.defaults)?;
        Ok(self.run(arguments))
    }

    /// Run the body once against already resolved arguments.
    pub fn run(&self, arguments: Vec<ResolvedArgument>) -> i32 {
        let definition = self.filter.definition();
        if let Err(reason) = check_arguments(&definition, &arguments) {
            LaunchRejected {
                filter: definition.name(),
                reason: &reason,
            }
            .log();
            return EXIT_CONFIGURATION_ERROR;
        }

        let start_msg = FilterStarted {
            filter: definition.name(),
            argument_count: arguments.len(),
        };
        let span = start_msg.span("filter_execution");
        let _guard = span.enter();
        start_msg.log();

        let started = Instant::now();
        let mut context = FilterContext::new(
            self.instance.clone(),
            definition.clone(),
            arguments,
            self.messaging.clone(),
        );
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.filter.run(&mut context)));

        let exit_code = match outcome {
            Ok(Ok(FilterExit::Success)) => EXIT_SUCCESS,
            Ok(Ok(FilterExit::Failure(code))) => normalize_failure(definition.name(), code),
            Ok(Err(error)) => {
                FilterFailed {
                    filter: definition.name(),
                    error: &error,
                }
                .log();
                EXIT_INTERNAL_ERROR
            }
            Err(panic) => {
                FilterPanicked {
                    filter: definition.name(),
                    panic: &panic_message(panic.as_ref()),
                }
                .log();
                EXIT_INTERNAL_ERROR
            }
        };

        FilterCompleted {
            filter: definition.name(),
            exit_code,
            duration: started.elapsed(),
        }
        .log();
        exit_code
    }
}

/// Arguments must pair with the declarations one to one and in order.
fn check_arguments(definition: &FilterDefinition, arguments: &[ResolvedArgument]) -> Result<(), String> {
    if arguments.len() != definition.arity() {
        return Err(format!(
            "{} argument(s) declared, {} supplied",
            definition.arity(),
            arguments.len()
        ));
    }
    for (position, (declared, argument)) in definition.arguments().iter().zip(arguments).enumerate() {
        if declared.arg_type() != argument.arg_type() {
            return Err(format!(
                "argument {} is declared as {} but resolved as {}",
                position,
                declared.arg_type(),
                argument.arg_type()
            ));
        }
    }
    Ok(())
}

fn normalize_failure(filter: &str, code: i32) -> i32 {
    if matches!(code, EXIT_SUCCESS | EXIT_CONFIGURATION_ERROR | EXIT_INTERNAL_ERROR) {
        ExitCodeNormalized {
            filter,
            reported: code,
            normalized: EXIT_GENERIC_FAILURE,
        }
        .log();
        return EXIT_GENERIC_FAILURE;
    }
    code
}
