// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::env;
use std::process;
use std::sync::Arc;

use filterflow::config::{load_and_validate_pipeline, PipelineBuilder};
use filterflow::filters::FilterRegistry;
use filterflow::messaging::InMemoryBroker;
use filterflow::observability::messages::pipeline::PipelineLoaded;
use filterflow::observability::messages::StructuredLog;
use filterflow::runtime::{FilterRuntime, EXIT_CONFIGURATION_ERROR, EXIT_INTERNAL_ERROR};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const USAGE: &str = "\
Usage:
  filterflow list
  filterflow describe <filter> [--json]
  filterflow run <filter> [binding ...]
  filterflow pipeline <pipeline.yaml>";

fn main() {
    // Logs go to stderr; stdout carries command output only
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let registry = FilterRegistry::builtin();

    let code = match args.first().map(String::as_str) {
        Some("list") => list(&registry),
        Some("describe") if args.len() >= 2 => {
            describe(&registry, &args[1], args.iter().any(|a| a == "--json"))
        }
        Some("run") if args.len() >= 2 => run_filter(&registry, &args[1], &args[2..]),
        Some("pipeline") if args.len() == 2 => run_pipeline(&registry, &args[1]),
        _ => {
            eprintln!("{}", USAGE);
            EXIT_CONFIGURATION_ERROR
        }
    };
    process::exit(code);
}

fn list(registry: &FilterRegistry) -> i32 {
    for definition in registry.definitions() {
        println!(
            "{:<18} {:<22} {}",
            definition.name(),
            definition.signature(),
            definition.title()
        );
    }
    0
}

fn describe(registry: &FilterRegistry, name: &str, json: bool) -> i32 {
    let filter = match registry.get(name) {
        Ok(filter) => filter,
        Err(error) => {
            eprintln!("{}", error);
            return EXIT_CONFIGURATION_ERROR;
        }
    };
    let definition = filter.definition();

    if json {
        return match serde_json::to_string_pretty(definition.as_ref()) {
            Ok(text) => {
                println!("{}", text);
                0
            }
            Err(error) => {
                eprintln!("Failed to render '{}': {}", name, error);
                EXIT_INTERNAL_ERROR
            }
        };
    }

    println!("{} - {}", definition.name(), definition.title());
    println!("  {}", definition.description());
    for (position, argument) in definition.arguments().iter().enumerate() {
        println!(
            "  {} {:<7} {}",
            position,
            argument.arg_type().marker(),
            argument.description()
        );
    }
    0
}

/// Launch one filter with positional binding tokens. Channel arguments
/// fail at connect time: a single launch has no broker to reach.
fn run_filter(registry: &FilterRegistry, name: &str, tokens: &[String]) -> i32 {
    let filter = match registry.get(name) {
        Ok(filter) => filter,
        Err(error) => {
            tracing::error!("{}", error);
            return EXIT_CONFIGURATION_ERROR;
        }
    };

    match FilterRuntime::new(filter).launch(tokens) {
        Ok(code) => code,
        Err(error) => {
            tracing::error!("{}", error);
            EXIT_CONFIGURATION_ERROR
        }
    }
}

/// Run every instance of a pipeline file against an in-process broker.
fn run_pipeline(registry: &FilterRegistry, path: &str) -> i32 {
    let pipeline = match load_and_validate_pipeline(path, registry)
        .and_then(|cfg| PipelineBuilder::from_config(&cfg, registry))
    {
        Ok(pipeline) => pipeline,
        Err(error) => {
            tracing::error!("{}", error);
            return EXIT_CONFIGURATION_ERROR;
        }
    };
    PipelineLoaded {
        path,
        node_count: pipeline.graph().nodes().len(),
        instance_count: pipeline.graph().instances().len(),
    }
    .log();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!("Failed to start async runtime: {}", error);
            return EXIT_INTERNAL_ERROR;
        }
    };
    runtime.block_on(pipeline.run(Arc::new(InMemoryBroker::new())))
}
