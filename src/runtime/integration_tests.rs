// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Filter runs end to end: resolution, body execution and exit codes.

use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use tempfile::tempdir;
use tracing::span::{Attributes, Id};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

use crate::errors::ConfigurationError;
use crate::filter::{resolve_arguments, ArgumentType, FilterDefinition, ResolutionDefaults};
use crate::filters::{
    ChangeCaseFilter, CollectMessagesFilter, PublishLinesFilter, RelayFilter, EXIT_BROKER_UNAVAILABLE,
    EXIT_DATA_INVALID, EXIT_INPUT_UNAVAILABLE,
};
use crate::messaging::{InMemoryBroker, QoS};
use crate::traits::{Filter, FilterExit};

use super::{
    FilterContext, FilterRuntime, MessagingOptions, EXIT_CONFIGURATION_ERROR, EXIT_GENERIC_FAILURE,
    EXIT_INTERNAL_ERROR, EXIT_SUCCESS,
};

/// Body whose behavior is chosen per test; records whether it ran.
struct ScriptedFilter {
    definition: Arc<FilterDefinition>,
    ran: AtomicBool,
    outcome: fn(&mut FilterContext) -> anyhow::Result<FilterExit>,
}

impl ScriptedFilter {
    fn new(outcome: fn(&mut FilterContext) -> anyhow::Result<FilterExit>) -> Arc<Self> {
        let definition = FilterDefinition::declare("scripted", "Scripted", "")
            .add_argument(ArgumentType::StringParam, "anything")
            .build();
        Arc::new(Self {
            definition: Arc::new(definition),
            ran: AtomicBool::new(false),
            outcome,
        })
    }
}

impl Filter for ScriptedFilter {
    fn definition(&self) -> Arc<FilterDefinition> {
        self.definition.clone()
    }

    fn run(&self, context: &mut FilterContext) -> anyhow::Result<FilterExit> {
        self.ran.store(true, Ordering::SeqCst);
        (self.outcome)(context)
    }
}

fn mem_messaging(broker: &InMemoryBroker) -> MessagingOptions {
    MessagingOptions::new(Arc::new(broker.clone()))
}

#[test]
fn test_uppercase_scenario() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, b"Hello, filter world!\nline two\n").unwrap();

    let runtime = FilterRuntime::new(Arc::new(ChangeCaseFilter::upper()));
    let tokens = [input.to_str().unwrap(), output.to_str().unwrap()];

    let arguments =
        resolve_arguments(&runtime.definition(), &tokens, &ResolutionDefaults::default()).unwrap();
    assert_eq!(arguments.len(), 2);
    assert_eq!(arguments[0].arg_type(), ArgumentType::InputFile);
    assert_eq!(arguments[1].arg_type(), ArgumentType::OutputFile);

    assert_eq!(runtime.run(arguments), EXIT_SUCCESS);
    let original = fs::read(&input).unwrap();
    assert_eq!(fs::read(&output).unwrap(), original.to_ascii_uppercase());
}

/// Records the name of every span opened while it is the default subscriber.
#[derive(Clone, Default)]
struct SpanNames(Arc<Mutex<Vec<&'static str>>>);

impl<S: tracing::Subscriber> Layer<S> for SpanNames {
    fn on_new_span(&self, attrs: &Attributes<'_>, _id: &Id, _ctx: Context<'_, S>) {
        self.0.lock().unwrap().push(attrs.metadata().name());
    }
}

#[test]
fn test_body_runs_inside_filter_span() {
    let names = SpanNames::default();
    let subscriber = tracing_subscriber::registry().with(names.clone());

    let code = tracing::subscriber::with_default(subscriber, || {
        FilterRuntime::new(ScriptedFilter::new(|_| {
            tracing::info_span!("body_work").in_scope(|| Ok(FilterExit::Success))
        }))
        .launch(&["value"])
    });

    assert_eq!(code, Ok(EXIT_SUCCESS));
    assert_eq!(*names.0.lock().unwrap(), vec!["filter", "body_work"]);
}

#[test]
fn test_count_mismatch_never_reaches_body() {
    let filter = ScriptedFilter::new(|_| Ok(FilterExit::Success));
    let runtime = FilterRuntime::new(filter.clone());

    let result = runtime.launch::<&str>(&[]);
    assert_eq!(
        result,
        Err(ConfigurationError::ArgumentCountMismatch {
            filter: "scripted".to_string(),
            expected: 1,
            actual: 0,
        })
    );
    assert!(!filter.ran.load(Ordering::SeqCst));

    let uppercase = FilterRuntime::new(Arc::new(ChangeCaseFilter::upper()));
    assert!(matches!(
        uppercase.launch(&["in.txt"]),
        Err(ConfigurationError::ArgumentCountMismatch { expected: 2, actual: 1, .. })
    ));
}

#[test]
fn test_exit_code_classes() {
    struct TestCase {
        name: &'static str,
        outcome: fn(&mut FilterContext) -> anyhow::Result<FilterExit>,
        expected: i32,
    }

    let test_cases = vec![
        TestCase {
            name: "success",
            outcome: |_| Ok(FilterExit::Success),
            expected: EXIT_SUCCESS,
        },
        TestCase {
            name: "business failure passes through",
            outcome: |_| Ok(FilterExit::Failure(3)),
            expected: 3,
        },
        TestCase {
            name: "failure code 0 is not success",
            outcome: |_| Ok(FilterExit::Failure(0)),
            expected: EXIT_GENERIC_FAILURE,
        },
        TestCase {
            name: "failure code cannot pose as internal error",
            outcome: |_| Ok(FilterExit::Failure(EXIT_INTERNAL_ERROR)),
            expected: EXIT_GENERIC_FAILURE,
        },
        TestCase {
            name: "failure code cannot pose as rejected launch",
            outcome: |_| Ok(FilterExit::Failure(EXIT_CONFIGURATION_ERROR)),
            expected: EXIT_GENERIC_FAILURE,
        },
        TestCase {
            name: "error is internal",
            outcome: |_| bail!("database exploded"),
            expected: EXIT_INTERNAL_ERROR,
        },
        TestCase {
            name: "panic is internal",
            outcome: |_| panic!("unexpected state"),
            expected: EXIT_INTERNAL_ERROR,
        },
        TestCase {
            name: "wrong accessor is internal",
            outcome: |context| {
                context.input_path(0)?;
                Ok(FilterExit::Success)
            },
            expected: EXIT_INTERNAL_ERROR,
        },
        TestCase {
            name: "parameter is readable",
            outcome: |context| {
                assert_eq!(context.text(0)?, "value");
                Ok(FilterExit::Success)
            },
            expected: EXIT_SUCCESS,
        },
    ];

    for case in test_cases {
        let runtime = FilterRuntime::new(ScriptedFilter::new(case.outcome));
        assert_eq!(runtime.launch(&["value"]), Ok(case.expected), "case: {}", case.name);
    }
}

#[test]
fn test_run_rejects_arguments_for_another_definition() {
    let filter = ScriptedFilter::new(|_| Ok(FilterExit::Success));
    let runtime = FilterRuntime::new(filter.clone());

    let uppercase = ChangeCaseFilter::upper().definition();
    let arguments =
        resolve_arguments(&uppercase, &["a.txt", "b.txt"], &ResolutionDefaults::default()).unwrap();

    assert_eq!(runtime.run(arguments), EXIT_CONFIGURATION_ERROR);
    assert!(!filter.ran.load(Ordering::SeqCst));
}

#[test]
fn test_missing_input_is_business_failure() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.txt");
    let output = dir.path().join("out.txt");

    let runtime = FilterRuntime::new(Arc::new(ChangeCaseFilter::upper()));
    let code = runtime
        .launch(&[missing.to_str().unwrap(), output.to_str().unwrap()])
        .unwrap();
    assert_eq!(code, EXIT_INPUT_UNAVAILABLE);
    assert!(!output.exists());
}

#[test]
fn test_channel_filter_without_transport() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "a\n").unwrap();

    let runtime = FilterRuntime::new(Arc::new(PublishLinesFilter::new()));
    let code = runtime
        .launch(&[input.to_str().unwrap(), "mqtt://broker:1883/lines"])
        .unwrap();
    assert_eq!(code, EXIT_BROKER_UNAVAILABLE);
}

#[test]
fn test_publish_then_collect_over_broker() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("lines.txt");
    let output = dir.path().join("collected.txt");
    fs::write(&input, "alpha\n\nbeta\ngamma\n").unwrap();

    let broker = InMemoryBroker::new();
    let messaging = MessagingOptions {
        clean_session: false,
        ..mem_messaging(&broker)
    };
    broker.preregister(&messaging.client_id("collector", 0), "lines", QoS::AtLeastOnce);

    let publisher = FilterRuntime::new(Arc::new(PublishLinesFilter::new()))
        .with_instance("publisher")
        .with_messaging(messaging.clone());
    assert_eq!(
        publisher.launch(&[input.to_str().unwrap(), "mem://local/lines?qos=1"]),
        Ok(EXIT_SUCCESS)
    );
    assert_eq!(broker.published("lines").len(), 3);

    let collector = FilterRuntime::new(Arc::new(
        CollectMessagesFilter::new().with_receive_timeout(Duration::from_secs(2)),
    ))
    .with_instance("collector")
    .with_messaging(messaging);
    let code = collector
        .launch(&["mem://local/lines?qos=1", output.to_str().unwrap(), "3"])
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(&output).unwrap(), "alpha\nbeta\ngamma\n");
    assert_eq!(broker.acknowledgements().len(), 3);
}

#[test]
fn test_relay_forwards_and_acknowledges() {
    let broker = InMemoryBroker::new();
    let messaging = MessagingOptions {
        clean_session: false,
        ..mem_messaging(&broker)
    };
    broker.preregister(&messaging.client_id("relay", 0), "in", QoS::AtLeastOnce);
    for payload in ["one", "two"] {
        broker.publish("in", payload.as_bytes(), QoS::AtLeastOnce);
    }

    let runtime = FilterRuntime::new(Arc::new(
        RelayFilter::new().with_receive_timeout(Duration::from_secs(2)),
    ))
    .with_instance("relay")
    .with_messaging(messaging);
    let code = runtime
        .launch(&["mem://local/in", "mem://local/out?qos=0", "2"])
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(
        broker.published_payloads("out"),
        vec![b"one".to_vec(), b"two".to_vec()]
    );
    assert_eq!(broker.acknowledgements().len(), 2);
    assert!(broker.unacknowledged("filterflow-relay").is_empty());
}

/// Messages beyond the requested count stay with the broker and reach the
/// next run of the same instance.
#[test]
fn test_collect_leaves_uncollected_messages_unacknowledged() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.txt");
    let second = dir.path().join("second.txt");

    let broker = InMemoryBroker::new();
    let messaging = MessagingOptions {
        clean_session: false,
        ..mem_messaging(&broker)
    };
    let client_id = messaging.client_id("collector", 0);
    broker.preregister(&client_id, "readings", QoS::AtLeastOnce);
    for payload in ["m1", "m2", "m3"] {
        broker.publish("readings", payload.as_bytes(), QoS::AtLeastOnce);
    }

    let collector = FilterRuntime::new(Arc::new(
        CollectMessagesFilter::new().with_receive_timeout(Duration::from_secs(2)),
    ))
    .with_instance("collector")
    .with_messaging(messaging);

    let code = collector
        .launch(&["mem://local/readings?qos=1", first.to_str().unwrap(), "1"])
        .unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(&first).unwrap(), "m1\n");
    assert_eq!(broker.acknowledgements().len(), 1);
    assert_eq!(
        broker.unacknowledged(&client_id).len() + broker.queued(&client_id),
        2
    );

    let code = collector
        .launch(&["mem://local/readings?qos=1", second.to_str().unwrap(), "2"])
        .unwrap();
    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(fs::read_to_string(&second).unwrap(), "m2\nm3\n");
    assert_eq!(broker.acknowledgements().len(), 3);
    assert!(broker.unacknowledged(&client_id).is_empty());
    assert_eq!(broker.queued(&client_id), 0);
}

#[test]
fn test_relay_stops_at_count() {
    let broker = InMemoryBroker::new();
    let messaging = MessagingOptions {
        clean_session: false,
        ..mem_messaging(&broker)
    };
    let client_id = messaging.client_id("relay", 0);
    broker.preregister(&client_id, "in", QoS::AtLeastOnce);
    for payload in ["one", "two", "three"] {
        broker.publish("in", payload.as_bytes(), QoS::AtLeastOnce);
    }

    let runtime = FilterRuntime::new(Arc::new(
        RelayFilter::new().with_receive_timeout(Duration::from_secs(2)),
    ))
    .with_instance("relay")
    .with_messaging(messaging);
    let code = runtime
        .launch(&["mem://local/in", "mem://local/out?qos=0", "1"])
        .unwrap();

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(broker.published_payloads("out"), vec![b"one".to_vec()]);
    assert_eq!(broker.acknowledgements().len(), 1);
    assert_eq!(
        broker.unacknowledged(&client_id).len() + broker.queued(&client_id),
        2
    );
}

#[test]
fn test_invalid_count_parameter() {
    let broker = InMemoryBroker::new();
    let runtime = FilterRuntime::new(Arc::new(RelayFilter::new()))
        .with_messaging(mem_messaging(&broker));
    assert_eq!(
        runtime.launch(&["mem://local/in", "mem://local/out", "zero"]),
        Ok(EXIT_DATA_INVALID)
    );
    assert!(!broker.is_connected("filterflow-relay"));
}
