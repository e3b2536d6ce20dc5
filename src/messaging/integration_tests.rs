// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Session behavior against the in-process broker.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::bail;

use crate::errors::{ConnectError, LostCause, SessionError, TransportError};

use super::{
    ArrivedMessage, ConnectOptions, Credentials, InMemoryBroker, MessageId, MessagingEventHandler,
    MessagingSession, QoS, SessionConfig, SessionHandle, SessionState,
};

const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct Delivery {
    payload: String,
    message_id: MessageId,
    duplicate: bool,
    started: Instant,
    finished: Instant,
}

#[derive(Debug, Clone, PartialEq)]
enum Terminal {
    Disconnected,
    Lost { delivery_failure: bool, cause: String },
}

/// Records every callback. Payloads listed in `delays` make the handler
/// sleep, `fail_on` makes it return `Err` on first delivery, and `panic_on`
/// makes it panic.
#[derive(Default)]
struct Recorder {
    deliveries: Mutex<Vec<Delivery>>,
    terminals: Mutex<Vec<Terminal>>,
    in_handler: AtomicBool,
    overlapped: AtomicBool,
    delays: HashMap<String, Duration>,
    fail_on: Option<String>,
    panic_on: Option<String>,
    disconnect_from_callback: Option<String>,
    disconnect_results: Mutex<Vec<Result<(), String>>>,
    relay_to: Option<String>,
}

impl Recorder {
    fn delivered_payloads(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|d| d.payload.clone())
            .collect()
    }

    fn terminals(&self) -> Vec<Terminal> {
        self.terminals.lock().unwrap().clone()
    }
}

impl MessagingEventHandler for Recorder {
    fn disconnected(&self, _session: &SessionHandle) {
        self.terminals.lock().unwrap().push(Terminal::Disconnected);
    }

    fn connection_lost(&self, _session: &SessionHandle, cause: &LostCause) {
        self.terminals.lock().unwrap().push(Terminal::Lost {
            delivery_failure: cause.is_delivery_failure(),
            cause: cause.to_string(),
        });
    }

    fn message_arrived(&self, session: &SessionHandle, message: &ArrivedMessage) -> anyhow::Result<()> {
        if self.in_handler.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let started = Instant::now();
        let payload = message.payload_str().unwrap_or_default().to_string();

        if let Some(delay) = self.delays.get(&payload) {
            thread::sleep(*delay);
        }
        if self.panic_on.as_deref() == Some(payload.as_str()) {
            self.in_handler.store(false, Ordering::SeqCst);
            panic!("cannot handle {}", payload);
        }
        if self.disconnect_from_callback.as_deref() == Some(payload.as_str()) {
            let result = session.disconnect().map_err(|e| e.to_string());
            self.disconnect_results.lock().unwrap().push(result);
        }
        if let Some(topic) = &self.relay_to {
            session.publish(topic, payload.to_uppercase().as_bytes(), QoS::AtLeastOnce)?;
        }

        self.deliveries.lock().unwrap().push(Delivery {
            payload: payload.clone(),
            message_id: message.message_id,
            duplicate: message.duplicate,
            started,
            finished: Instant::now(),
        });
        self.in_handler.store(false, Ordering::SeqCst);

        if self.fail_on.as_deref() == Some(payload.as_str()) && !message.duplicate {
            bail!("rejected {}", payload);
        }
        Ok(())
    }
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

fn connected_session(
    broker: &InMemoryBroker,
    recorder: &Arc<Recorder>,
    client_id: &str,
    filter: &str,
) -> MessagingSession {
    let session = MessagingSession::with_config(
        Arc::new(broker.transport()),
        recorder.clone(),
        SessionConfig {
            delivery_queue_capacity: 4,
            poll_interval: Duration::from_millis(10),
        },
    );
    session
        .connect(&ConnectOptions::new("mem://local", client_id))
        .unwrap();
    session.subscribe(filter, QoS::AtLeastOnce).unwrap();
    session
}

#[test]
fn test_messages_delivered_in_order_one_at_a_time() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        delays: [("m3".to_string(), Duration::from_millis(20))].into(),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "ordered", "sensor/#");

    let expected: Vec<String> = (0..20).map(|i| format!("m{}", i)).collect();
    for payload in &expected {
        broker.publish("sensor/1", payload.as_bytes(), QoS::AtLeastOnce);
    }

    assert!(wait_until(|| recorder.delivered_payloads().len() == expected.len()));
    assert_eq!(recorder.delivered_payloads(), expected);
    assert!(!recorder.overlapped.load(Ordering::SeqCst));

    let deliveries = recorder.deliveries.lock().unwrap().clone();
    for pair in deliveries.windows(2) {
        assert!(pair[1].started >= pair[0].finished);
    }

    assert!(wait_until(|| broker.acknowledgements().len() == expected.len()));
    assert!(session.pending_acks().is_empty());
    session.disconnect().unwrap();
}

#[test]
fn test_ack_sent_only_after_handler_returns() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        delays: [("m1".to_string(), Duration::from_millis(50))].into(),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "gated", "sensor/1");

    broker.publish("sensor/1", b"m1", QoS::AtLeastOnce);
    broker.publish("sensor/1", b"m2", QoS::AtLeastOnce);
    assert!(wait_until(|| broker.acknowledgements().len() == 2));

    let deliveries = recorder.deliveries.lock().unwrap().clone();
    let m1 = &deliveries[0];
    let m2 = &deliveries[1];
    assert_eq!(m1.payload, "m1");
    assert_eq!(m2.payload, "m2");
    assert!(m2.started >= m1.finished, "m2 started while m1 was running");

    let m1_ack = broker.ack_time("gated", m1.message_id).unwrap();
    assert!(m1_ack >= m1.finished, "PUBACK for m1 preceded handler return");
    assert!(m1.finished.duration_since(m1.started) >= Duration::from_millis(50));

    session.disconnect().unwrap();
}

#[test]
fn test_qos0_messages_are_not_acknowledged() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let session = connected_session(&broker, &recorder, "fire-and-forget", "t");

    broker.publish("t", b"x", QoS::AtMostOnce);
    assert!(wait_until(|| recorder.delivered_payloads().len() == 1));
    assert!(broker.acknowledgements().is_empty());
    session.disconnect().unwrap();
}

#[test]
fn test_handler_failure_forces_shutdown() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        fail_on: Some("bad".to_string()),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "failing", "jobs");

    broker.publish("jobs", b"ok1", QoS::AtLeastOnce);
    broker.publish("jobs", b"bad", QoS::AtLeastOnce);
    broker.publish("jobs", b"ok2", QoS::AtLeastOnce);

    assert!(wait_until(|| !recorder.terminals().is_empty()));
    assert_eq!(session.state(), SessionState::Disconnected);

    let terminals = recorder.terminals();
    assert_eq!(terminals.len(), 1);
    match &terminals[0] {
        Terminal::Lost {
            delivery_failure,
            cause,
        } => {
            assert!(delivery_failure);
            assert!(cause.contains("rejected bad"), "cause was: {}", cause);
            assert!(cause.contains("jobs"));
        }
        other => panic!("expected connection_lost, got {:?}", other),
    }

    // Nothing after the failed message is processed
    thread::sleep(Duration::from_millis(50));
    assert_eq!(recorder.delivered_payloads(), vec!["ok1", "bad"]);

    // The failed message was never acknowledged
    let acked: Vec<String> = broker
        .acknowledgements()
        .into_iter()
        .map(|a| a.topic)
        .collect();
    assert_eq!(acked.len(), 1);
    let unacked = broker.unacknowledged("failing");
    assert!(unacked.iter().any(|m| m.payload == b"bad"));

    // Already terminal: disconnect only reaps threads and fires nothing new
    session.disconnect().unwrap();
    assert_eq!(recorder.terminals().len(), 1);
}

#[test]
fn test_handler_panic_reported_as_connection_lost() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        panic_on: Some("boom".to_string()),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "panicky", "t");

    broker.publish("t", b"boom", QoS::AtLeastOnce);
    assert!(wait_until(|| !recorder.terminals().is_empty()));

    match &recorder.terminals()[0] {
        Terminal::Lost {
            delivery_failure,
            cause,
        } => {
            assert!(delivery_failure);
            assert!(cause.contains("cannot handle boom"));
        }
        other => panic!("expected connection_lost, got {:?}", other),
    }
    assert!(broker.acknowledgements().is_empty());
    drop(session);
    assert_eq!(recorder.terminals().len(), 1);
}

#[test]
fn test_graceful_disconnect_fires_disconnected_once() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let session = connected_session(&broker, &recorder, "graceful", "t");

    broker.publish("t", b"a", QoS::AtLeastOnce);
    assert!(wait_until(|| recorder.delivered_payloads().len() == 1));

    session.disconnect().unwrap();
    assert_eq!(session.state(), SessionState::Disconnected);
    assert!(!broker.is_connected("graceful"));

    session.disconnect().unwrap();
    drop(session);
    assert_eq!(recorder.terminals(), vec![Terminal::Disconnected]);
}

#[test]
fn test_every_delivered_message_is_acknowledged_by_graceful_disconnect() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        delays: [("slow".to_string(), Duration::from_millis(30))].into(),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "draining", "t");

    broker.publish("t", b"slow", QoS::AtLeastOnce);
    broker.publish("t", b"next", QoS::AtLeastOnce);
    assert!(wait_until(|| !recorder.delivered_payloads().is_empty()
        || recorder.in_handler.load(Ordering::SeqCst)));
    session.disconnect().unwrap();

    let delivered = recorder.deliveries.lock().unwrap().clone();
    assert!(!delivered.is_empty());
    for delivery in &delivered {
        assert!(broker.ack_time("draining", delivery.message_id).is_some());
    }
    assert_eq!(recorder.terminals(), vec![Terminal::Disconnected]);
}

#[test]
fn test_transport_loss_fires_connection_lost_once() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let session = connected_session(&broker, &recorder, "severed", "t");

    broker.sever("severed", TransportError::KeepAliveTimeout);
    assert!(wait_until(|| !recorder.terminals().is_empty()));
    assert_eq!(session.state(), SessionState::Disconnected);

    session.disconnect().unwrap();
    assert_eq!(
        recorder.terminals(),
        vec![Terminal::Lost {
            delivery_failure: false,
            cause: TransportError::KeepAliveTimeout.to_string(),
        }]
    );
}

#[test]
fn test_disconnect_from_callback_is_rejected() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        disconnect_from_callback: Some("stop".to_string()),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "reentrant", "t");

    broker.publish("t", b"stop", QoS::AtLeastOnce);
    assert!(wait_until(|| recorder.disconnect_results.lock().unwrap().len() == 1));

    let results = recorder.disconnect_results.lock().unwrap().clone();
    assert_eq!(
        results[0],
        Err(SessionError::DisconnectFromDeliveryThread.to_string())
    );
    assert_eq!(session.state(), SessionState::Connected);
    assert!(recorder.terminals().is_empty());

    // The session keeps working and can still be shut down from outside
    broker.publish("t", b"after", QoS::AtLeastOnce);
    assert!(wait_until(|| recorder.delivered_payloads().len() == 2));
    session.disconnect().unwrap();
    assert_eq!(recorder.terminals(), vec![Terminal::Disconnected]);
}

#[test]
fn test_publish_from_callback_reaches_other_subscribers() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder {
        relay_to: Some("out".to_string()),
        ..Default::default()
    });
    let session = connected_session(&broker, &recorder, "relay", "in");

    broker.publish("in", b"one", QoS::AtLeastOnce);
    broker.publish("in", b"two", QoS::AtLeastOnce);
    assert!(wait_until(|| broker.published("out").len() == 2));
    assert_eq!(
        broker.published_payloads("out"),
        vec![b"ONE".to_vec(), b"TWO".to_vec()]
    );
    session.disconnect().unwrap();
}

#[test]
fn test_connect_errors_leave_session_disconnected() {
    let broker = InMemoryBroker::new();
    broker.require_credentials(Credentials::new("filter", "secret"));
    let recorder = Arc::new(Recorder::default());
    let session = MessagingSession::new(Arc::new(broker.transport()), recorder.clone());

    let result = session.connect(&ConnectOptions::new("mem://local", "c1"));
    assert!(matches!(
        result,
        Err(SessionError::Connect(ConnectError::BadCredentials))
    ));
    assert_eq!(session.state(), SessionState::Disconnected);

    broker.set_reachable(false);
    let options = ConnectOptions::new("mem://local", "c1")
        .with_credentials(Credentials::new("filter", "secret"));
    assert!(matches!(
        session.connect(&options),
        Err(SessionError::Connect(ConnectError::Unreachable(_)))
    ));
    assert_eq!(session.state(), SessionState::Disconnected);

    broker.set_reachable(true);
    session.connect(&options).unwrap();
    assert_eq!(session.state(), SessionState::Connected);
    session.disconnect().unwrap();

    // Only the successful connection produced a terminal callback
    assert_eq!(recorder.terminals(), vec![Terminal::Disconnected]);
}

#[test]
fn test_operations_require_connected_session() {
    let broker = InMemoryBroker::new();
    let session = MessagingSession::new(Arc::new(broker.transport()), Arc::new(Recorder::default()));

    assert!(matches!(
        session.publish("t", b"x", QoS::AtLeastOnce),
        Err(SessionError::NotConnected(SessionState::Disconnected))
    ));
    assert!(matches!(
        session.subscribe("t", QoS::AtLeastOnce),
        Err(SessionError::NotConnected(SessionState::Disconnected))
    ));

    let options = ConnectOptions::new("mem://local", "twice");
    session.connect(&options).unwrap();
    assert!(matches!(
        session.connect(&options),
        Err(SessionError::AlreadyActive(SessionState::Connected))
    ));
    assert!(matches!(
        session.publish("bad/+", b"x", QoS::AtLeastOnce),
        Err(SessionError::InvalidTopic { .. })
    ));
}

#[test]
fn test_malformed_topic_filters_rejected_before_transport() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    let session = connected_session(&broker, &recorder, "filters", "sensor/+");

    for filter in ["sensor/#/extra", "sensor+", ""] {
        assert!(
            matches!(
                session.subscribe(filter, QoS::AtLeastOnce),
                Err(SessionError::InvalidTopic { .. })
            ),
            "subscribe {:?}",
            filter
        );
        assert!(
            matches!(session.unsubscribe(filter), Err(SessionError::InvalidTopic { .. })),
            "unsubscribe {:?}",
            filter
        );
    }

    session.unsubscribe("sensor/+").unwrap();
    assert_eq!(session.state(), SessionState::Connected);
}

#[test]
fn test_drop_disconnects_gracefully() {
    let broker = InMemoryBroker::new();
    let recorder = Arc::new(Recorder::default());
    {
        let _session = connected_session(&broker, &recorder, "scoped", "t");
        assert!(broker.is_connected("scoped"));
    }
    assert!(!broker.is_connected("scoped"));
    assert_eq!(recorder.terminals(), vec![Terminal::Disconnected]);
}

#[test]
fn test_persistent_session_redelivers_failed_message() {
    let broker = InMemoryBroker::new();
    broker.preregister("durable", "jobs", QoS::AtLeastOnce);
    broker.publish("jobs", b"job-1", QoS::AtLeastOnce);

    let recorder = Arc::new(Recorder {
        fail_on: Some("job-1".to_string()),
        ..Default::default()
    });
    let session = MessagingSession::new(Arc::new(broker.transport()), recorder.clone());
    let options = ConnectOptions::new("mem://local", "durable").with_clean_session(false);

    session.connect(&options).unwrap();
    assert!(wait_until(|| !recorder.terminals().is_empty()));
    assert_eq!(broker.unacknowledged("durable").len(), 1);

    session.connect(&options).unwrap();
    assert!(wait_until(|| broker.acknowledgements().len() == 1));

    let deliveries = recorder.deliveries.lock().unwrap().clone();
    assert_eq!(deliveries.len(), 2);
    assert!(!deliveries[0].duplicate);
    assert!(deliveries[1].duplicate);
    assert_eq!(deliveries[0].message_id, deliveries[1].message_id);
    assert!(broker.unacknowledged("durable").is_empty());

    session.disconnect().unwrap();
    assert_eq!(recorder.terminals().len(), 2);
    assert_eq!(recorder.terminals()[1], Terminal::Disconnected);
}
