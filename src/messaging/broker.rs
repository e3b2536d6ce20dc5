// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-process broker and transport.
//!
//! [`InMemoryBroker`] routes publishes to matching subscriptions inside one
//! process. It backs the `pipeline` command and the test suite, and records
//! what a real broker would observe: every acknowledgment with its arrival
//! time, every publish, and the messages each client has not acknowledged.
//!
//! Session semantics follow the usual publish/subscribe rules:
//!
//! * delivery QoS is the lower of the publish QoS and the subscription QoS
//! * a clean session starts empty and is not queued for while offline
//! * a persistent session (`clean_session = false`) keeps its subscriptions,
//!   queues messages while offline and, on reconnect, redelivers
//!   unacknowledged messages with `duplicate` set

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::errors::{ConnectError, TransportError};

use super::lock;
use super::message::{ArrivedMessage, ConnectOptions, Credentials, MessageId, QoS};
use super::topic::topic_matches;
use super::transport::{Transport, TransportFactory};

/// A PUBACK as seen by the broker.
#[derive(Debug, Clone)]
pub struct AckRecord {
    pub client_id: String,
    pub message_id: MessageId,
    pub topic: String,
    pub at: Instant,
}

/// A publish as seen by the broker. `client_id` is `None` for messages
/// injected through [`InMemoryBroker::publish`].
#[derive(Debug, Clone)]
pub struct PublishRecord {
    pub client_id: Option<String>,
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
    pub at: Instant,
}

#[derive(Debug, Default)]
struct ClientState {
    connected: bool,
    persistent: bool,
    subscriptions: Vec<(String, QoS)>,
    inbox: VecDeque<ArrivedMessage>,
    in_flight: BTreeMap<MessageId, ArrivedMessage>,
    severed: Option<TransportError>,
    last_packet_id: u16,
}

impl ClientState {
    fn accepts_offline(&self) -> bool {
        self.connected || self.persistent
    }

    fn granted_qos(&self, topic: &str) -> Option<QoS> {
        self.subscriptions
            .iter()
            .filter(|(filter, _)| topic_matches(filter, topic))
            .map(|(_, qos)| *qos)
            .max()
    }

    fn next_packet_id(&mut self) -> MessageId {
        loop {
            self.last_packet_id = self.last_packet_id.wrapping_add(1);
            let candidate = MessageId(self.last_packet_id);
            let queued = self.inbox.iter().any(|m| m.message_id == candidate);
            if self.last_packet_id != 0 && !queued && !self.in_flight.contains_key(&candidate) {
                return candidate;
            }
        }
    }
}

struct BrokerState {
    reachable: bool,
    credentials: Option<Credentials>,
    clients: HashMap<String, ClientState>,
    acks: Vec<AckRecord>,
    published: Vec<PublishRecord>,
}

impl BrokerState {
    fn route(&mut self, publisher: Option<&str>, topic: &str, payload: &[u8], qos: QoS) {
        self.published.push(PublishRecord {
            client_id: publisher.map(str::to_string),
            topic: topic.to_string(),
            payload: payload.to_vec(),
            qos,
            at: Instant::now(),
        });

        for client in self.clients.values_mut() {
            if !client.accepts_offline() {
                continue;
            }
            let Some(granted) = client.granted_qos(topic) else {
                continue;
            };
            let delivery_qos = granted.min(qos);
            let message_id = if delivery_qos.requires_ack() {
                client.next_packet_id()
            } else {
                MessageId(0)
            };
            client.inbox.push_back(ArrivedMessage {
                topic: topic.to_string(),
                payload: payload.to_vec(),
                qos: delivery_qos,
                message_id,
                duplicate: false,
            });
        }
    }
}

struct Inner {
    state: Mutex<BrokerState>,
    arrivals: Condvar,
}

/// In-process publish/subscribe broker. Clones share the same broker.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<Inner>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(BrokerState {
                    reachable: true,
                    credentials: None,
                    clients: HashMap::new(),
                    acks: Vec::new(),
                    published: Vec::new(),
                }),
                arrivals: Condvar::new(),
            }),
        }
    }

    /// Reject connections that don't present these credentials.
    pub fn require_credentials(&self, credentials: Credentials) {
        lock(&self.inner.state).credentials = Some(credentials);
    }

    /// An unreachable broker refuses every new connection.
    pub fn set_reachable(&self, reachable: bool) {
        lock(&self.inner.state).reachable = reachable;
    }

    /// Create a persistent session with one subscription before its client
    /// connects, so nothing published in between is missed.
    pub fn preregister(&self, client_id: &str, topic_filter: &str, qos: QoS) {
        let mut state = lock(&self.inner.state);
        let client = state.clients.entry(client_id.to_string()).or_default();
        client.persistent = true;
        client.subscriptions.retain(|(filter, _)| filter != topic_filter);
        client.subscriptions.push((topic_filter.to_string(), qos));
    }

    /// Publish from outside any session.
    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS) {
        lock(&self.inner.state).route(None, topic, payload, qos);
        self.inner.arrivals.notify_all();
    }

    /// Drop a client's connection as a keep-alive timeout or network failure
    /// would. Its next poll fails with `error`.
    pub fn sever(&self, client_id: &str, error: TransportError) {
        if let Some(client) = lock(&self.inner.state).clients.get_mut(client_id) {
            client.severed = Some(error);
        }
        self.inner.arrivals.notify_all();
    }

    pub fn is_connected(&self, client_id: &str) -> bool {
        lock(&self.inner.state)
            .clients
            .get(client_id)
            .map(|c| c.connected)
            .unwrap_or(false)
    }

    pub fn acknowledgements(&self) -> Vec<AckRecord> {
        lock(&self.inner.state).acks.clone()
    }

    /// When the broker received the acknowledgment for `message_id`.
    pub fn ack_time(&self, client_id: &str, message_id: MessageId) -> Option<Instant> {
        lock(&self.inner.state)
            .acks
            .iter()
            .find(|a| a.client_id == client_id && a.message_id == message_id)
            .map(|a| a.at)
    }

    /// Messages delivered to `client_id` that were never acknowledged.
    pub fn unacknowledged(&self, client_id: &str) -> Vec<ArrivedMessage> {
        lock(&self.inner.state)
            .clients
            .get(client_id)
            .map(|c| c.in_flight.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Messages queued for `client_id` that have not been delivered yet.
    pub fn queued(&self, client_id: &str) -> usize {
        lock(&self.inner.state)
            .clients
            .get(client_id)
            .map(|c| c.inbox.len())
            .unwrap_or(0)
    }

    pub fn published(&self, topic: &str) -> Vec<PublishRecord> {
        lock(&self.inner.state)
            .published
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    pub fn published_payloads(&self, topic: &str) -> Vec<Vec<u8>> {
        self.published(topic).into_iter().map(|p| p.payload).collect()
    }

    pub fn transport(&self) -> InMemoryTransport {
        InMemoryTransport {
            broker: self.clone(),
            client_id: Mutex::new(None),
            closed: AtomicBool::new(true),
        }
    }
}

impl TransportFactory for InMemoryBroker {
    fn create(&self, _broker_address: &str) -> Result<Arc<dyn Transport>, ConnectError> {
        Ok(Arc::new(self.transport()))
    }
}

/// One client connection to an [`InMemoryBroker`].
pub struct InMemoryTransport {
    broker: InMemoryBroker,
    client_id: Mutex<Option<String>>,
    closed: AtomicBool,
}

impl InMemoryTransport {
    fn client_id(&self) -> Result<String, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        lock(&self.client_id).clone().ok_or(TransportError::Closed)
    }

    fn with_client<T>(
        &self,
        f: impl FnOnce(&mut BrokerState, &str) -> Result<T, TransportError>,
    ) -> Result<T, TransportError> {
        let client_id = self.client_id()?;
        let mut state = lock(&self.broker.inner.state);
        let connected = state
            .clients
            .get(&client_id)
            .map(|c| c.connected)
            .unwrap_or(false);
        if !connected {
            return Err(TransportError::ConnectionLost(
                "client is no longer connected".to_string(),
            ));
        }
        f(&mut state, &client_id)
    }
}

impl Transport for InMemoryTransport {
    fn connect(&self, options: &ConnectOptions) -> Result<(), ConnectError> {
        let mut state = lock(&self.broker.inner.state);
        if !state.reachable {
            return Err(ConnectError::Unreachable(options.broker_address.clone()));
        }
        if let Some(required) = &state.credentials {
            if options.credentials.as_ref() != Some(required) {
                return Err(ConnectError::BadCredentials);
            }
        }
        if state
            .clients
            .get(&options.client_id)
            .map(|c| c.connected)
            .unwrap_or(false)
        {
            return Err(ConnectError::ClientIdInUse(options.client_id.clone()));
        }

        let client = state.clients.entry(options.client_id.clone()).or_default();
        if options.clean_session {
            *client = ClientState::default();
        } else {
            client.persistent = true;
            client.severed = None;
            let redeliveries = std::mem::take(&mut client.in_flight);
            for (_, mut message) in redeliveries.into_iter().rev() {
                message.duplicate = true;
                client.inbox.push_front(message);
            }
        }
        client.connected = true;

        *lock(&self.client_id) = Some(options.client_id.clone());
        self.closed.store(false, Ordering::Release);
        Ok(())
    }

    fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), TransportError> {
        self.with_client(|state, client_id| {
            state.route(Some(client_id), topic, payload, qos);
            Ok(())
        })?;
        self.broker.inner.arrivals.notify_all();
        Ok(())
    }

    fn subscribe(&self, topic_filter: &str, qos: QoS) -> Result<(), TransportError> {
        self.with_client(|state, client_id| {
            if let Some(client) = state.clients.get_mut(client_id) {
                client.subscriptions.retain(|(filter, _)| filter != topic_filter);
                client.subscriptions.push((topic_filter.to_string(), qos));
            }
            Ok(())
        })
    }

    fn unsubscribe(&self, topic_filter: &str) -> Result<(), TransportError> {
        self.with_client(|state, client_id| {
            if let Some(client) = state.clients.get_mut(client_id) {
                client.subscriptions.retain(|(filter, _)| filter != topic_filter);
            }
            Ok(())
        })
    }

    fn poll(&self, timeout: Duration) -> Result<Option<ArrivedMessage>, TransportError> {
        let client_id = self.client_id()?;
        let deadline = Instant::now() + timeout;
        let mut state = lock(&self.broker.inner.state);
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Err(TransportError::Closed);
            }
            let Some(client) = state.clients.get_mut(&client_id) else {
                return Err(TransportError::Closed);
            };
            if let Some(error) = client.severed.take() {
                client.connected = false;
                return Err(error);
            }
            if let Some(message) = client.inbox.pop_front() {
                if message.qos.requires_ack() {
                    client.in_flight.insert(message.message_id, message.clone());
                }
                return Ok(Some(message));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            state = self
                .broker
                .inner
                .arrivals
                .wait_timeout(state, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|poisoned| poisoned.into_inner().0);
        }
    }

    fn acknowledge(&self, message_id: MessageId) -> Result<(), TransportError> {
        self.with_client(|state, client_id| {
            let message = state
                .clients
                .get_mut(client_id)
                .and_then(|c| c.in_flight.remove(&message_id))
                .ok_or(TransportError::UnknownPacket(message_id))?;
            state.acks.push(AckRecord {
                client_id: client_id.to_string(),
                message_id,
                topic: message.topic,
                at: Instant::now(),
            });
            Ok(())
        })
    }

    fn flush(&self) -> Result<(), TransportError> {
        // Publishes are routed synchronously, nothing is ever outstanding
        Ok(())
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(client_id) = lock(&self.client_id).as_deref() {
            if let Some(client) = lock(&self.broker.inner.state).clients.get_mut(client_id) {
                client.connected = false;
                if !client.persistent {
                    client.inbox.clear();
                }
            }
        }
        self.broker.inner.arrivals.notify_all();
    }
}
