// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Messaging session with a dedicated delivery thread.
//!
//! # Threads
//!
//! A connected session runs two threads:
//!
//! * the **receive loop** polls the [`Transport`] and pushes each
//!   [`ArrivedMessage`] onto a bounded queue
//! * the **delivery thread** pops the queue and invokes the
//!   [`MessagingEventHandler`], acknowledging QoS >= 1 messages after the
//!   handler returns `Ok`
//!
//! ```text
//! transport.poll() -> [receive loop] -> bounded queue -> [delivery thread] -> handler
//!                                             ^                  |
//!                     disconnect() ----------/                   +-> transport.acknowledge()
//! ```
//!
//! The queue is the only path into the delivery thread. Graceful disconnect
//! travels through it too, so messages queued before the request are still
//! delivered, and a full queue (slow handler) holds the receive loop back.
//!
//! # States
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnecting -> Disconnected
//!                      |                 \-> ShuttingDown  -> Disconnected
//!                      \-> Disconnected (connect failed)
//! ```

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::config::consts::{DEFAULT_DELIVERY_QUEUE_CAPACITY, DEFAULT_POLL_INTERVAL_MS};
use crate::errors::{LostCause, SessionError, TransportError};
use crate::observability::messages::session::{
    CallbackPanicked, DisconnectRejected, FlushFailed, MessageArrived, MessageDelivered,
    SessionConnectFailed, SessionConnected, SessionDisconnected, SessionLost, SessionStateChanged,
};
use crate::observability::messages::StructuredLog;

use super::handler::MessagingEventHandler;
use super::lock;
use super::message::{ArrivedMessage, ConnectOptions, MessageId, QoS};
use super::topic::{validate_topic_filter, validate_topic_name};
use super::transport::Transport;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
    ShuttingDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Disconnecting => "disconnecting",
            SessionState::ShuttingDown => "shutting down",
        };
        f.write_str(name)
    }
}

/// Tuning for the receive loop and delivery queue.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Messages that may wait between the receive loop and the delivery
    /// thread before the receive loop blocks.
    pub delivery_queue_capacity: usize,
    /// How long one transport poll waits before re-checking for shutdown.
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            delivery_queue_capacity: DEFAULT_DELIVERY_QUEUE_CAPACITY,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }
}

enum DeliveryEvent {
    Message(ArrivedMessage),
    TransportLost(TransportError),
    Disconnect(Sender<()>),
}

struct Workers {
    receiver: JoinHandle<()>,
    delivery: JoinHandle<()>,
}

struct Shared {
    session_id: u64,
    client_id: Mutex<String>,
    transport: Arc<dyn Transport>,
    handler: Arc<dyn MessagingEventHandler>,
    config: SessionConfig,
    state: Mutex<SessionState>,
    pending_acks: Mutex<BTreeSet<MessageId>>,
    delivery_thread: Mutex<Option<ThreadId>>,
    events: Mutex<Option<Sender<DeliveryEvent>>>,
    workers: Mutex<Option<Workers>>,
    stop_receiving: AtomicBool,
}

/// Cheap, cloneable reference to a session.
///
/// Handler callbacks receive one; it can publish, subscribe and inspect
/// state from the delivery thread. Disconnecting through it from the
/// delivery thread is rejected.
#[derive(Clone)]
pub struct SessionHandle {
    shared: Arc<Shared>,
}

impl SessionHandle {
    pub fn session_id(&self) -> u64 {
        self.shared.session_id
    }

    pub fn client_id(&self) -> String {
        lock(&self.shared.client_id).clone()
    }

    pub fn state(&self) -> SessionState {
        *lock(&self.shared.state)
    }

    /// QoS >= 1 messages received but not yet acknowledged.
    pub fn pending_acks(&self) -> Vec<MessageId> {
        lock(&self.shared.pending_acks).iter().copied().collect()
    }

    /// True when called from this session's delivery thread.
    pub fn on_delivery_thread(&self) -> bool {
        *lock(&self.shared.delivery_thread) == Some(thread::current().id())
    }

    fn transition(&self, to: SessionState) -> SessionState {
        let from = std::mem::replace(&mut *lock(&self.shared.state), to);
        SessionStateChanged {
            client_id: &self.client_id(),
            from,
            to,
        }
        .log();
        from
    }

    fn require_connected(&self) -> Result<(), SessionError> {
        match self.state() {
            SessionState::Connected => Ok(()),
            other => Err(SessionError::NotConnected(other)),
        }
    }

    /// Publish without waiting for the broker's acknowledgment. Publishes
    /// from one session keep their order on the wire.
    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), SessionError> {
        self.require_connected()?;
        validate_topic_name(topic).map_err(|reason| SessionError::InvalidTopic {
            topic: topic.to_string(),
            reason,
        })?;
        self.shared.transport.publish(topic, payload, qos)?;
        Ok(())
    }

    pub fn subscribe(&self, topic_filter: &str, qos: QoS) -> Result<(), SessionError> {
        self.require_connected()?;
        validate_topic_filter(topic_filter).map_err(|reason| SessionError::InvalidTopic {
            topic: topic_filter.to_string(),
            reason,
        })?;
        self.shared.transport.subscribe(topic_filter, qos)?;
        Ok(())
    }

    pub fn unsubscribe(&self, topic_filter: &str) -> Result<(), SessionError> {
        self.require_connected()?;
        validate_topic_filter(topic_filter).map_err(|reason| SessionError::InvalidTopic {
            topic: topic_filter.to_string(),
            reason,
        })?;
        self.shared.transport.unsubscribe(topic_filter)?;
        Ok(())
    }

    /// Gracefully disconnect: messages already queued are delivered, pending
    /// QoS >= 1 publishes are flushed, then `disconnected` fires.
    ///
    /// Returns once the delivery thread has finished. Calling this on a
    /// session that already reached `Disconnected` only reaps its threads.
    pub fn disconnect(&self) -> Result<(), SessionError> {
        if self.on_delivery_thread() {
            DisconnectRejected {
                client_id: &self.client_id(),
            }
            .log();
            return Err(SessionError::DisconnectFromDeliveryThread);
        }

        let request_drain = {
            let mut state = lock(&self.shared.state);
            match *state {
                SessionState::Connected => {
                    *state = SessionState::Disconnecting;
                    true
                }
                SessionState::Connecting => {
                    return Err(SessionError::NotConnected(SessionState::Connecting))
                }
                SessionState::Disconnected
                | SessionState::Disconnecting
                | SessionState::ShuttingDown => false,
            }
        };

        if request_drain {
            SessionStateChanged {
                client_id: &self.client_id(),
                from: SessionState::Connected,
                to: SessionState::Disconnecting,
            }
            .log();
            self.shared.stop_receiving.store(true, Ordering::Release);

            let events = lock(&self.shared.events).clone();
            if let Some(events) = events {
                let (done_tx, done_rx) = bounded(1);
                if events.send(DeliveryEvent::Disconnect(done_tx)).is_ok() {
                    // Err means the delivery thread ended on another path
                    let _ = done_rx.recv();
                }
            }
        }

        self.join_workers();
        Ok(())
    }

    fn join_workers(&self) {
        if self.on_delivery_thread() {
            // A callback reconnecting; its own thread cannot be joined
            return;
        }
        let workers = lock(&self.shared.workers).take();
        if let Some(workers) = workers {
            let _ = workers.delivery.join();
            let _ = workers.receiver.join();
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.shared.session_id)
            .field("client_id", &self.client_id())
            .field("state", &self.state())
            .finish()
    }
}

/// A connection to a message broker, exclusively owned by one filter run.
///
/// Dropping a connected session disconnects it gracefully, so a terminal
/// callback always fires.
pub struct MessagingSession {
    handle: SessionHandle,
}

impl MessagingSession {
    pub fn new(transport: Arc<dyn Transport>, handler: Arc<dyn MessagingEventHandler>) -> Self {
        Self::with_config(transport, handler, SessionConfig::default())
    }

    pub fn with_config(
        transport: Arc<dyn Transport>,
        handler: Arc<dyn MessagingEventHandler>,
        config: SessionConfig,
    ) -> Self {
        let shared = Shared {
            session_id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            client_id: Mutex::new(String::new()),
            transport,
            handler,
            config,
            state: Mutex::new(SessionState::Disconnected),
            pending_acks: Mutex::new(BTreeSet::new()),
            delivery_thread: Mutex::new(None),
            events: Mutex::new(None),
            workers: Mutex::new(None),
            stop_receiving: AtomicBool::new(false),
        };
        Self {
            handle: SessionHandle {
                shared: Arc::new(shared),
            },
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> SessionState {
        self.handle.state()
    }

    pub fn pending_acks(&self) -> Vec<MessageId> {
        self.handle.pending_acks()
    }

    /// Open the connection and start the receive loop and delivery thread.
    ///
    /// A session that reached `Disconnected` may connect again; each
    /// connection fires its own terminal callback.
    pub fn connect(&self, options: &ConnectOptions) -> Result<(), SessionError> {
        let handle = &self.handle;
        let shared = &handle.shared;
        {
            let mut state = lock(&shared.state);
            if *state != SessionState::Disconnected {
                return Err(SessionError::AlreadyActive(*state));
            }
            *state = SessionState::Connecting;
        }
        // Threads of a previous connection are finished by now
        handle.join_workers();
        *lock(&shared.client_id) = options.client_id.clone();

        if let Err(error) = shared.transport.connect(options) {
            handle.transition(SessionState::Disconnected);
            SessionConnectFailed {
                client_id: &options.client_id,
                broker_address: &options.broker_address,
                error: &error,
            }
            .log();
            return Err(error.into());
        }

        shared.stop_receiving.store(false, Ordering::Release);
        lock(&shared.pending_acks).clear();
        let (events_tx, events_rx) = bounded(shared.config.delivery_queue_capacity.max(1));
        *lock(&shared.events) = Some(events_tx.clone());
        handle.transition(SessionState::Connected);

        let workers = match self.spawn_workers(events_tx, events_rx) {
            Ok(workers) => workers,
            Err(error) => {
                shared.stop_receiving.store(true, Ordering::Release);
                shared.transport.close();
                *lock(&shared.events) = None;
                handle.transition(SessionState::Disconnected);
                return Err(error);
            }
        };
        *lock(&shared.workers) = Some(workers);

        SessionConnected {
            client_id: &options.client_id,
            broker_address: &options.broker_address,
            clean_session: options.clean_session,
        }
        .log();
        Ok(())
    }

    fn spawn_workers(
        &self,
        events_tx: Sender<DeliveryEvent>,
        events_rx: Receiver<DeliveryEvent>,
    ) -> Result<Workers, SessionError> {
        let client_id = self.handle.client_id();

        let delivery_handle = self.handle.clone();
        let delivery = thread::Builder::new()
            .name(format!("delivery-{}", client_id))
            .spawn(move || delivery_loop(delivery_handle, events_rx))?;

        let receive_handle = self.handle.clone();
        let receiver = thread::Builder::new()
            .name(format!("receive-{}", client_id))
            .spawn(move || receive_loop(receive_handle, events_tx));

        match receiver {
            Ok(receiver) => Ok(Workers { receiver, delivery }),
            Err(error) => {
                // Dropping the last sender ends the delivery loop through
                // its connection_lost fallback.
                *lock(&self.handle.shared.events) = None;
                let _ = delivery.join();
                Err(error.into())
            }
        }
    }

    pub fn publish(&self, topic: &str, payload: &[u8], qos: QoS) -> Result<(), SessionError> {
        self.handle.publish(topic, payload, qos)
    }

    pub fn subscribe(&self, topic_filter: &str, qos: QoS) -> Result<(), SessionError> {
        self.handle.subscribe(topic_filter, qos)
    }

    pub fn unsubscribe(&self, topic_filter: &str) -> Result<(), SessionError> {
        self.handle.unsubscribe(topic_filter)
    }

    pub fn disconnect(&self) -> Result<(), SessionError> {
        self.handle.disconnect()
    }
}

impl Drop for MessagingSession {
    fn drop(&mut self) {
        if !self.handle.on_delivery_thread() {
            let _ = self.handle.disconnect();
        }
    }
}

impl fmt::Debug for MessagingSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.handle, f)
    }
}

fn receive_loop(handle: SessionHandle, events: Sender<DeliveryEvent>) {
    let shared = &handle.shared;
    while !shared.stop_receiving.load(Ordering::Acquire) {
        match shared.transport.poll(shared.config.poll_interval) {
            Ok(Some(message)) => {
                if message.qos.requires_ack() {
                    lock(&shared.pending_acks).insert(message.message_id);
                }
                // Blocks while the queue is full: a slow handler holds back
                // the whole session.
                if events.send(DeliveryEvent::Message(message)).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(error) => {
                if !shared.stop_receiving.load(Ordering::Acquire) {
                    let _ = events.send(DeliveryEvent::TransportLost(error));
                }
                break;
            }
        }
    }
}

fn delivery_loop(handle: SessionHandle, events: Receiver<DeliveryEvent>) {
    // Recorded before the first callback can run
    *lock(&handle.shared.delivery_thread) = Some(thread::current().id());
    loop {
        let event = match events.recv() {
            Ok(event) => event,
            Err(_) => {
                force_shutdown(&handle, LostCause::Transport(TransportError::Closed));
                break;
            }
        };

        match event {
            DeliveryEvent::Message(message) => {
                if let Err(cause) = deliver(&handle, &message) {
                    force_shutdown(&handle, cause);
                    break;
                }
            }
            DeliveryEvent::TransportLost(error) => {
                force_shutdown(&handle, LostCause::Transport(error));
                break;
            }
            DeliveryEvent::Disconnect(done) => {
                close_gracefully(&handle);
                let _ = done.send(());
                break;
            }
        }
    }
}

fn deliver(handle: &SessionHandle, message: &ArrivedMessage) -> Result<(), LostCause> {
    let shared = &handle.shared;
    let client_id = handle.client_id();
    let arrived = MessageArrived {
        client_id: &client_id,
        topic: &message.topic,
        message_id: message.message_id,
        qos: message.qos,
        duplicate: message.duplicate,
    };
    let span = arrived.span("message_delivery");
    let _guard = span.enter();
    arrived.log();

    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        shared.handler.message_arrived(handle, message)
    }));

    match outcome {
        Ok(Ok(())) => {
            if message.qos.requires_ack() {
                shared.transport.acknowledge(message.message_id)?;
                lock(&shared.pending_acks).remove(&message.message_id);
            }
            MessageDelivered {
                client_id: &client_id,
                topic: &message.topic,
                message_id: message.message_id,
                qos: message.qos,
                duration: started.elapsed(),
            }
            .log();
            Ok(())
        }
        Ok(Err(error)) => Err(LostCause::HandlerFailed {
            topic: message.topic.clone(),
            message_id: message.message_id,
            error,
        }),
        Err(panic) => Err(LostCause::HandlerPanicked {
            topic: message.topic.clone(),
            message_id: message.message_id,
            panic: panic_message(panic.as_ref()),
        }),
    }
}

/// Connected -> ShuttingDown -> Disconnected, then `connection_lost`.
/// Nothing still queued is delivered or acknowledged.
fn force_shutdown(handle: &SessionHandle, cause: LostCause) {
    let shared = &handle.shared;
    handle.transition(SessionState::ShuttingDown);
    shared.stop_receiving.store(true, Ordering::Release);
    shared.transport.close();
    lock(&shared.pending_acks).clear();
    handle.transition(SessionState::Disconnected);

    SessionLost {
        client_id: &handle.client_id(),
        cause: &cause,
    }
    .log();
    run_callback(handle, "connection_lost", || {
        shared.handler.connection_lost(handle, &cause)
    });
}

fn close_gracefully(handle: &SessionHandle) {
    let shared = &handle.shared;
    if let Err(error) = shared.transport.flush() {
        FlushFailed {
            client_id: &handle.client_id(),
            error: &error,
        }
        .log();
    }
    shared.transport.close();
    lock(&shared.pending_acks).clear();
    handle.transition(SessionState::Disconnected);

    SessionDisconnected {
        client_id: &handle.client_id(),
    }
    .log();
    run_callback(handle, "disconnected", || shared.handler.disconnected(handle));
}

fn run_callback(handle: &SessionHandle, callback: &'static str, f: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(f)) {
        CallbackPanicked {
            client_id: &handle.client_id(),
            callback,
            panic: &panic_message(panic.as_ref()),
        }
        .log();
    }
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
