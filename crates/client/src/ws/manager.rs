//! Room connection manager.
//!
//! A [`ChatClient`] owns at most one live connection, bound to the current
//! room. Each connection runs as one driver task that opens the socket,
//! routes inbound frames, writes outbound commands and applies the
//! reconnect policy. Every connection gets a fresh generation number;
//! teardown bumps it first, so anything an old driver still tries to write
//! or emit is discarded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crmchat_shared::{encode_outbound, OutboundCommand, CLOSE_NORMAL, INTENTIONAL_CLOSE_REASON};
use futures_channel::mpsc::{unbounded, UnboundedSender};
use futures_util::StreamExt;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;
use url::Url;

use super::connection::{
    CloseInfo, ConnectionState, ConnectionStatus, Connector, Incoming, Transport, WsConnector,
};
use super::policy::{Backoff, ReconnectPolicy};
use super::router::{ChatMutation, EventRouter, ReadReceipt, Routed};
use crate::config::ChatConfig;

/// Kind of error surfaced to the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server sent an `error` frame.
    Server,
    /// A frame could not be decoded. The connection stays open.
    Malformed,
    /// Reconnecting gave up, or the connection could not be set up at all.
    /// Needs user action.
    Terminal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ErrorSignal {
    pub room_id: String,
    pub kind: ErrorKind,
    pub message: String,
}

/// Everything a [`ChatClient`] reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// A state change for the state layer to apply.
    Mutation(ChatMutation),
    /// A read receipt. Informational only.
    MessageRead(ReadReceipt),
    Connected { room_id: String },
    Disconnected { room_id: String, close: CloseInfo },
    Error(ErrorSignal),
}

/// Callback receiving [`ChatEvent`]s, in delivery order.
pub type EventSink = Arc<dyn Fn(ChatEvent) + Send + Sync>;

struct DriverHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl DriverHandle {
    async fn stop(self, timeout: Duration) {
        let _ = self.shutdown.send(());
        let mut task = self.task;
        if tokio::time::timeout(timeout, &mut task).await.is_err() {
            crate::log_warn!("Connection task did not stop within {:?}, aborting", timeout);
            task.abort();
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Room requested by the session.
    room_id: Option<String>,
    authenticated: bool,
    generation: u64,
    /// Room of the current connection, if any.
    active_room: Option<String>,
    connection_id: Option<String>,
    state: ConnectionState,
    attempt: u32,
    retry_in: Option<Duration>,
    last_error: Option<String>,
    outbound: Option<UnboundedSender<OutboundCommand>>,
    driver: Option<DriverHandle>,
}

impl Inner {
    fn snapshot(&self) -> ConnectionStatus {
        ConnectionStatus {
            connection_id: self.connection_id.clone(),
            room_id: self.room_id.clone(),
            state: self.state,
            attempt: self.attempt,
            retry_in: self.retry_in,
            last_error: self.last_error.clone(),
        }
    }

    /// The driver stopped on its own; the connection is gone.
    fn finish(&mut self) {
        self.state = ConnectionState::Idle;
        self.retry_in = None;
        self.outbound = None;
        self.connection_id = None;
        self.active_room = None;
    }

    /// Invalidate the current connection and return its driver for stopping.
    fn reset(&mut self) -> Option<DriverHandle> {
        self.generation += 1;
        self.state = ConnectionState::Idle;
        self.attempt = 0;
        self.retry_in = None;
        self.outbound = None;
        self.connection_id = None;
        self.active_room = None;
        self.driver.take()
    }
}

struct Shared {
    inner: Mutex<Inner>,
    status: watch::Sender<ConnectionStatus>,
    on_event: EventSink,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, inner: &Inner) {
        self.status.send_replace(inner.snapshot());
    }

    /// Apply `f` if `generation` is still current, then publish the status.
    fn update<R>(&self, generation: u64, f: impl FnOnce(&mut Inner) -> R) -> Option<R> {
        let mut inner = self.lock();
        if inner.generation != generation {
            return None;
        }
        let result = f(&mut inner);
        self.publish(&inner);
        Some(result)
    }

    /// Deliver `event` if `generation` is still current.
    fn emit(&self, generation: u64, event: ChatEvent) {
        if self.lock().generation != generation {
            return;
        }
        (self.on_event)(event);
    }
}

/// Realtime chat client for one room at a time.
///
/// Must be used inside a tokio runtime. Dropping the client closes any live
/// connection intentionally.
pub struct ChatClient {
    config: ChatConfig,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

impl ChatClient {
    pub fn new<C, F>(config: ChatConfig, connector: C, on_event: F) -> Self
    where
        C: Connector,
        F: Fn(ChatEvent) + Send + Sync + 'static,
    {
        let (status, _) = watch::channel(ConnectionStatus::default());
        Self {
            config,
            connector: Arc::new(connector),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                status,
                on_event: Arc::new(on_event),
            }),
        }
    }

    /// Client using the tokio-tungstenite transport.
    pub fn with_native_transport<F>(config: ChatConfig, on_event: F) -> Self
    where
        F: Fn(ChatEvent) + Send + Sync + 'static,
    {
        let connector = WsConnector::new(config.session_cookie.clone());
        Self::new(config, connector, on_event)
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Subscribe to connection status changes.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.shared.status.borrow().clone()
    }

    pub fn is_open(&self) -> bool {
        self.shared.lock().state.is_open()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.lock().last_error.clone()
    }

    pub fn room_id(&self) -> Option<String> {
        self.shared.lock().room_id.clone()
    }

    /// Bind the client to a room, or unbind it with `None`.
    ///
    /// Changing the room tears the current connection down and, when the
    /// session is authenticated, opens one for the new room.
    pub async fn set_room(&self, room_id: Option<String>) {
        let room_id = room_id
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty());
        let changed = {
            let mut inner = self.shared.lock();
            if inner.room_id == room_id {
                false
            } else {
                inner.room_id = room_id;
                true
            }
        };
        if changed {
            self.teardown().await;
            self.connect();
        }
    }

    /// Report whether the session is authenticated. Revoking tears the
    /// connection down.
    pub async fn set_authenticated(&self, authenticated: bool) {
        let changed = {
            let mut inner = self.shared.lock();
            let changed = inner.authenticated != authenticated;
            inner.authenticated = authenticated;
            changed
        };
        if changed {
            self.teardown().await;
            self.connect();
        }
    }

    /// Open a connection for the current room.
    ///
    /// No-op unless a room is set and the session is authenticated, and
    /// while a connection is already connecting, open, or waiting to retry.
    pub fn connect(&self) {
        let mut inner = self.shared.lock();
        let Some(room_id) = inner.room_id.clone() else {
            crate::log_debug!("Connect skipped: no room selected");
            return;
        };
        if !inner.authenticated {
            crate::log_debug!("Connect skipped: not authenticated");
            return;
        }
        if inner.state.is_active() {
            crate::log_debug!(room = %room_id, "Connect skipped: connection is {:?}", inner.state);
            return;
        }

        let url = match self.config.room_url(&room_id) {
            Ok(url) => url,
            Err(e) => {
                let message = format!("Cannot connect to room {}: {}", room_id, e);
                crate::log_error!("{}", message);
                inner.last_error = Some(message.clone());
                self.shared.publish(&inner);
                drop(inner);
                (self.shared.on_event)(ChatEvent::Error(ErrorSignal {
                    room_id,
                    kind: ErrorKind::Terminal,
                    message,
                }));
                return;
            }
        };

        // Replaces a driver that already finished on its own
        let _ = inner.reset();
        let generation = inner.generation;
        let connection_id = uuid::Uuid::new_v4().to_string();
        inner.state = ConnectionState::Connecting;
        inner.active_room = Some(room_id.clone());
        inner.connection_id = Some(connection_id.clone());

        let driver = Driver {
            generation,
            url,
            router: EventRouter::new(room_id.clone()),
            policy: self.config.reconnect.clone(),
            connector: self.connector.clone(),
            shared: self.shared.clone(),
        };
        let (shutdown, shutdown_rx) = oneshot::channel();
        let span = tracing::info_span!("chat_connection", room = %room_id, connection_id = %connection_id);
        let task = tokio::spawn(driver.run(shutdown_rx).instrument(span));
        inner.driver = Some(DriverHandle { shutdown, task });
        self.shared.publish(&inner);
    }

    /// Close the connection intentionally and cancel any pending retry.
    /// Safe to call in any state, any number of times.
    pub async fn disconnect(&self) {
        self.teardown().await;
    }

    /// Start over with a fresh connection, skipping any backoff in progress.
    pub async fn reconnect(&self) {
        self.teardown().await;
        self.connect();
    }

    /// Hand a command to the open connection, or drop it.
    pub(crate) fn transmit(&self, command: OutboundCommand) {
        let inner = self.shared.lock();
        match (&inner.state, &inner.outbound) {
            (ConnectionState::Open, Some(outbound)) => {
                if outbound.unbounded_send(command).is_err() {
                    crate::log_debug!("Dropping command: connection is closing");
                }
            }
            (state, _) => {
                crate::log_debug!("Dropping {} command: connection is {:?}", command.kind(), state);
            }
        }
    }

    async fn teardown(&self) {
        let (driver, closed_room) = {
            let mut inner = self.shared.lock();
            let closed_room = if inner.state.is_open() {
                inner.active_room.clone()
            } else {
                None
            };
            let driver = inner.reset();
            self.shared.publish(&inner);
            (driver, closed_room)
        };

        if let Some(driver) = driver {
            driver.stop(self.config.shutdown_timeout).await;
        }
        if let Some(room_id) = closed_room {
            crate::log_info!(room = %room_id, "Disconnected intentionally");
            (self.shared.on_event)(ChatEvent::Disconnected {
                room_id,
                close: CloseInfo::new(CLOSE_NORMAL, INTENTIONAL_CLOSE_REASON),
            });
        }
    }
}

impl Drop for ChatClient {
    fn drop(&mut self) {
        let mut inner = self.shared.lock();
        if let Some(driver) = inner.reset() {
            // The task closes its socket and exits on its own
            let _ = driver.shutdown.send(());
        }
        self.shared.publish(&inner);
    }
}

enum SessionEnd {
    Shutdown,
    Closed(CloseInfo),
}

/// Runs one connection: connect, pump frames, back off, retry.
struct Driver {
    generation: u64,
    url: Url,
    router: EventRouter,
    policy: ReconnectPolicy,
    connector: Arc<dyn Connector>,
    shared: Arc<Shared>,
}

impl Driver {
    async fn run(self, mut shutdown: oneshot::Receiver<()>) {
        loop {
            crate::log_info!("Connecting to {}", self.url);
            let connected = tokio::select! {
                _ = &mut shutdown => return,
                result = self.connector.connect(&self.url) => result,
            };

            let close = match connected {
                Ok(transport) => match self.run_session(transport, &mut shutdown).await {
                    SessionEnd::Shutdown => return,
                    SessionEnd::Closed(close) => close,
                },
                Err(e) => {
                    crate::log_warn!("Connection to {} failed: {}", self.url, e);
                    CloseInfo::abnormal(e.to_string())
                }
            };

            let Some(attempts) = self.shared.update(self.generation, |inner| {
                inner.state = ConnectionState::Closed;
                inner.outbound = None;
                inner.attempt
            }) else {
                return;
            };
            crate::log_info!("Connection closed: {}", close.describe());
            self.emit(ChatEvent::Disconnected {
                room_id: self.router.room_id().to_string(),
                close: close.clone(),
            });

            if close.is_intentional() {
                self.shared.update(self.generation, Inner::finish);
                return;
            }

            match self.policy.next(attempts) {
                Backoff::Retry { attempt, delay } => {
                    let scheduled = self.shared.update(self.generation, |inner| {
                        inner.attempt = attempt;
                        inner.retry_in = Some(delay);
                    });
                    if scheduled.is_none() {
                        return;
                    }
                    crate::log_info!(
                        "Reconnecting in {:?} (attempt {}/{})",
                        delay,
                        attempt,
                        self.policy.max_attempts
                    );

                    tokio::select! {
                        _ = &mut shutdown => return,
                        _ = tokio::time::sleep(delay) => {}
                    }

                    let resumed = self.shared.update(self.generation, |inner| {
                        inner.state = ConnectionState::Connecting;
                        inner.retry_in = None;
                    });
                    if resumed.is_none() {
                        return;
                    }
                }
                Backoff::GiveUp { attempts } => {
                    let message = format!(
                        "Unable to reconnect after {} attempts. Reload the page to try again.",
                        attempts
                    );
                    crate::log_error!("{}", message);
                    self.shared.update(self.generation, |inner| {
                        inner.finish();
                        inner.last_error = Some(message.clone());
                    });
                    self.report(ErrorKind::Terminal, message);
                    return;
                }
            }
        }
    }

    async fn run_session(
        &self,
        mut transport: Box<dyn Transport>,
        shutdown: &mut oneshot::Receiver<()>,
    ) -> SessionEnd {
        let (outbound, mut commands) = unbounded::<OutboundCommand>();
        let opened = self.shared.update(self.generation, |inner| {
            inner.state = ConnectionState::Open;
            inner.attempt = 0;
            inner.retry_in = None;
            inner.last_error = None;
            inner.outbound = Some(outbound);
        });
        if opened.is_none() {
            transport.close(CLOSE_NORMAL, INTENTIONAL_CLOSE_REASON).await;
            return SessionEnd::Shutdown;
        }
        crate::log_info!("Connected to {}", self.url);
        self.emit(ChatEvent::Connected {
            room_id: self.router.room_id().to_string(),
        });

        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    crate::log_info!("Closing connection intentionally");
                    transport.close(CLOSE_NORMAL, INTENTIONAL_CLOSE_REASON).await;
                    return SessionEnd::Shutdown;
                }
                Some(command) = commands.next() => {
                    match encode_outbound(&command) {
                        Ok(frame) => {
                            crate::log_debug!("Sending {} frame", command.kind());
                            if let Err(e) = transport.send(frame).await {
                                crate::log_warn!("{}", e);
                                return SessionEnd::Closed(CloseInfo::abnormal(e.to_string()));
                            }
                        }
                        Err(e) => crate::log_error!("Dropping {} command: {}", command.kind(), e),
                    }
                }
                incoming = transport.recv() => match incoming {
                    Incoming::Frame(text) => self.dispatch(&text),
                    Incoming::Malformed(reason) => {
                        crate::log_warn!("Malformed transport data: {}", reason);
                        self.report(ErrorKind::Malformed, reason);
                    }
                    Incoming::Closed(close) => return SessionEnd::Closed(close),
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match self.router.route_frame(text) {
            Routed::Mutation(mutation) => self.emit(ChatEvent::Mutation(mutation)),
            Routed::Receipt(receipt) => self.emit(ChatEvent::MessageRead(receipt)),
            Routed::ServerError(message) => self.report(ErrorKind::Server, message),
            Routed::Malformed(message) => self.report(ErrorKind::Malformed, message),
            Routed::Ignored { .. } => {}
        }
    }

    /// Record `message` as the last error and emit it.
    fn report(&self, kind: ErrorKind, message: String) {
        let recorded = self.shared.update(self.generation, |inner| {
            inner.last_error = Some(message.clone());
        });
        if recorded.is_some() {
            self.emit(ChatEvent::Error(ErrorSignal {
                room_id: self.router.room_id().to_string(),
                kind,
                message,
            }));
        }
    }

    fn emit(&self, event: ChatEvent) {
        self.shared.emit(self.generation, event);
    }
}
