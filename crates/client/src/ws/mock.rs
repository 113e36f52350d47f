//! Scripted connector and transport for manager tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use super::connection::{CloseInfo, Connector, Incoming, Transport};
use crate::error::TransportError;

/// What the next `connect` call does.
pub(crate) enum Step {
    Open(MockTransport),
    Refuse(String),
    /// Never completes.
    Hang,
}

#[derive(Default)]
struct ConnectorState {
    script: VecDeque<Step>,
    urls: Vec<String>,
}

/// Plays back [`Step`]s in order; refuses once the script runs out.
#[derive(Clone, Default)]
pub(crate) struct MockConnector {
    state: Arc<Mutex<ConnectorState>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, step: Step) {
        self.state.lock().unwrap().script.push_back(step);
    }

    /// Queue a successful connect and return the far end of its socket.
    pub fn push_open(&self) -> MockRemote {
        let (transport, remote) = MockTransport::pair();
        self.push(Step::Open(transport));
        remote
    }

    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().urls.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        let step = {
            let mut state = self.state.lock().unwrap();
            state.urls.push(url.to_string());
            state.script.pop_front()
        };
        match step {
            Some(Step::Open(transport)) => Ok(Box::new(transport)),
            Some(Step::Refuse(reason)) => Err(TransportError::Handshake(reason)),
            Some(Step::Hang) => std::future::pending().await,
            None => Err(TransportError::Handshake("connection refused".into())),
        }
    }
}

pub(crate) struct MockTransport {
    incoming: mpsc::UnboundedReceiver<Incoming>,
    sent: mpsc::UnboundedSender<String>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl MockTransport {
    pub fn pair() -> (MockTransport, MockRemote) {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let closed = Arc::new(Mutex::new(None));
        (
            MockTransport {
                incoming: incoming_rx,
                sent: sent_tx,
                closed: closed.clone(),
            },
            MockRemote {
                incoming: incoming_tx,
                sent: sent_rx,
                closed,
            },
        )
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.sent
            .send(frame)
            .map_err(|_| TransportError::Send("remote gone".into()))
    }

    async fn recv(&mut self) -> Incoming {
        match self.incoming.recv().await {
            Some(incoming) => incoming,
            None => std::future::pending().await,
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        *self.closed.lock().unwrap() = Some((code, reason.to_string()));
    }
}

/// The server side of a [`MockTransport`].
pub(crate) struct MockRemote {
    incoming: mpsc::UnboundedSender<Incoming>,
    sent: mpsc::UnboundedReceiver<String>,
    closed: Arc<Mutex<Option<(u16, String)>>>,
}

impl MockRemote {
    pub fn push(&self, incoming: Incoming) {
        let _ = self.incoming.send(incoming);
    }

    pub fn frame(&self, text: &str) {
        self.push(Incoming::Frame(text.to_string()));
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.push(Incoming::Closed(CloseInfo::new(code, reason)));
    }

    pub async fn next_sent(&mut self) -> Option<String> {
        self.sent.recv().await
    }

    /// Code and reason the client closed with, if it did.
    pub fn closed_with(&self) -> Option<(u16, String)> {
        self.closed.lock().unwrap().clone()
    }
}
