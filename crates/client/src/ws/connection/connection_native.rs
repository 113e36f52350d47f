//! Native WebSocket transport using tokio-tungstenite.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::{CloseInfo, Connector, Incoming, Transport};
use crate::error::TransportError;

/// Close code for a close frame that carried no status.
const CLOSE_NO_STATUS: u16 = 1005;

/// Opens chat room sockets, forwarding the session cookie on the handshake.
#[derive(Debug, Clone, Default)]
pub struct WsConnector {
    session_cookie: Option<String>,
}

impl WsConnector {
    pub fn new(session_cookie: Option<String>) -> Self {
        Self { session_cookie }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &Url) -> Result<Box<dyn Transport>, TransportError> {
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Handshake(e.to_string()))?;

        if let Some(cookie) = self.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .map_err(|e| TransportError::Handshake(format!("invalid session cookie: {}", e)))?;
            request.headers_mut().insert("Cookie", value);
        }

        let (stream, response) = connect_async(request)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        crate::log_debug!("Handshake with {} answered {}", url, response.status());

        Ok(Box::new(WsTransport {
            stream,
            closed: None,
        }))
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    closed: Option<CloseInfo>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: String) -> Result<(), TransportError> {
        self.stream
            .send(Message::Text(frame.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Incoming {
        if let Some(info) = &self.closed {
            return Incoming::Closed(info.clone());
        }

        loop {
            let incoming = match self.stream.next().await {
                Some(Ok(Message::Text(text))) => Incoming::Frame(text.to_string()),
                Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                    Ok(text) => Incoming::Frame(text),
                    Err(_) => Incoming::Malformed(format!(
                        "received {} byte binary frame that is not UTF-8",
                        data.len()
                    )),
                },
                Some(Ok(Message::Close(frame))) => {
                    let info = match frame {
                        Some(frame) => CloseInfo::new(u16::from(frame.code), frame.reason.to_string()),
                        None => CloseInfo::new(CLOSE_NO_STATUS, ""),
                    };
                    self.closed = Some(info.clone());
                    Incoming::Closed(info)
                }
                // Pong replies are queued by tungstenite itself
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    let info = CloseInfo::abnormal(e.to_string());
                    self.closed = Some(info.clone());
                    Incoming::Closed(info)
                }
                None => {
                    let info = CloseInfo::abnormal("stream ended");
                    self.closed = Some(info.clone());
                    Incoming::Closed(info)
                }
            };
            return incoming;
        }
    }

    async fn close(&mut self, code: u16, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };
        if let Err(e) = self.stream.close(Some(frame)).await {
            crate::log_debug!("Close handshake failed: {}", e);
        }
        self.closed = Some(CloseInfo::new(code, reason));
    }
}
