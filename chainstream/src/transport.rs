//! Transport boundary: a duplex text-message connection and its WebSocket
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::Error;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens connections to an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    type Connection: Connection;

    async fn connect(&self, endpoint: &str) -> Result<Self::Connection, Error>;
}

/// A connection exclusively owned by one session.
#[async_trait]
pub trait Connection: Send {
    async fn send_text(&mut self, text: String) -> Result<(), Error>;

    /// Wait for the next text message.
    ///
    /// Must be cancel-safe: the session polls it inside `select!` and drops
    /// it when the keepalive timer or cancellation wins.
    async fn recv_text(&mut self) -> Result<String, Error>;

    async fn ping(&mut self) -> Result<(), Error>;

    /// Close the connection. Failures are swallowed.
    async fn close(&mut self, reason: &str);
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Dials `ws://` and `wss://` endpoints with tokio-tungstenite.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

pub struct WsConnection {
    ws: WsStream,
}

fn validate_endpoint(endpoint: &str) -> Result<url::Url, Error> {
    let url = url::Url::parse(endpoint)?;
    match url.scheme() {
        "ws" | "wss" => Ok(url),
        other => Err(Error::InvalidEndpoint(format!(
            "unsupported scheme '{other}', expected ws or wss"
        ))),
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self, endpoint: &str) -> Result<WsConnection, Error> {
        let url = validate_endpoint(endpoint)?;
        let (ws, _resp) = tokio_tungstenite::connect_async(url.as_str()).await?;
        Ok(WsConnection { ws })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.ws.send(tungstenite::Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv_text(&mut self) -> Result<String, Error> {
        while let Some(frame) = self.ws.next().await {
            match frame? {
                tungstenite::Message::Text(text) => return Ok(text.as_str().to_owned()),
                tungstenite::Message::Binary(data) => {
                    return Ok(String::from_utf8(data.to_vec())?);
                }
                tungstenite::Message::Close(frame) => {
                    tracing::debug!(?frame, "Server sent close frame");
                    return Err(Error::ConnectionClosed);
                }
                _ => {
                    // Ping/pong are answered by tungstenite itself
                }
            }
        }
        Err(Error::ConnectionClosed)
    }

    async fn ping(&mut self) -> Result<(), Error> {
        self.ws
            .send(tungstenite::Message::Ping(Default::default()))
            .await?;
        Ok(())
    }

    async fn close(&mut self, reason: &str) {
        let frame = CloseFrame {
            code: CloseCode::Normal,
            reason: reason.to_string().into(),
        };
        match tokio::time::timeout(CLOSE_TIMEOUT, self.ws.close(Some(frame))).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::debug!("Close failed: {e}"),
            Err(_) => tracing::debug!("Close timed out"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
