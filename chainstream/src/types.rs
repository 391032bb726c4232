//! Error type for the chainstream crate.

use tokio_tungstenite::tungstenite;

/// Errors returned by this crate.
///
/// `Connect`, `SendSubscribe`, `ReadAcknowledgement`, `Rpc` and
/// `MissingSubscriptionId` are setup failures: a session only returns them
/// when its very first subscribe attempt fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("binary frame is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("connection closed by server")]
    ConnectionClosed,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("cannot connect to chainstream: {0}")]
    Connect(#[source] Box<Error>),

    #[error("cannot send subscribe request: {0}")]
    SendSubscribe(#[source] Box<Error>),

    #[error("cannot read subscribe response: {0}")]
    ReadAcknowledgement(#[source] Box<Error>),

    #[error("subscribe rejected: code={code}, {message}")]
    Rpc { code: i64, message: String },

    #[error("subscribe error: response carried no subscription id")]
    MissingSubscriptionId,

    #[error("config error: {0}")]
    Config(String),
}

impl From<tungstenite::Error> for Error {
    fn from(e: tungstenite::Error) -> Self {
        match e {
            tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed => {
                Error::ConnectionClosed
            }
            other => Error::WebSocket(Box::new(other)),
        }
    }
}

impl Error {
    /// Whether this error happened while establishing a subscription.
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            Error::Connect(_)
                | Error::SendSubscribe(_)
                | Error::ReadAcknowledgement(_)
                | Error::Rpc { .. }
                | Error::MissingSubscriptionId
        )
    }
}
