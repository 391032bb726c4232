//! Public entry point: [`Client`].

use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::notification::TransactionNotification;
use crate::protocol::{JsonRpcRequest, Notification};
use crate::session::Session;
use crate::transport::{Connector, WsConnector};
use crate::types::Error;

/// ChainStream client bound to one endpoint.
///
/// Each call to [`transactions_notifications`](Client::transactions_notifications)
/// or [`notifications`](Client::notifications) runs an independent session
/// with its own connection.
pub struct Client<C = WsConnector> {
    config: Config,
    connector: C,
}

impl Client<WsConnector> {
    pub fn new(config: Config) -> Self {
        Self::with_connector(config, WsConnector)
    }
}

impl<C: Connector> Client<C> {
    /// Use a custom transport instead of the WebSocket connector.
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self { config, connector }
    }

    /// Subscribe to transaction notifications and invoke `on_notification`
    /// for each one until `cancel` fires.
    ///
    /// # Errors
    ///
    /// Returns an error only if the first connect or subscribe attempt fails.
    /// Later failures reconnect silently.
    pub async fn transactions_notifications<F>(
        &self,
        cancel: &CancellationToken,
        request: &JsonRpcRequest,
        on_notification: F,
    ) -> Result<(), Error>
    where
        F: FnMut(TransactionNotification),
    {
        self.notifications(cancel, request, on_notification).await
    }

    /// Like [`transactions_notifications`](Client::transactions_notifications)
    /// for any notification payload, e.g. block or slot updates.
    ///
    /// # Errors
    ///
    /// Returns an error only if the first connect or subscribe attempt fails.
    pub async fn notifications<T, F>(
        &self,
        cancel: &CancellationToken,
        request: &JsonRpcRequest,
        on_notification: F,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned + Default,
        F: FnMut(Notification<T>),
    {
        Session::new(
            &self.connector,
            &self.config.wss_api_endpoint,
            self.config.timing(),
        )
        .run(cancel, request, on_notification)
        .await
    }
}
