//! Subscription session: connect, subscribe, stream, and reconnect.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::Error;
use crate::config::TimingConfig;
use crate::protocol::{
    JsonRpcRequest, Notification, decode_notification, decode_response, encode_request,
};
use crate::transport::{Connection, Connector};

const CLOSE_REASON: &str = "subscription of notifications was closed";
const RECONNECT_REASON: &str = "reconnecting";
const SUBSCRIBE_FAILED_REASON: &str = "subscribe failed";
const MIN_KEEPALIVE_INTERVAL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

enum State<C> {
    Connecting,
    Subscribing(C),
    Streaming { conn: C, subscription: u64 },
    Reconnecting(Option<C>),
    Terminated(Option<C>),
}

enum StreamEnd {
    Cancelled,
    Lost(Error),
}

/// One logical subscription kept alive across transport interruptions.
///
/// Setup failures of the first attempt are returned to the caller. Once a
/// subscription has been active, every failure is retried: the connection is
/// dropped, the session waits `reconnect_delay`, and the same request is sent
/// on a fresh connection. The new subscription does not resume the old one,
/// so notifications emitted while reconnecting are lost.
pub struct Session<'a, C> {
    connector: &'a C,
    endpoint: &'a str,
    timing: TimingConfig,
}

impl<'a, C: Connector> Session<'a, C> {
    pub fn new(connector: &'a C, endpoint: &'a str, timing: TimingConfig) -> Self {
        Self {
            connector,
            endpoint,
            timing,
        }
    }

    /// Run until `cancel` fires, invoking `on_notification` once per decoded
    /// notification in arrival order.
    ///
    /// Returns `Ok(())` on cancellation.
    ///
    /// Every text frame received while streaming is decoded leniently as a
    /// [`Notification`]. Frames that are not notifications, such as a stray
    /// response, still reach `on_notification` with an empty `method`;
    /// callers that care should check it.
    ///
    /// # Errors
    ///
    /// Returns a setup error ([`Error::is_setup`]) if the first connect or
    /// subscribe attempt fails.
    pub async fn run<T, F>(
        &self,
        cancel: &CancellationToken,
        request: &JsonRpcRequest,
        mut on_notification: F,
    ) -> Result<(), Error>
    where
        T: DeserializeOwned + Default,
        F: FnMut(Notification<T>),
    {
        let mut state = State::Connecting;
        // Set once the first subscription succeeds; from then on setup
        // failures are retried instead of returned.
        let mut recovering = false;
        let mut reconnects: u64 = 0;

        loop {
            state = match state {
                State::Connecting => {
                    let connected = cancel
                        .run_until_cancelled(self.connector.connect(self.endpoint))
                        .await;
                    match connected {
                        None => State::Terminated(None),
                        Some(Ok(conn)) => State::Subscribing(conn),
                        Some(Err(e)) if recovering => {
                            tracing::warn!(reconnects, "Reconnect failed: {e}");
                            State::Reconnecting(None)
                        }
                        Some(Err(e)) => return Err(Error::Connect(Box::new(e))),
                    }
                }

                State::Subscribing(mut conn) => {
                    let acked = cancel
                        .run_until_cancelled(subscribe(&mut conn, request))
                        .await;
                    match acked {
                        None => State::Terminated(Some(conn)),
                        Some(Ok(subscription)) => {
                            tracing::info!(
                                subscription,
                                method = %request.method,
                                reconnects,
                                "Subscribed",
                            );
                            recovering = true;
                            State::Streaming { conn, subscription }
                        }
                        Some(Err(e)) if recovering => {
                            tracing::warn!(reconnects, "Resubscribe failed: {e}");
                            State::Reconnecting(Some(conn))
                        }
                        Some(Err(e)) => {
                            conn.close(SUBSCRIBE_FAILED_REASON).await;
                            return Err(e);
                        }
                    }
                }

                State::Streaming {
                    mut conn,
                    subscription,
                } => {
                    let end = self
                        .stream::<T, F>(&mut conn, cancel, &mut on_notification)
                        .await;
                    match end {
                        StreamEnd::Cancelled => State::Terminated(Some(conn)),
                        StreamEnd::Lost(e) => {
                            tracing::warn!(subscription, "Notification stream lost: {e}");
                            State::Reconnecting(Some(conn))
                        }
                    }
                }

                State::Reconnecting(conn) => {
                    if let Some(mut conn) = conn {
                        conn.close(RECONNECT_REASON).await;
                    }
                    reconnects += 1;
                    let delay = self.timing.reconnect_delay;
                    tracing::info!(reconnects, ?delay, "Reconnecting");
                    match cancel.run_until_cancelled(tokio::time::sleep(delay)).await {
                        Some(()) => State::Connecting,
                        None => State::Terminated(None),
                    }
                }

                State::Terminated(conn) => {
                    if let Some(mut conn) = conn {
                        conn.close(CLOSE_REASON).await;
                    }
                    tracing::info!(reconnects, "Subscription cancelled");
                    return Ok(());
                }
            };
        }
    }

    async fn stream<T, F>(
        &self,
        conn: &mut C::Connection,
        cancel: &CancellationToken,
        on_notification: &mut F,
    ) -> StreamEnd
    where
        T: DeserializeOwned + Default,
        F: FnMut(Notification<T>),
    {
        let period = self.timing.keepalive_interval.max(MIN_KEEPALIVE_INTERVAL);
        let mut keepalive = tokio::time::interval_at(Instant::now() + period, period);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => return StreamEnd::Cancelled,

                frame = conn.recv_text() => {
                    let text = match frame {
                        Ok(text) => text,
                        Err(e) => return StreamEnd::Lost(e),
                    };
                    match decode_notification::<T>(&text) {
                        Ok(notification) => on_notification(notification),
                        Err(e) => return StreamEnd::Lost(e),
                    }
                }

                _ = keepalive.tick() => {
                    match cancel.run_until_cancelled(conn.ping()).await {
                        None => return StreamEnd::Cancelled,
                        Some(Ok(())) => tracing::trace!("Keepalive ping sent"),
                        Some(Err(e)) => tracing::debug!("Keepalive ping failed: {e}"),
                    }
                }
            }
        }
    }
}

/// Send the subscribe request and wait for its acknowledgement.
async fn subscribe<C: Connection>(conn: &mut C, request: &JsonRpcRequest) -> Result<u64, Error> {
    let payload = encode_request(request).map_err(|e| Error::SendSubscribe(Box::new(e)))?;
    conn.send_text(payload)
        .await
        .map_err(|e| Error::SendSubscribe(Box::new(e)))?;

    let text = conn
        .recv_text()
        .await
        .map_err(|e| Error::ReadAcknowledgement(Box::new(e)))?;
    let ack = decode_response(&text).map_err(|e| Error::ReadAcknowledgement(Box::new(e)))?;

    if let Some(err) = ack.error {
        return Err(Error::Rpc {
            code: err.code,
            message: err.message,
        });
    }
    ack.subscription_id().ok_or(Error::MissingSubscriptionId)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
