//! Syndica ChainStream subscription client.
//!
//! Keeps a JSON-RPC subscription over WebSocket alive and hands every decoded
//! notification to a callback until the caller cancels.
//!
//! # Features
//! - Transaction, block and slot subscriptions
//! - Automatic reconnect and resubscribe after stream failures
//! - Keepalive pings on a fixed cadence
//! - Lenient notification decoding: absent fields default instead of failing
//!
//! Only setup failures of the first attempt are returned. Once streaming, a
//! broken connection is replaced by a fresh subscription; notifications sent
//! while reconnecting are not replayed.
//!
//! # Example
//! ```no_run
//! # async fn example() -> Result<(), chainstream::Error> {
//! use chainstream::protocol::{JsonRpcRequest, TransactionSubscribeParams};
//! use chainstream::{Client, Config};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = Client::new(Config::new("wss://chainstream.api.syndica.io/api-key/KEY"));
//! let request = JsonRpcRequest::transactions_subscribe(1, &TransactionSubscribeParams::default())?;
//! let cancel = CancellationToken::new();
//!
//! client
//!     .transactions_notifications(&cancel, &request, |tx| {
//!         println!("{} {} {}", tx.slot(), tx.signature(), tx.instruction_type());
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
pub mod notification;
pub mod protocol;
mod session;
pub mod transport;
mod types;

pub use client::Client;
pub use config::{Config, ENDPOINT_ENV, TimingConfig};
pub use notification::{InstructionType, TransactionNotification};
pub use session::Session;
pub use types::Error;
