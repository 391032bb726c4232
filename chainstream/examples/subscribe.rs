//! Stream ChainStream transaction notifications to stdout.
//!
//! ```sh
//! CHAINSTREAM_WSS_ENDPOINT=wss://chainstream.api.syndica.io/api-key/<KEY> \
//!     cargo run -p chainstream --example subscribe -- [ACCOUNT_KEY ...]
//! ```
//!
//! Or pass the endpoint as the first argument:
//! ```sh
//! cargo run -p chainstream --example subscribe -- <ENDPOINT> [ACCOUNT_KEY ...]
//! ```
//!
//! With account keys, only transactions touching one of them are streamed.
//! Ctrl-C stops the session.

use chainstream::protocol::{AccountKeysFilter, JsonRpcRequest, TransactionSubscribeParams};
use chainstream::{Client, Config, ENDPOINT_ENV};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(_) if !args.is_empty() => Config::new(args.remove(0)),
        Err(_) => {
            return Err(
                format!("usage: set {ENDPOINT_ENV} or pass <ENDPOINT> [ACCOUNT_KEY ...]").into(),
            );
        }
    };

    let mut params = TransactionSubscribeParams::default();
    params.filter.exclude_votes = true;
    if !args.is_empty() {
        params.filter.account_keys = Some(AccountKeysFilter {
            one_of: args,
            ..Default::default()
        });
    }
    let request = JsonRpcRequest::transactions_subscribe(1, &params)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("[interrupted]");
        }
        on_signal.cancel();
    });

    eprintln!("subscribing to transactions ...");

    let client = Client::new(config);
    client
        .transactions_notifications(&cancel, &request, |tx| {
            println!(
                "slot={} signature={} owner={} type={}",
                tx.slot(),
                tx.signature(),
                tx.owner(),
                tx.instruction_type(),
            );
        })
        .await?;

    eprintln!("[stopped]");
    Ok(())
}
