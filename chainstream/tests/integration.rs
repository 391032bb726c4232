use std::time::Duration;

use chainstream::protocol::{
    BlockSubscribeParams, JsonRpcRequest, Notification, TransactionSubscribeParams, method,
};
use chainstream::{Client, Config, Error, TimingConfig, TransactionNotification};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type WsStream = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct MockChainstreamServer {
    listener: TcpListener,
    port: u16,
}

impl MockChainstreamServer {
    async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let port = listener.local_addr()?.port();
        Ok(Self { listener, port })
    }

    fn endpoint(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.port)
    }

    /// Accept one TCP connection and return the raw WebSocket (no subscribe).
    async fn accept_raw(&self) -> Result<WsStream, BoxError> {
        let (tcp, _) = self.listener.accept().await?;
        Ok(tokio_tungstenite::accept_async(tcp).await?)
    }

    /// Accept one connection, read the subscribe request, and acknowledge it
    /// with `subscription`.
    async fn accept_and_subscribe(
        &self,
        expected_method: &str,
        subscription: u64,
    ) -> Result<WsStream, BoxError> {
        let mut ws = self.accept_raw().await?;
        let request = read_request(&mut ws).await?;
        assert_eq!(request.jsonrpc, "2.0");
        assert_eq!(request.method, expected_method);
        send_json(
            &mut ws,
            serde_json::json!({"jsonrpc": "2.0", "id": request.id, "result": subscription}),
        )
        .await?;
        Ok(ws)
    }
}

async fn read_request(ws: &mut WsStream) -> Result<JsonRpcRequest, BoxError> {
    loop {
        let frame = ws.next().await.ok_or("WebSocket closed unexpectedly")??;
        if let tungstenite::Message::Text(text) = frame {
            return Ok(serde_json::from_str(text.as_str())?);
        }
    }
}

async fn send_json(ws: &mut WsStream, value: serde_json::Value) -> Result<(), BoxError> {
    ws.send(tungstenite::Message::Text(value.to_string().into()))
        .await?;
    Ok(())
}

async fn send_transaction(ws: &mut WsStream, subscription: u64, slot: u64) -> Result<(), BoxError> {
    send_json(
        ws,
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": method::TRANSACTION_NOTIFICATION,
            "params": {
                "subscription": subscription,
                "result": {
                    "context": {"slot": slot, "signature": format!("sig-{slot}")},
                    "value": {
                        "slot": slot,
                        "transaction": {"message": {"accountKeys": ["payer"]}}
                    }
                }
            }
        }),
    )
    .await
}

/// Keep polling the socket so pings are answered and closes are seen.
async fn hold_open(mut ws: WsStream) {
    while let Some(Ok(_)) = ws.next().await {}
}

fn test_config(endpoint: String) -> Config {
    let mut config = Config::new(endpoint);
    config.timing = Some(TimingConfig {
        keepalive_interval: Duration::from_secs(30),
        reconnect_delay: Duration::from_millis(10),
    });
    config
}

#[allow(clippy::unwrap_used)]
fn transactions_request() -> JsonRpcRequest {
    JsonRpcRequest::transactions_subscribe(1, &TransactionSubscribeParams::default()).unwrap()
}

/// Run a transaction session that cancels itself after `stop_after`
/// notifications.
#[allow(clippy::expect_used)]
async fn collect_transactions(
    config: Config,
    stop_after: usize,
) -> (Result<(), Error>, Vec<TransactionNotification>) {
    let client = Client::new(config);
    let cancel = CancellationToken::new();
    let mut received = Vec::new();
    let result = tokio::time::timeout(
        TEST_TIMEOUT,
        client.transactions_notifications(&cancel, &transactions_request(), |tx| {
            received.push(tx);
            if received.len() >= stop_after {
                cancel.cancel();
            }
        }),
    )
    .await
    .expect("session timed out");
    (result, received)
}

// ---------------------------------------------------------------------------
// Test 1: notifications delivered in order
// ---------------------------------------------------------------------------

#[tokio::test]
async fn receives_notifications_in_order() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut conn = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 42)
            .await
            .unwrap();
        for slot in 100..103 {
            send_transaction(&mut conn, 42, slot).await.unwrap();
        }
        hold_open(conn).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 3).await;
    assert!(result.is_ok(), "{result:?}");
    let slots: Vec<u64> = received.iter().map(TransactionNotification::slot).collect();
    assert_eq!(slots, vec![100, 101, 102]);
    for tx in &received {
        assert_eq!(tx.params.subscription, 42);
        assert_eq!(tx.owner(), "payer");
        assert_eq!(tx.signature(), format!("sig-{}", tx.slot()));
    }
}

// ---------------------------------------------------------------------------
// Test 2: server closes the stream, session resubscribes on a new connection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconnects_after_server_closes_connection() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut first = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 1)
            .await
            .unwrap();
        send_transaction(&mut first, 1, 1).await.unwrap();
        send_transaction(&mut first, 1, 2).await.unwrap();
        first.close(None).await.unwrap();

        let mut second = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 2)
            .await
            .unwrap();
        send_transaction(&mut second, 2, 3).await.unwrap();
        send_transaction(&mut second, 2, 4).await.unwrap();
        hold_open(second).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 4).await;
    assert!(result.is_ok(), "{result:?}");
    let slots: Vec<u64> = received.iter().map(TransactionNotification::slot).collect();
    assert_eq!(slots, vec![1, 2, 3, 4]);
    let subscriptions: Vec<u64> = received.iter().map(|tx| tx.params.subscription).collect();
    assert_eq!(subscriptions, vec![1, 1, 2, 2]);
}

// ---------------------------------------------------------------------------
// Test 3: malformed frame triggers a reconnect, not an error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn malformed_frame_triggers_reconnect() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut first = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 1)
            .await
            .unwrap();
        first
            .send(tungstenite::Message::Text("{\"jsonrpc\":".to_string().into()))
            .await
            .unwrap();
        tokio::spawn(hold_open(first));

        let mut second = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 2)
            .await
            .unwrap();
        send_transaction(&mut second, 2, 5).await.unwrap();
        hold_open(second).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 1).await;
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(received.len(), 1);
    assert!(received.iter().all(|tx| tx.slot() == 5));
}

#[tokio::test]
async fn non_utf8_binary_frame_triggers_reconnect() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut first = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 1)
            .await
            .unwrap();
        // valid UTF-8 in a binary frame is accepted
        let valid = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method::TRANSACTION_NOTIFICATION,
            "params": {"subscription": 1, "result": {"context": {"slot": 1, "signature": "ok"}}}
        });
        first
            .send(tungstenite::Message::Binary(valid.to_string().into_bytes().into()))
            .await
            .unwrap();
        let mut invalid = br#"{"params":{"result":{"context":{"slot":2,"signature":"ab"#.to_vec();
        invalid.push(0xFF);
        invalid.extend_from_slice(br#""}}}}"#);
        first
            .send(tungstenite::Message::Binary(invalid.into()))
            .await
            .unwrap();
        tokio::spawn(hold_open(first));

        let mut second = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 2)
            .await
            .unwrap();
        send_transaction(&mut second, 2, 3).await.unwrap();
        hold_open(second).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 2).await;
    assert!(result.is_ok(), "{result:?}");
    let signatures: Vec<&str> = received.iter().map(TransactionNotification::signature).collect();
    assert_eq!(signatures, vec!["ok", "sig-3"]);
    let subscriptions: Vec<u64> = received.iter().map(|tx| tx.params.subscription).collect();
    assert_eq!(subscriptions, vec![1, 2]);
}

// ---------------------------------------------------------------------------
// Test 4: zero subscription id on first attempt is a setup error
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_subscription_id_is_setup_error() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut conn = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 0)
            .await
            .unwrap();
        let _ = send_transaction(&mut conn, 0, 1).await;
        hold_open(conn).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 1).await;
    match result {
        Err(Error::MissingSubscriptionId) => {}
        other => panic!("expected MissingSubscriptionId, got {other:?}"),
    }
    assert!(received.is_empty());
}

// ---------------------------------------------------------------------------
// Test 5: error acknowledgement is surfaced with code and message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rpc_error_acknowledgement_is_setup_error() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut conn = server.accept_raw().await.unwrap();
        let request = read_request(&mut conn).await.unwrap();
        send_json(
            &mut conn,
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": request.id,
                "error": {"code": -32602, "message": "invalid network"}
            }),
        )
        .await
        .unwrap();
        hold_open(conn).await;
    });

    let (result, _) = collect_transactions(test_config(endpoint), 1).await;
    match result {
        Err(Error::Rpc { code, message }) => {
            assert_eq!(code, -32602);
            assert_eq!(message, "invalid network");
        }
        other => panic!("expected Rpc error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 6: connection refused is a setup error with zero callbacks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn connection_refused_is_setup_error() {
    init_tracing();
    let endpoint = {
        let server = MockChainstreamServer::start().await.unwrap();
        server.endpoint()
        // listener dropped here, port now refuses connections
    };

    let (result, received) = collect_transactions(test_config(endpoint), 1).await;
    assert!(matches!(result, Err(Error::Connect(_))), "{result:?}");
    assert!(received.is_empty());
}

#[tokio::test]
async fn non_websocket_endpoint_is_setup_error() {
    init_tracing();
    let (result, _) =
        collect_transactions(test_config("https://127.0.0.1:1/".to_string()), 1).await;
    match result {
        Err(Error::Connect(source)) => {
            assert!(matches!(*source, Error::InvalidEndpoint(_)));
        }
        other => panic!("expected Connect error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Test 7: cancellation stops delivery even with frames queued
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_stops_delivery() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut conn = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 9)
            .await
            .unwrap();
        for slot in 0..5 {
            send_transaction(&mut conn, 9, slot).await.unwrap();
        }
        hold_open(conn).await;
    });

    let (result, received) = collect_transactions(test_config(endpoint), 2).await;
    assert!(result.is_ok(), "{result:?}");
    assert_eq!(received.len(), 2);
}

#[tokio::test]
async fn cancellation_before_acknowledgement_is_not_an_error() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        // never acknowledge
        let conn = server.accept_raw().await.unwrap();
        hold_open(conn).await;
    });

    let client = Client::new(test_config(endpoint));
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let result = tokio::time::timeout(
        TEST_TIMEOUT,
        client.transactions_notifications(&cancel, &transactions_request(), |_| {
            panic!("no notification expected");
        }),
    )
    .await
    .expect("session timed out");
    assert!(result.is_ok(), "{result:?}");
}

// ---------------------------------------------------------------------------
// Test 8: keepalive pings reach the server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn keepalive_ping_reaches_server() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let mut config = test_config(server.endpoint());
    config.timing = Some(TimingConfig {
        keepalive_interval: Duration::from_millis(50),
        reconnect_delay: Duration::from_millis(10),
    });

    tokio::spawn(async move {
        let mut conn = server
            .accept_and_subscribe(method::TRANSACTIONS_SUBSCRIBE, 3)
            .await
            .unwrap();
        // Only send a notification once a ping has arrived
        loop {
            match conn.next().await {
                Some(Ok(tungstenite::Message::Ping(_))) => break,
                Some(Ok(_)) => {}
                other => panic!("expected ping, got {other:?}"),
            }
        }
        send_transaction(&mut conn, 3, 77).await.unwrap();
        hold_open(conn).await;
    });

    let (result, received) = collect_transactions(config, 1).await;
    assert!(result.is_ok(), "{result:?}");
    assert!(received.iter().all(|tx| tx.slot() == 77));
}

// ---------------------------------------------------------------------------
// Test 9: generic notifications (block subscription)
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct BlockUpdate {
    slot: u64,
    blockhash: String,
}

#[tokio::test]
async fn block_notifications_decode_into_custom_payload() {
    init_tracing();
    let server = MockChainstreamServer::start().await.unwrap();
    let endpoint = server.endpoint();

    tokio::spawn(async move {
        let mut conn = server
            .accept_and_subscribe(method::BLOCKS_SUBSCRIBE, 5)
            .await
            .unwrap();
        send_json(
            &mut conn,
            serde_json::json!({
                "jsonrpc": "2.0",
                "method": "blockNotification",
                "params": {"subscription": 5, "result": {"slot": 900, "blockhash": "abc"}}
            }),
        )
        .await
        .unwrap();
        hold_open(conn).await;
    });

    let client = Client::new(test_config(endpoint));
    let request = JsonRpcRequest::blocks_subscribe(2, &BlockSubscribeParams::default()).unwrap();
    let cancel = CancellationToken::new();
    let mut blocks = Vec::new();
    let result = tokio::time::timeout(
        TEST_TIMEOUT,
        client.notifications(&cancel, &request, |n: Notification<BlockUpdate>| {
            blocks.push((n.method, n.params.result.slot, n.params.result.blockhash));
            cancel.cancel();
        }),
    )
    .await
    .expect("session timed out");

    assert!(result.is_ok(), "{result:?}");
    assert_eq!(
        blocks,
        vec![("blockNotification".to_string(), 900, "abc".to_string())]
    );
}
