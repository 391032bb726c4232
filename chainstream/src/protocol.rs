//! ChainStream JSON-RPC wire types, subscribe parameters, and JSON encode/decode.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

pub const JSONRPC_VERSION: &str = "2.0";

// ---------------------------------------------------------------------------
// Method names and well-known values
// ---------------------------------------------------------------------------

pub mod method {
    pub const TRANSACTIONS_SUBSCRIBE: &str = "chainstream.transactionsSubscribe";
    pub const BLOCKS_SUBSCRIBE: &str = "chainstream.blocksSubscribe";
    pub const SLOTS_SUBSCRIBE: &str = "chainstream.slotsSubscribe";
    pub const TRANSACTION_NOTIFICATION: &str = "transactionNotification";
}

pub mod network {
    pub const SOLANA_MAINNET: &str = "solana-mainnet";
}

// ---------------------------------------------------------------------------
// JSON-RPC envelopes
// ---------------------------------------------------------------------------

/// A JSON-RPC request. Used as the subscribe request of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    pub params: serde_json::Value,
}

impl JsonRpcRequest {
    /// Build a request, serializing `params` into its JSON form.
    pub fn new(id: u64, method: impl Into<String>, params: impl Serialize) -> Result<Self, Error> {
        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params: serde_json::to_value(params)?,
        })
    }

    pub fn transactions_subscribe(
        id: u64,
        params: &TransactionSubscribeParams,
    ) -> Result<Self, Error> {
        Self::new(id, method::TRANSACTIONS_SUBSCRIBE, params)
    }

    pub fn blocks_subscribe(id: u64, params: &BlockSubscribeParams) -> Result<Self, Error> {
        Self::new(id, method::BLOCKS_SUBSCRIBE, params)
    }

    pub fn slots_subscribe(id: u64, params: &SlotSubscribeParams) -> Result<Self, Error> {
        Self::new(id, method::SLOTS_SUBSCRIBE, params)
    }
}

/// A JSON-RPC response. The reply to a subscribe request carries the
/// subscription id in `result`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<u64>,
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl JsonRpcResponse {
    /// The subscription id, if `result` is a non-zero unsigned integer.
    pub fn subscription_id(&self) -> Option<u64> {
        self.result
            .as_ref()
            .and_then(serde_json::Value::as_u64)
            .filter(|id| *id != 0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Treat an explicit `null` like an absent field.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// An unsolicited notification pushed under an active subscription.
///
/// Decoding is lenient: any JSON object is accepted and missing members take
/// their zero value, so a stray response frame decodes to a notification
/// with an empty `method` and default `params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct Notification<T> {
    #[serde(deserialize_with = "nullable")]
    pub jsonrpc: String,
    #[serde(deserialize_with = "nullable")]
    pub method: String,
    #[serde(deserialize_with = "nullable")]
    pub params: NotificationParams<T>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, bound(deserialize = "T: Deserialize<'de> + Default"))]
pub struct NotificationParams<T> {
    #[serde(deserialize_with = "nullable")]
    pub subscription: u64,
    #[serde(deserialize_with = "nullable")]
    pub result: T,
}

// ---------------------------------------------------------------------------
// Subscribe parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    #[default]
    Confirmed,
    Finalized,
}

/// Account-key rules for a transaction subscription. Empty lists are omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccountKeysFilter {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub all: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub one_of: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionFilter {
    pub exclude_votes: bool,
    pub commitment: Commitment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_keys: Option<AccountKeysFilter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSubscribeParams {
    pub network: String,
    pub verified: bool,
    pub filter: TransactionFilter,
}

impl Default for TransactionSubscribeParams {
    fn default() -> Self {
        Self {
            network: network::SOLANA_MAINNET.to_string(),
            verified: false,
            filter: TransactionFilter::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSubscribeParams {
    pub network: String,
    pub verified: bool,
}

impl Default for BlockSubscribeParams {
    fn default() -> Self {
        Self {
            network: network::SOLANA_MAINNET.to_string(),
            verified: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSubscribeParams {
    pub network: String,
    pub verified: bool,
}

impl Default for SlotSubscribeParams {
    fn default() -> Self {
        Self {
            network: network::SOLANA_MAINNET.to_string(),
            verified: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Encode / decode helpers
// ---------------------------------------------------------------------------

pub fn encode_request(request: &JsonRpcRequest) -> Result<String, Error> {
    Ok(serde_json::to_string(request)?)
}

pub fn decode_response(text: &str) -> Result<JsonRpcResponse, Error> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_notification<T>(text: &str) -> Result<Notification<T>, Error>
where
    T: DeserializeOwned + Default,
{
    Ok(serde_json::from_str(text)?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
