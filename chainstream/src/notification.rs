//! Transaction notification payload and derived accessors.
//!
//! Every field is optional on the wire: absent and `null` fields decode to
//! their zero value so a sparse notification never fails to parse.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::{Notification, nullable};

/// A `transactionNotification` message.
pub type TransactionNotification = Notification<TransactionNotificationData>;

// ---------------------------------------------------------------------------
// Payload schema
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionNotificationData {
    #[serde(deserialize_with = "nullable")]
    pub context: ContextMetadata,
    #[serde(deserialize_with = "nullable")]
    pub value: TransactionValue,
}

/// Where and when the node observed the transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContextMetadata {
    #[serde(deserialize_with = "nullable")]
    pub slot: u64,
    #[serde(deserialize_with = "nullable")]
    pub slot_status: String,
    pub node_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "nullable")]
    pub is_vote: bool,
    #[serde(deserialize_with = "nullable")]
    pub signature: String,
    #[serde(deserialize_with = "nullable")]
    pub index: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionValue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_time: Option<i64>,
    #[serde(deserialize_with = "nullable")]
    pub slot: u64,
    #[serde(deserialize_with = "nullable")]
    pub transaction: EncodedTransaction,
    #[serde(deserialize_with = "nullable")]
    pub meta: TransactionMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EncodedTransaction {
    #[serde(deserialize_with = "nullable")]
    pub message: TransactionMessage,
    #[serde(deserialize_with = "nullable")]
    pub message_hash: String,
    #[serde(deserialize_with = "nullable")]
    pub signatures: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionMessage {
    /// Static account keys; the first one is the fee payer.
    #[serde(deserialize_with = "nullable")]
    pub account_keys: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub address_table_lookups: Vec<AddressTableLookup>,
    #[serde(deserialize_with = "nullable")]
    pub header: MessageHeader,
    #[serde(deserialize_with = "nullable")]
    pub instructions: Vec<CompiledInstruction>,
    #[serde(deserialize_with = "nullable")]
    pub recent_blockhash: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageHeader {
    #[serde(rename = "numReadonlySignedAccounts", deserialize_with = "nullable")]
    pub num_readonly_signed: u8,
    #[serde(rename = "numReadonlyUnsignedAccounts", deserialize_with = "nullable")]
    pub num_readonly_unsigned: u8,
    #[serde(rename = "numRequiredSignatures", deserialize_with = "nullable")]
    pub num_signatures: u8,
}

/// Resolves extra accounts from an on-chain address lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AddressTableLookup {
    #[serde(deserialize_with = "nullable")]
    pub account_key: String,
    #[serde(deserialize_with = "nullable")]
    pub writable_indexes: Vec<u8>,
    #[serde(deserialize_with = "nullable")]
    pub readonly_indexes: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompiledInstruction {
    #[serde(deserialize_with = "nullable")]
    pub program_id_index: u8,
    #[serde(deserialize_with = "nullable")]
    pub accounts: Vec<u8>,
    /// Base58-encoded instruction data.
    #[serde(deserialize_with = "nullable")]
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_height: Option<u32>,
}

impl CompiledInstruction {
    /// Decoded instruction bytes, or `None` if `data` is not valid base58.
    pub fn data_bytes(&self) -> Option<Vec<u8>> {
        bs58::decode(&self.data).into_vec().ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransactionMeta {
    /// `None` when the transaction succeeded.
    pub err: Option<serde_json::Value>,
    #[serde(deserialize_with = "nullable")]
    pub fee: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compute_units_consumed: Option<u64>,
    #[serde(deserialize_with = "nullable")]
    pub inner_instructions: Vec<InnerInstruction>,
    #[serde(deserialize_with = "nullable")]
    pub loaded_addresses: LoadedAddresses,
    #[serde(deserialize_with = "nullable")]
    pub log_messages: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub post_balances: Vec<u64>,
    #[serde(deserialize_with = "nullable")]
    pub post_token_balances: Vec<TokenBalance>,
    #[serde(deserialize_with = "nullable")]
    pub pre_balances: Vec<u64>,
    #[serde(deserialize_with = "nullable")]
    pub pre_token_balances: Vec<TokenBalance>,
    #[serde(deserialize_with = "nullable", skip_serializing_if = "Vec::is_empty")]
    pub rewards: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InnerInstruction {
    #[serde(deserialize_with = "nullable")]
    pub index: u8,
    #[serde(deserialize_with = "nullable")]
    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadedAddresses {
    #[serde(deserialize_with = "nullable")]
    pub writable: Vec<String>,
    #[serde(deserialize_with = "nullable")]
    pub readonly: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenBalance {
    #[serde(deserialize_with = "nullable")]
    pub account_index: u8,
    #[serde(deserialize_with = "nullable")]
    pub mint: String,
    #[serde(deserialize_with = "nullable")]
    pub owner: String,
    #[serde(deserialize_with = "nullable")]
    pub program_id: String,
    #[serde(rename = "uiTokenAmount", deserialize_with = "nullable")]
    pub ui_amount: TokenAmountUi,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TokenAmountUi {
    #[serde(deserialize_with = "nullable")]
    pub amount: String,
    #[serde(deserialize_with = "nullable")]
    pub decimals: u8,
    /// `null` on the wire for zero balances.
    pub ui_amount: Option<f64>,
    #[serde(deserialize_with = "nullable")]
    pub ui_amount_string: String,
}

// ---------------------------------------------------------------------------
// Instruction classification
// ---------------------------------------------------------------------------

/// pump.fun bonding-curve program action carried by a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionType {
    Buy,
    Sell,
    Create,
    Unknown,
}

pub mod discriminator {
    //! Anchor discriminators (`sha256("global:<name>")[..8]`).

    pub const BUY: [u8; 8] = [102, 6, 61, 18, 1, 218, 235, 234];
    pub const SELL: [u8; 8] = [51, 230, 133, 164, 1, 127, 131, 173];
    pub const CREATE: [u8; 8] = [24, 30, 200, 40, 5, 28, 7, 119];
}

const LOG_INSTRUCTION_PREFIX: &str = "Program log: Instruction: ";

impl InstructionType {
    /// Classify instruction bytes by their 8-byte discriminator prefix.
    pub fn from_data(data: &[u8]) -> Self {
        match data.get(..8) {
            Some(d) if d == discriminator::BUY => Self::Buy,
            Some(d) if d == discriminator::SELL => Self::Sell,
            Some(d) if d == discriminator::CREATE => Self::Create,
            _ => Self::Unknown,
        }
    }

    fn from_log(line: &str) -> Self {
        match line.strip_prefix(LOG_INSTRUCTION_PREFIX) {
            Some("Buy") => Self::Buy,
            Some("Sell") => Self::Sell,
            Some("Create") => Self::Create,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Buy => "Buy",
            Self::Sell => "Sell",
            Self::Create => "Create",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for InstructionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Notification<TransactionNotificationData> {
    /// Slot in which the transaction was processed.
    pub fn slot(&self) -> u64 {
        self.params.result.value.slot
    }

    pub fn signature(&self) -> &str {
        &self.params.result.context.signature
    }

    /// First account key of the message (the fee payer), or `""` if none.
    pub fn owner(&self) -> &str {
        self.message()
            .account_keys
            .first()
            .map_or("", String::as_str)
    }

    pub fn block_time(&self) -> Option<DateTime<Utc>> {
        self.params
            .result
            .value
            .block_time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Classify the transaction's primary instruction.
    ///
    /// Looks at the discriminator of the first top-level instruction, then
    /// falls back to the first `Program log: Instruction:` line naming a
    /// known action.
    pub fn instruction_type(&self) -> InstructionType {
        let from_data = self
            .message()
            .instructions
            .first()
            .and_then(CompiledInstruction::data_bytes)
            .map_or(InstructionType::Unknown, |data| {
                InstructionType::from_data(&data)
            });
        if from_data != InstructionType::Unknown {
            return from_data;
        }
        self.params
            .result
            .value
            .meta
            .log_messages
            .iter()
            .map(|line| InstructionType::from_log(line))
            .find(|kind| *kind != InstructionType::Unknown)
            .unwrap_or(InstructionType::Unknown)
    }

    fn message(&self) -> &TransactionMessage {
        &self.params.result.value.transaction.message
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
