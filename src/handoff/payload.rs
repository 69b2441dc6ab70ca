//! What crosses from payer to payee, and what the payee gets back

use serde::{Deserialize, Serialize};

use super::stage::{HandoffDirection, HandoffStage};
use crate::{
    data_structures::{AtomicBeef, PaymentRemittance, PublicKey},
    errors::{HandoffError, HandoffResult},
};

/// Current payload format version
pub const PAYLOAD_VERSION: u32 = 1;

/// The only artifact exchanged between the two wallets. Delivery is out of
/// band and unauthenticated; the payee authenticates it by re-deriving the
/// claiming key when it internalizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HandoffPayload {
    pub version: u32,
    /// Transaction bytes, hex on the wire
    pub transaction_bytes: AtomicBeef,
    pub output_index: u32,
    pub derivation_prefix: String,
    pub derivation_suffix: String,
    pub sender_identity_key: PublicKey,
    pub amount: u64,
}

impl HandoffPayload {
    pub fn to_json(&self) -> HandoffResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> HandoffResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> HandoffResult<Self> {
        let payload: HandoffPayload = serde_json::from_str(json)?;
        if payload.version != PAYLOAD_VERSION {
            return Err(HandoffError::Serialization(format!(
                "unsupported payload version {}, expected {PAYLOAD_VERSION}",
                payload.version
            )));
        }
        if payload.transaction_bytes.is_empty() {
            return Err(HandoffError::Serialization(
                "payload carries no transaction bytes".to_string(),
            ));
        }
        Ok(payload)
    }

    /// Wallet payment remittance claiming the paid output. `sender` is the
    /// payer identity as reported by the payer's wallet.
    pub fn remittance(&self, sender: PublicKey) -> PaymentRemittance {
        PaymentRemittance::wallet_payment(
            self.output_index,
            self.derivation_prefix.clone(),
            self.derivation_suffix.clone(),
            sender,
        )
    }
}

/// Outcome of a handoff that reached the payee
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffReceipt {
    pub handoff_id: String,
    pub direction: HandoffDirection,
    pub stage: HandoffStage,
    pub txid: String,
    pub output_index: u32,
    pub amount: u64,
    pub sender_identity_key: PublicKey,
    pub payee_identity_key: PublicKey,
    /// The payee already held this output; nothing new was credited
    pub is_merge: bool,
}
