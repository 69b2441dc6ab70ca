//! Reproducible per-counterparty one-time keys
//!
//! A [`KeyLinkage`] maps `(derivationPrefix, derivationSuffix, counterparty)`
//! to a child public key and its locking script. The mapping is a pure function
//! of those inputs and the calling wallet's key material, which is what lets a
//! payee find a payment inside an arbitrary transaction. Salts are fresh per
//! handoff so two handoffs to the same counterparty are unlinkable on-chain.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::script::LockingScript;
use crate::{
    data_structures::PublicKey,
    errors::{HandoffError, HandoffResult},
    interface::{Counterparty, GetPublicKeyArgs, ProtocolId, WalletInterface},
};

/// Protocol name of the wallet payment derivation scheme
pub const WALLET_PAYMENT_PROTOCOL: &str = "3241645161d8";
/// Security level of the wallet payment derivation scheme
pub const WALLET_PAYMENT_SECURITY_LEVEL: u8 = 2;
/// Minimum salt entropy: 64 bits
pub const MIN_SALT_BYTES: usize = 8;
/// Maximum salt entropy. Two base64 salts of this size and the separator
/// fit the 800-byte key id limit (396 + 1 + 396).
pub const MAX_SALT_BYTES: usize = 297;
/// `type` tag written into the handoff record
pub const HANDOFF_RECORD_TYPE: &str = "BRC29";

pub fn wallet_payment_protocol() -> ProtocolId {
    ProtocolId::new(WALLET_PAYMENT_SECURITY_LEVEL, WALLET_PAYMENT_PROTOCOL)
}

/// Key id combining both salts, `"{prefix} {suffix}"`
pub fn key_id(derivation_prefix: &str, derivation_suffix: &str) -> String {
    format!("{derivation_prefix} {derivation_suffix}")
}

/// Fresh base64 salt with `entropy_bytes` of randomness
pub fn generate_salt(entropy_bytes: usize) -> HandoffResult<String> {
    if !(MIN_SALT_BYTES..=MAX_SALT_BYTES).contains(&entropy_bytes) {
        return Err(HandoffError::InvalidSpec(format!(
            "derivation salts need {MIN_SALT_BYTES}..={MAX_SALT_BYTES} bytes of entropy, got {entropy_bytes}"
        )));
    }
    let mut bytes = vec![0u8; entropy_bytes];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(STANDARD.encode(bytes))
}

fn validate_salt(name: &str, salt: &str) -> HandoffResult<()> {
    if salt.is_empty() || salt.contains(char::is_whitespace) {
        return Err(HandoffError::DerivationError(format!(
            "{name} must be non-empty base64 without whitespace"
        )));
    }
    STANDARD
        .decode(salt)
        .map_err(|e| HandoffError::DerivationError(format!("{name} is not base64: {e}")))?;
    Ok(())
}

/// A derived one-time key and the script locking value to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyLinkage {
    pub derivation_prefix: String,
    pub derivation_suffix: String,
    pub counterparty: PublicKey,
    pub derived_public_key: PublicKey,
    pub locking_script: LockingScript,
}

impl KeyLinkage {
    /// Audit record stored as the output's custom instructions
    pub fn handoff_record(&self) -> HandoffRecord {
        HandoffRecord {
            record_type: HANDOFF_RECORD_TYPE.to_string(),
            prefix: self.derivation_prefix.clone(),
            suffix: self.derivation_suffix.clone(),
            counterparty: self.counterparty,
        }
    }
}

/// Derivation data recorded on the payer's funding output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffRecord {
    #[serde(rename = "type")]
    pub record_type: String,
    pub prefix: String,
    pub suffix: String,
    pub counterparty: PublicKey,
}

impl HandoffRecord {
    pub fn to_custom_instructions(&self) -> HandoffResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_custom_instructions(instructions: &str) -> HandoffResult<Self> {
        let record: HandoffRecord = serde_json::from_str(instructions)?;
        if record.record_type != HANDOFF_RECORD_TYPE {
            return Err(HandoffError::Serialization(format!(
                "custom instructions carry a '{}' record, not a handoff record",
                record.record_type
            )));
        }
        Ok(record)
    }
}

/// Derives keys through a wallet endpoint. Holds no state beyond the endpoint
/// handle and is safe to share across concurrent handoffs.
#[derive(Clone)]
pub struct KeyLinkageDeriver {
    wallet: Arc<dyn WalletInterface>,
}

impl KeyLinkageDeriver {
    pub fn new(wallet: Arc<dyn WalletInterface>) -> Self {
        Self { wallet }
    }

    /// Derive from a hex counterparty key. `for_self` selects the key the
    /// calling wallet can later spend; otherwise the counterparty's key.
    pub async fn derive(
        &self,
        derivation_prefix: &str,
        derivation_suffix: &str,
        counterparty: &str,
        for_self: bool,
    ) -> HandoffResult<KeyLinkage> {
        let counterparty = PublicKey::from_hex(counterparty).map_err(|e| {
            HandoffError::DerivationError(format!("counterparty is not a valid public key: {e}"))
        })?;
        self.derive_for(derivation_prefix, derivation_suffix, &counterparty, for_self)
            .await
    }

    pub async fn derive_for(
        &self,
        derivation_prefix: &str,
        derivation_suffix: &str,
        counterparty: &PublicKey,
        for_self: bool,
    ) -> HandoffResult<KeyLinkage> {
        validate_salt("derivationPrefix", derivation_prefix)?;
        validate_salt("derivationSuffix", derivation_suffix)?;

        let result = self
            .wallet
            .get_public_key(GetPublicKeyArgs {
                identity_key: false,
                protocol_id: Some(wallet_payment_protocol()),
                key_id: Some(key_id(derivation_prefix, derivation_suffix)),
                counterparty: Some(Counterparty::Key(*counterparty)),
                for_self,
            })
            .await?;

        debug!(
            counterparty = %counterparty.short(),
            for_self,
            "derived wallet payment key"
        );

        Ok(KeyLinkage {
            derivation_prefix: derivation_prefix.to_string(),
            derivation_suffix: derivation_suffix.to_string(),
            counterparty: *counterparty,
            locking_script: LockingScript::pay_to_public_key_hash(&result.public_key),
            derived_public_key: result.public_key,
        })
    }

    /// Rebuild a linkage from the record stored alongside the output it produced
    pub async fn rederive(&self, record: &HandoffRecord, for_self: bool) -> HandoffResult<KeyLinkage> {
        self.derive_for(&record.prefix, &record.suffix, &record.counterparty, for_self)
            .await
    }
}
