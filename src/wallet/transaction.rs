//! Transaction bytes produced and consumed by [`super::MemoryWallet`]
//!
//! Layout: `01 01 01 01 || txid (32 bytes) || json body`. The embedded txid
//! commits to the body, so a payee can check the bytes are self-consistent
//! before claiming anything from them.

use serde::{Deserialize, Serialize};

use crate::{
    crypto::hashing::domain_hash,
    data_structures::{AtomicBeef, Outpoint},
    errors::{WalletError, WalletResult},
    linkage::LockingScript,
};

pub const BEEF_PREFIX: [u8; 4] = [0x01, 0x01, 0x01, 0x01];
const TXID_LEN: usize = 32;
const TXID_DOMAIN: &str = "wallet_handoff.txid.v1";
const SIGHASH_DOMAIN: &str = "wallet_handoff.sighash.v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInput {
    pub source_outpoint: Outpoint,
    pub source_satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocking_script: Option<String>,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub satoshis: u64,
    pub locking_script: LockingScript,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryTransaction {
    pub version: u32,
    pub lock_time: u32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

impl MemoryTransaction {
    pub fn new(version: u32, lock_time: u32) -> Self {
        Self {
            version,
            lock_time,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    fn txid_bytes(&self) -> WalletResult<[u8; TXID_LEN]> {
        let body = serde_json::to_vec(self)?;
        Ok(domain_hash(TXID_DOMAIN, &[&body]))
    }

    pub fn txid(&self) -> WalletResult<String> {
        Ok(hex::encode(self.txid_bytes()?))
    }

    /// Digest every input signs: the transaction with unlocking scripts removed
    pub fn signature_digest(&self) -> WalletResult<[u8; 32]> {
        let mut stripped = self.clone();
        for input in &mut stripped.inputs {
            input.unlocking_script = None;
        }
        let body = serde_json::to_vec(&stripped)?;
        Ok(domain_hash(SIGHASH_DOMAIN, &[&body]))
    }

    pub fn is_fully_unlocked(&self) -> bool {
        self.inputs.iter().all(|i| i.unlocking_script.is_some())
    }

    pub fn total_input_satoshis(&self) -> u64 {
        self.inputs.iter().map(|i| i.source_satoshis).sum()
    }

    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }

    pub fn to_beef(&self) -> WalletResult<AtomicBeef> {
        let body = serde_json::to_vec(self)?;
        let mut bytes = Vec::with_capacity(BEEF_PREFIX.len() + TXID_LEN + body.len());
        bytes.extend_from_slice(&BEEF_PREFIX);
        bytes.extend_from_slice(&domain_hash(TXID_DOMAIN, &[&body]));
        bytes.extend_from_slice(&body);
        Ok(AtomicBeef::new(bytes))
    }

    pub fn from_beef(beef: &AtomicBeef) -> WalletResult<Self> {
        let bytes = beef.as_bytes();
        if bytes.len() <= BEEF_PREFIX.len() + TXID_LEN || bytes[..BEEF_PREFIX.len()] != BEEF_PREFIX {
            return Err(WalletError::invalid_argument(
                "tx",
                "not an atomic transaction envelope",
            ));
        }
        let (txid, body) = bytes[BEEF_PREFIX.len()..].split_at(TXID_LEN);
        let tx: MemoryTransaction = serde_json::from_slice(body)
            .map_err(|e| WalletError::invalid_argument("tx", format!("malformed body: {e}")))?;
        if tx.txid_bytes()?[..] != *txid {
            return Err(WalletError::invalid_argument(
                "tx",
                "embedded txid does not commit to the transaction body",
            ));
        }
        Ok(tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::PrivateKey;

    fn sample() -> MemoryTransaction {
        let mut tx = MemoryTransaction::new(1, 0);
        tx.inputs.push(TxInput {
            source_outpoint: Outpoint::new("ab".repeat(32), 1),
            source_satoshis: 1500,
            unlocking_script: None,
            sequence_number: u32::MAX,
        });
        tx.outputs.push(TxOutput {
            satoshis: 1000,
            locking_script: LockingScript::pay_to_public_key_hash(
                &PrivateKey::random().public_key(),
            ),
        });
        tx
    }

    #[test]
    fn test_envelope_carries_txid() {
        let tx = sample();
        let beef = tx.to_beef().unwrap();
        assert_eq!(&beef.as_bytes()[..4], &BEEF_PREFIX);
        assert_eq!(hex::encode(&beef.as_bytes()[4..36]), tx.txid().unwrap());
        assert_eq!(MemoryTransaction::from_beef(&beef).unwrap(), tx);
    }

    #[test]
    fn test_tampered_envelope_rejected() {
        let mut bytes = sample().to_beef().unwrap().into_bytes();
        let last = bytes.len() - 2;
        bytes[last] ^= 0x01;
        assert!(MemoryTransaction::from_beef(&AtomicBeef::new(bytes)).is_err());
        assert!(MemoryTransaction::from_beef(&AtomicBeef::new(vec![1, 1, 1, 1])).is_err());
    }

    #[test]
    fn test_signature_digest_ignores_unlocking_scripts() {
        let mut tx = sample();
        let before = tx.signature_digest().unwrap();
        let txid_before = tx.txid().unwrap();
        tx.inputs[0].unlocking_script = Some("00".to_string());
        assert_eq!(tx.signature_digest().unwrap(), before);
        assert_ne!(tx.txid().unwrap(), txid_before);
        assert!(tx.is_fully_unlocked());
    }
}
