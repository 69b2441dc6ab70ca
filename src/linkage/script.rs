//! Pay-to-public-key-hash script templates
//!
//! Locking: `OP_DUP OP_HASH160 <20 byte hash> OP_EQUALVERIFY OP_CHECKSIG`.
//! Unlocking: `<64 byte signature> <32 byte public key>`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    crypto::hashing::hash160,
    data_structures::PublicKey,
    errors::{WalletError, WalletResult},
};

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;
const PUSH_32: u8 = 0x20;
const PUSH_64: u8 = 0x40;
const P2PKH_LEN: usize = 25;

/// Spending condition attached to an output, hex on the wire
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LockingScript(Vec<u8>);

impl LockingScript {
    pub fn pay_to_public_key_hash(public_key: &PublicKey) -> Self {
        let mut script = Vec::with_capacity(P2PKH_LEN);
        script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
        script.extend_from_slice(&hash160(public_key.as_bytes()));
        script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
        Self(script)
    }

    pub fn from_hex(s: &str) -> WalletResult<Self> {
        let bytes = hex::decode(s.trim())?;
        if bytes.is_empty() {
            return Err(WalletError::invalid_argument(
                "lockingScript",
                "script is empty",
            ));
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Hash committed to by a pay-to-public-key-hash script
    pub fn public_key_hash(&self) -> Option<[u8; 20]> {
        let s = &self.0;
        if s.len() == P2PKH_LEN
            && s[0] == OP_DUP
            && s[1] == OP_HASH160
            && s[2] == PUSH_20
            && s[23] == OP_EQUALVERIFY
            && s[24] == OP_CHECKSIG
        {
            let mut hash = [0u8; 20];
            hash.copy_from_slice(&s[3..23]);
            Some(hash)
        } else {
            None
        }
    }

    pub fn is_locked_to(&self, public_key: &PublicKey) -> bool {
        self.public_key_hash() == Some(hash160(public_key.as_bytes()))
    }
}

impl fmt::Display for LockingScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for LockingScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LockingScript({})", self.to_hex())
    }
}

impl TryFrom<String> for LockingScript {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<LockingScript> for String {
    fn from(script: LockingScript) -> Self {
        script.to_hex()
    }
}

/// Parsed `<signature> <public key>` unlocking script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnlockingScript {
    pub signature: [u8; 64],
    pub public_key: PublicKey,
}

impl UnlockingScript {
    pub fn new(signature: [u8; 64], public_key: PublicKey) -> Self {
        Self {
            signature,
            public_key,
        }
    }

    pub fn to_hex(&self) -> String {
        let mut script = Vec::with_capacity(98);
        script.push(PUSH_64);
        script.extend_from_slice(&self.signature);
        script.push(PUSH_32);
        script.extend_from_slice(self.public_key.as_bytes());
        hex::encode(script)
    }

    pub fn from_hex(s: &str) -> WalletResult<Self> {
        let bytes = hex::decode(s.trim())?;
        if bytes.len() != 98 || bytes[0] != PUSH_64 || bytes[65] != PUSH_32 {
            return Err(WalletError::invalid_argument(
                "unlockingScript",
                "not a <signature> <public key> script",
            ));
        }
        let mut signature = [0u8; 64];
        signature.copy_from_slice(&bytes[1..65]);
        let public_key = PublicKey::from_bytes(&bytes[66..98])?;
        Ok(Self::new(signature, public_key))
    }
}
