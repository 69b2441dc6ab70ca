//! Primitive wallet types: keys, networks, outpoints and transaction bytes

use std::fmt;
use std::str::FromStr;

use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use rand::RngCore;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::errors::WalletError;

/// Chain a wallet endpoint is bound to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Main,
    Test,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Main => write!(f, "main"),
            Network::Test => write!(f, "test"),
        }
    }
}

impl FromStr for Network {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Ok(Network::Main),
            "test" | "testnet" => Ok(Network::Test),
            other => Err(WalletError::invalid_argument(
                "network",
                format!("expected 'main' or 'test', got '{other}'"),
            )),
        }
    }
}

/// Compressed public key (32 bytes, hex on the wire)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; 32]);

impl PublicKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, WalletError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            WalletError::InvalidPublicKey(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        if CompressedRistretto(bytes).decompress().is_none() {
            return Err(WalletError::InvalidPublicKey(
                "bytes do not encode a curve point".to_string(),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| WalletError::InvalidPublicKey(format!("'{s}' is not hex: {e}")))?;
        Self::from_bytes(&bytes)
    }

    pub fn from_point(point: &RistrettoPoint) -> Self {
        Self(point.compress().to_bytes())
    }

    pub fn point(&self) -> Result<RistrettoPoint, WalletError> {
        CompressedRistretto(self.0)
            .decompress()
            .ok_or_else(|| WalletError::InvalidPublicKey(self.to_hex()))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Shortened form for log lines
    pub fn short(&self) -> String {
        let hex = self.to_hex();
        format!("{}…{}", &hex[..8], &hex[hex.len() - 4..])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

impl FromStr for PublicKey {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        PublicKey::from_hex(&s).map_err(de::Error::custom)
    }
}

/// Wallet root private key. Cleared from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; 32]);

impl PrivateKey {
    pub fn random() -> Self {
        let mut wide = [0u8; 64];
        rand::thread_rng().fill_bytes(&mut wide);
        let scalar = Scalar::from_bytes_mod_order_wide(&wide);
        wide.zeroize();
        Self(scalar.to_bytes())
    }

    /// Parse a 64 character lowercase hex key
    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        let s = s.trim();
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)) {
            return Err(WalletError::invalid_argument(
                "private_key",
                "private key must be a 64-character lowercase hex string",
            ));
        }
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        let scalar: Option<Scalar> = Scalar::from_canonical_bytes(bytes).into();
        let scalar = scalar.ok_or_else(|| {
            WalletError::invalid_argument("private_key", "key is not a canonical scalar")
        })?;
        bytes.zeroize();
        Ok(Self(scalar.to_bytes()))
    }

    pub fn scalar(&self) -> Scalar {
        Scalar::from_bytes_mod_order(self.0)
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_point(&RistrettoPoint::mul_base(&self.scalar()))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey(<redacted>)")
    }
}

/// Transaction id plus output index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Outpoint {
    pub txid: String,
    pub index: u32,
}

impl Outpoint {
    pub fn new(txid: impl Into<String>, index: u32) -> Self {
        Self {
            txid: txid.into(),
            index,
        }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.txid, self.index)
    }
}

impl FromStr for Outpoint {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (txid, index) = s.rsplit_once('.').ok_or_else(|| {
            WalletError::invalid_argument("outpoint", format!("'{s}' is not txid.index"))
        })?;
        if txid.len() != 64 || hex::decode(txid).is_err() {
            return Err(WalletError::invalid_argument(
                "outpoint",
                format!("'{txid}' is not a 32 byte hex txid"),
            ));
        }
        let index = index.parse::<u32>().map_err(|e| {
            WalletError::invalid_argument("outpoint", format!("bad output index: {e}"))
        })?;
        Ok(Self::new(txid.to_ascii_lowercase(), index))
    }
}

impl Serialize for Outpoint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Outpoint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// Self-contained, verifiable transaction bytes. Opaque to this crate's
/// orchestration layers.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct AtomicBeef(Vec<u8>);

impl AtomicBeef {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, WalletError> {
        Ok(Self(hex::decode(s.trim())?))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AtomicBeef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomicBeef({} bytes)", self.0.len())
    }
}

impl Serialize for AtomicBeef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for AtomicBeef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        AtomicBeef::from_hex(&s).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_parsing() {
        assert_eq!("main".parse::<Network>().unwrap(), Network::Main);
        assert_eq!("testnet".parse::<Network>().unwrap(), Network::Test);
        assert!("regtest".parse::<Network>().is_err());
        assert_eq!(Network::Test.to_string(), "test");
    }

    #[test]
    fn test_private_key_hex_validation() {
        let key = PrivateKey::random();
        let parsed = PrivateKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(parsed.public_key(), key.public_key());

        assert!(PrivateKey::from_hex("abc").is_err());
        assert!(PrivateKey::from_hex(&"A".repeat(64)).is_err());
        // 0xff.. is not a canonical scalar
        assert!(PrivateKey::from_hex(&"f".repeat(64)).is_err());
    }

    #[test]
    fn test_public_key_rejects_garbage() {
        assert!(PublicKey::from_hex("not hex").is_err());
        assert!(PublicKey::from_hex("00ff").is_err());
        assert!(PublicKey::from_hex(&"ff".repeat(32)).is_err());

        let pk = PrivateKey::random().public_key();
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
        assert!(format!("{pk:?}").contains('…'));
    }

    #[test]
    fn test_outpoint_parsing() {
        let txid = "ab".repeat(32);
        let outpoint: Outpoint = format!("{txid}.3").parse().unwrap();
        assert_eq!(outpoint.index, 3);
        assert_eq!(outpoint.to_string(), format!("{txid}.3"));
        assert!("deadbeef.1".parse::<Outpoint>().is_err());
        assert!(format!("{txid}").parse::<Outpoint>().is_err());
    }

    #[test]
    fn test_atomic_beef_serializes_as_hex() {
        let beef = AtomicBeef::new(vec![1, 1, 1, 1, 0xde, 0xad]);
        let json = serde_json::to_string(&beef).unwrap();
        assert_eq!(json, "\"01010101dead\"");
        let back: AtomicBeef = serde_json::from_str(&json).unwrap();
        assert_eq!(back, beef);
    }
}
