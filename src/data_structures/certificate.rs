//! Identity certificates as exchanged through the Wallet Interface

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::PublicKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    /// Certificate type identifier (base64)
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub serial_number: String,
    pub subject: PublicKey,
    pub certifier: PublicKey,
    #[serde(default)]
    pub revocation_outpoint: Option<String>,
    pub fields: BTreeMap<String, String>,
    pub signature: String,
}

impl Certificate {
    /// True when every `(name, value)` pair is present in the certificate fields
    pub fn matches_attributes(&self, attributes: &BTreeMap<String, String>) -> bool {
        attributes
            .iter()
            .all(|(name, value)| self.fields.get(name) == Some(value))
    }
}

/// Where a certificate came from when returned by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityCertificate {
    #[serde(flatten)]
    pub certificate: Certificate,
    pub certifier_name: Option<String>,
    pub publicly_revealed_keyring: BTreeMap<String, String>,
    pub decrypted_fields: BTreeMap<String, String>,
}
