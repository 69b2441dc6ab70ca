//! Structured arguments and results for every Wallet Interface operation
//!
//! Argument structs reject unknown fields when deserialized, so a caller
//! forwarding a loosely-typed JSON bag gets an error instead of silent
//! pass-through.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data_structures::{
    Action, AtomicBeef, Certificate, IdentityCertificate, Network, Outpoint, PaymentRemittance,
    PublicKey, WalletOutput,
};

/// Upper bound for `limit` on every paginated listing
pub const MAX_PAGE_LIMIT: u32 = 10_000;
/// `limit` used when a listing does not specify one
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

fn default_true() -> bool {
    true
}

// === Actions ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActionInput {
    pub outpoint: Outpoint,
    /// Unlocking script, hex. When absent the wallet must either unlock the
    /// input itself or hand back a signable transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocking_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocking_script_length: Option<u32>,
    pub input_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

impl CreateActionInput {
    /// Input whose unlocking data will be supplied later through `signAction`
    pub fn deferred(outpoint: Outpoint, unlocking_script_length: u32, description: &str) -> Self {
        Self {
            outpoint,
            unlocking_script: None,
            unlocking_script_length: Some(unlocking_script_length),
            input_description: description.to_string(),
            sequence_number: None,
        }
    }

    pub fn needs_cooperative_signing(&self) -> bool {
        self.unlocking_script.is_none() && self.unlocking_script_length.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActionOutput {
    pub locking_script: String,
    pub satoshis: u64,
    pub output_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl CreateActionOutput {
    pub fn new(locking_script: impl Into<String>, satoshis: u64, description: &str) -> Self {
        Self {
            locking_script: locking_script.into(),
            satoshis,
            output_description: description.to_string(),
            basket: None,
            custom_instructions: None,
            tags: Vec::new(),
        }
    }

    pub fn with_custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn with_basket(mut self, basket: impl Into<String>) -> Self {
        self.basket = Some(basket.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActionOptions {
    #[serde(default = "default_true")]
    pub sign_and_process: bool,
    #[serde(default = "default_true")]
    pub accept_delayed_broadcast: bool,
    #[serde(default, rename = "returnTXIDOnly")]
    pub return_txid_only: bool,
    #[serde(default)]
    pub no_send: bool,
    #[serde(default = "default_true")]
    pub randomize_outputs: bool,
    #[serde(default)]
    pub known_txids: Vec<String>,
}

impl Default for CreateActionOptions {
    fn default() -> Self {
        Self {
            sign_and_process: true,
            accept_delayed_broadcast: true,
            return_txid_only: false,
            no_send: false,
            randomize_outputs: true,
            known_txids: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateActionArgs {
    pub description: String,
    #[serde(default, rename = "inputBEEF", skip_serializing_if = "Option::is_none")]
    pub input_beef: Option<AtomicBeef>,
    #[serde(default)]
    pub inputs: Vec<CreateActionInput>,
    #[serde(default)]
    pub outputs: Vec<CreateActionOutput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_time: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub options: CreateActionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignableTransaction {
    pub reference: String,
    pub tx: AtomicBeef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<AtomicBeef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signable_transaction: Option<SignableTransaction>,
    #[serde(default)]
    pub no_send_change: Vec<Outpoint>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignActionSpend {
    pub unlocking_script: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_number: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SignActionArgs {
    pub reference: String,
    /// Unlocking data keyed by input index
    #[serde(default)]
    pub spends: BTreeMap<u32, SignActionSpend>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignActionResult {
    pub txid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<AtomicBeef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AbortActionArgs {
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbortActionResult {
    pub aborted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    #[default]
    Any,
    All,
}

impl QueryMode {
    /// Apply the mode to a set of wanted values against what an item carries
    pub fn matches(&self, wanted: &[String], present: &[String]) -> bool {
        if wanted.is_empty() {
            return true;
        }
        match self {
            QueryMode::Any => wanted.iter().any(|w| present.contains(w)),
            QueryMode::All => wanted.iter().all(|w| present.contains(w)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListActionsArgs {
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub label_query_mode: QueryMode,
    #[serde(default)]
    pub include_labels: bool,
    #[serde(default)]
    pub include_inputs: bool,
    #[serde(default)]
    pub include_outputs: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListActionsResult {
    pub total_actions: u32,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InternalizeActionArgs {
    pub tx: AtomicBeef,
    pub outputs: Vec<PaymentRemittance>,
    pub description: String,
    #[serde(default)]
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InternalizeActionResult {
    pub accepted: bool,
    /// The transaction's outputs were already known; nothing new was credited
    pub is_merge: bool,
    pub txid: String,
}

// === Outputs ===

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListOutputsArgs {
    pub basket: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub tag_query_mode: QueryMode,
    #[serde(default)]
    pub include_locking_scripts: bool,
    #[serde(default)]
    pub include_custom_instructions: bool,
    #[serde(default)]
    pub include_tags: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

impl ListOutputsArgs {
    pub fn basket(basket: impl Into<String>) -> Self {
        Self {
            basket: basket.into(),
            tags: Vec::new(),
            tag_query_mode: QueryMode::Any,
            include_locking_scripts: false,
            include_custom_instructions: false,
            include_tags: false,
            limit: None,
            offset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOutputsResult {
    pub total_outputs: u32,
    pub outputs: Vec<WalletOutput>,
}

impl ListOutputsResult {
    pub fn spendable_satoshis(&self) -> u64 {
        self.outputs
            .iter()
            .filter(|o| o.spendable)
            .map(|o| o.satoshis)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelinquishOutputArgs {
    pub basket: String,
    pub output: Outpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishOutputResult {
    pub relinquished: bool,
}

// === Keys & linkage ===

/// `[securityLevel, protocolName]`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProtocolId(pub u8, pub String);

impl ProtocolId {
    pub fn new(security_level: u8, protocol: impl Into<String>) -> Self {
        Self(security_level, protocol.into())
    }

    pub fn security_level(&self) -> u8 {
        self.0
    }

    pub fn name(&self) -> &str {
        &self.1
    }
}

/// Counterparty of a key derivation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Counterparty {
    Key(PublicKey),
    Other(SpecialCounterparty),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialCounterparty {
    #[serde(rename = "self")]
    Myself,
    Anyone,
}

impl Counterparty {
    pub fn myself() -> Self {
        Counterparty::Other(SpecialCounterparty::Myself)
    }

    pub fn anyone() -> Self {
        Counterparty::Other(SpecialCounterparty::Anyone)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GetPublicKeyArgs {
    #[serde(default)]
    pub identity_key: bool,
    #[serde(default, rename = "protocolID", skip_serializing_if = "Option::is_none")]
    pub protocol_id: Option<ProtocolId>,
    #[serde(default, rename = "keyID", skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<Counterparty>,
    #[serde(default)]
    pub for_self: bool,
}

impl GetPublicKeyArgs {
    pub fn identity() -> Self {
        Self {
            identity_key: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetPublicKeyResult {
    pub public_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RevealCounterpartyKeyLinkageArgs {
    pub counterparty: PublicKey,
    pub verifier: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealCounterpartyKeyLinkageResult {
    pub prover: PublicKey,
    pub verifier: PublicKey,
    pub counterparty: PublicKey,
    pub revelation_time: String,
    pub encrypted_linkage: Vec<u8>,
    pub encrypted_linkage_proof: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RevealSpecificKeyLinkageArgs {
    pub counterparty: PublicKey,
    pub verifier: PublicKey,
    #[serde(rename = "protocolID")]
    pub protocol_id: ProtocolId,
    #[serde(rename = "keyID")]
    pub key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealSpecificKeyLinkageResult {
    pub prover: PublicKey,
    pub verifier: PublicKey,
    pub counterparty: PublicKey,
    #[serde(rename = "protocolID")]
    pub protocol_id: ProtocolId,
    #[serde(rename = "keyID")]
    pub key_id: String,
    pub encrypted_linkage: Vec<u8>,
    pub encrypted_linkage_proof: Vec<u8>,
    pub proof_type: u8,
}

// === Certificates & discovery ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcquisitionProtocol {
    Direct,
    Issuance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AcquireCertificateArgs {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub certifier: PublicKey,
    pub acquisition_protocol: AcquisitionProtocol,
    pub fields: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revocation_outpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certifier_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ListCertificatesArgs {
    #[serde(default)]
    pub certifiers: Vec<PublicKey>,
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCertificatesResult {
    pub total_certificates: u32,
    pub certificates: Vec<Certificate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProveCertificateArgs {
    pub certificate: Certificate,
    pub fields_to_reveal: Vec<String>,
    pub verifier: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProveCertificateResult {
    /// Field name to base64 ciphertext readable only by the verifier
    pub keyring_for_verifier: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RelinquishCertificateArgs {
    #[serde(rename = "type")]
    pub certificate_type: String,
    pub serial_number: String,
    pub certifier: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelinquishCertificateResult {
    pub relinquished: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoverByIdentityKeyArgs {
    pub identity_key: PublicKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiscoverByAttributesArgs {
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverCertificatesResult {
    pub total_certificates: u32,
    pub certificates: Vec<IdentityCertificate>,
}

// === Wallet info ===

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetNetworkResult {
    pub network: Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetHeightResult {
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetVersionResult {
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedResult {
    pub authenticated: bool,
}

/// Resolve `limit`/`offset` against the shared bounds
pub fn page_bounds(limit: Option<u32>, offset: Option<u32>) -> (usize, usize) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
    (limit as usize, offset.unwrap_or(0) as usize)
}
