//! Outputs tracked by a wallet

use serde::{Deserialize, Serialize};

use super::types::Outpoint;

/// Basket that receives wallet payments and change
pub const DEFAULT_BASKET: &str = "default";

/// A spendable or spent transaction output as reported by `listOutputs`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletOutput {
    pub outpoint: Outpoint,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locking_script: Option<String>,
    pub spendable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Owner-defined metadata, e.g. the derivation record of a handoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

impl WalletOutput {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
