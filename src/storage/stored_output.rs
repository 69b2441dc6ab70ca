use serde::{Deserialize, Serialize};

use super::output_status::OutputStatus;
use crate::{
    data_structures::{Outpoint, PublicKey, WalletOutput},
    linkage::LockingScript,
};

/// How the wallet re-derives the private key for an output it owns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKey {
    /// Locked directly to the wallet's identity key
    Identity,
    /// Wallet payment child key
    Derived {
        counterparty: PublicKey,
        key_id: String,
    },
    /// Tracked in a basket but not spendable by this wallet's keys
    External,
}

/// A tracked output with everything needed to spend it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredOutput {
    pub outpoint: Outpoint,
    pub satoshis: u64,
    pub locking_script: LockingScript,
    pub basket: Option<String>,
    pub tags: Vec<String>,
    pub custom_instructions: Option<String>,
    pub key: OutputKey,

    // Status and spending tracking
    pub status: OutputStatus,
    pub reserved_by: Option<String>, // Action reference holding this output
    pub spent_in: Option<String>,    // Txid that consumed this output
}

impl StoredOutput {
    pub fn new(outpoint: Outpoint, satoshis: u64, locking_script: LockingScript, key: OutputKey) -> Self {
        Self {
            outpoint,
            satoshis,
            locking_script,
            basket: None,
            tags: Vec::new(),
            custom_instructions: None,
            key,
            status: OutputStatus::Spendable,
            reserved_by: None,
            spent_in: None,
        }
    }

    pub fn in_basket(mut self, basket: impl Into<String>) -> Self {
        self.basket = Some(basket.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_custom_instructions(mut self, instructions: Option<String>) -> Self {
        self.custom_instructions = instructions;
        self
    }

    /// Check if this output can be selected as an input
    pub fn is_spendable(&self) -> bool {
        self.status.is_spendable() && self.spent_in.is_none() && self.key != OutputKey::External
    }

    /// Project into the listing shape, including optional fields only on request
    pub fn to_wallet_output(
        &self,
        include_locking_script: bool,
        include_custom_instructions: bool,
        include_tags: bool,
    ) -> WalletOutput {
        WalletOutput {
            outpoint: self.outpoint.clone(),
            satoshis: self.satoshis,
            locking_script: include_locking_script.then(|| self.locking_script.to_hex()),
            spendable: self.status.is_spendable(),
            basket: self.basket.clone(),
            tags: if include_tags { self.tags.clone() } else { Vec::new() },
            custom_instructions: if include_custom_instructions {
                self.custom_instructions.clone()
            } else {
                None
            },
        }
    }
}
