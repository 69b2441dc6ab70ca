//! Payment remittance: what a payee needs to claim an output as its own
//!
//! The two internalization protocols are a tagged union. The JSON shape matches
//! the wire format wallets exchange:
//!
//! ```json
//! { "outputIndex": 0, "protocol": "wallet payment",
//!   "paymentRemittance": { "derivationPrefix": "..", "derivationSuffix": "..",
//!                          "senderIdentityKey": ".." } }
//! ```

use serde::{Deserialize, Serialize};

use super::types::PublicKey;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletPayment {
    pub derivation_prefix: String,
    pub derivation_suffix: String,
    pub sender_identity_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BasketInsertion {
    pub basket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "protocol")]
pub enum RemittanceProtocol {
    #[serde(rename = "wallet payment", rename_all = "camelCase")]
    WalletPayment { payment_remittance: WalletPayment },
    #[serde(rename = "basket insertion", rename_all = "camelCase")]
    BasketInsertion { insertion_remittance: BasketInsertion },
}

/// One claimed output of an internalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRemittance {
    pub output_index: u32,
    #[serde(flatten)]
    pub protocol: RemittanceProtocol,
}

impl PaymentRemittance {
    pub fn wallet_payment(
        output_index: u32,
        derivation_prefix: impl Into<String>,
        derivation_suffix: impl Into<String>,
        sender_identity_key: PublicKey,
    ) -> Self {
        Self {
            output_index,
            protocol: RemittanceProtocol::WalletPayment {
                payment_remittance: WalletPayment {
                    derivation_prefix: derivation_prefix.into(),
                    derivation_suffix: derivation_suffix.into(),
                    sender_identity_key,
                },
            },
        }
    }

    pub fn basket_insertion(output_index: u32, basket: impl Into<String>) -> Self {
        Self {
            output_index,
            protocol: RemittanceProtocol::BasketInsertion {
                insertion_remittance: BasketInsertion {
                    basket: basket.into(),
                    custom_instructions: None,
                    tags: Vec::new(),
                },
            },
        }
    }

    pub fn protocol_name(&self) -> &'static str {
        match self.protocol {
            RemittanceProtocol::WalletPayment { .. } => "wallet payment",
            RemittanceProtocol::BasketInsertion { .. } => "basket insertion",
        }
    }
}
