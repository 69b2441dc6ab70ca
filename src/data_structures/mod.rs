//! Data structures shared by the wallet interface and the orchestration layers

pub mod action;
pub mod certificate;
pub mod remittance;
pub mod types;
pub mod wallet_output;

pub use action::{Action, ActionInput, ActionOutput, ActionStatus};
pub use certificate::{Certificate, IdentityCertificate};
pub use remittance::{BasketInsertion, PaymentRemittance, RemittanceProtocol, WalletPayment};
pub use types::{AtomicBeef, Network, Outpoint, PrivateKey, PublicKey};
pub use wallet_output::{WalletOutput, DEFAULT_BASKET};
