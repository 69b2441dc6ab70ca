//! Key linkage derivation and the scripts derived keys are locked with

pub mod deriver;
pub mod script;

pub use deriver::{
    generate_salt, key_id, wallet_payment_protocol, HandoffRecord, KeyLinkage, KeyLinkageDeriver,
    HANDOFF_RECORD_TYPE, MAX_SALT_BYTES, MIN_SALT_BYTES, WALLET_PAYMENT_PROTOCOL, WALLET_PAYMENT_SECURITY_LEVEL,
};
pub use script::{LockingScript, UnlockingScript};
