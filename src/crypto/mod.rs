//! Cryptographic primitives backing the in-memory wallet
//!
//! The orchestration layers never call into this module directly; they reach
//! key derivation through the Wallet Interface. These functions exist so that
//! [`crate::wallet::MemoryWallet`] behaves like a real wallet: keys derived by
//! a payer are claimable only by the intended payee.

pub mod encryption;
pub mod hashing;
pub mod key_derivation;
pub mod signature;

pub use key_derivation::{
    anyone_public_key, derive_private_scalar, derive_public_key, invoice_number, shared_secret,
    specific_linkage,
};
