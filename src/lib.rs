//! Wallet handoff libraries
//!
//! Orchestration for two wallet protocols a client has to get right:
//!
//! - the lifecycle of a locally created [`Action`](data_structures::Action):
//!   creation, optional cooperative signing, then commit or abort
//!   ([`lifecycle`]);
//! - the cross-wallet payment handoff, which moves value between two
//!   independently controlled wallets using only an exchanged transaction and
//!   a little derivation metadata ([`handoff`]).
//!
//! Wallets are reached through the [`WalletInterface`](interface::WalletInterface)
//! trait. [`wallet::MemoryWallet`] is a complete in-memory implementation used
//! by the tests and the `handoff` binary.
//!
//! ## Features
//!
//! - `cli` (default): builds the `handoff` binary with `clap` and
//!   `tracing-subscriber`
//!
//! ```rust,no_run
//! use wallet_handoff_libs::{
//!     config::HandoffConfig,
//!     data_structures::Network,
//!     handoff::{HandoffDirection, HandoffOrchestrator},
//!     wallet::WalletEndpointBuilder,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let alice = WalletEndpointBuilder::new("alice")
//!     .with_network(Network::Test)
//!     .with_funding(10_000)
//!     .build()?;
//! let bob = WalletEndpointBuilder::new("bob")
//!     .with_network(Network::Test)
//!     .build()?;
//!
//! let orchestrator = HandoffOrchestrator::new(HandoffConfig::new(5000))?;
//! let receipt = orchestrator
//!     .transfer(&alice, &bob, HandoffDirection::Export)
//!     .await?;
//! println!("claimed {} in {}", receipt.amount, receipt.txid);
//! # Ok(())
//! # }
//! ```

pub mod cancellation;
pub mod config;
pub mod crypto;
pub mod data_structures;
pub mod errors;
pub mod events;
pub mod handoff;
pub mod interface;
pub mod lifecycle;
pub mod linkage;
pub mod storage;
pub mod validation;
pub mod wallet;

pub use errors::*;
pub use handoff::{HandoffDirection, HandoffOrchestrator, HandoffPayload, HandoffReceipt, HandoffStage};
pub use lifecycle::{ActionFilter, ActionLifecycleManager, ActionSpec};
pub use linkage::{KeyLinkage, KeyLinkageDeriver};
pub use validation::NetworkGuard;
pub use wallet::{MemoryWallet, WalletEndpoint, WalletEndpointBuilder};
