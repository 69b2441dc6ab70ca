//! Wallet endpoints and the in-memory Wallet Interface implementation

pub mod builder;
pub mod endpoint;
pub mod memory;
pub mod transaction;

pub use builder::{EndpointBuildError, WalletEndpointBuilder};
pub use endpoint::WalletEndpoint;
pub use memory::{MemoryWallet, MockFailureModes, DEFAULT_FEE_SATOSHIS, MEMORY_WALLET_VERSION};
pub use transaction::MemoryTransaction;
