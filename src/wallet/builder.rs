//! Endpoint builder providing a fluent API for wallet endpoint construction
//!
//! The builder either wraps an existing Wallet Interface implementation or
//! creates a [`MemoryWallet`] from a root key (or fresh randomness), a network
//! and optional starting balances.
//!
//! ```rust,no_run
//! use wallet_handoff_libs::data_structures::Network;
//! use wallet_handoff_libs::wallet::WalletEndpointBuilder;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let endpoint = WalletEndpointBuilder::new("alice")
//!     .with_network(Network::Test)
//!     .with_funding(10_000)
//!     .build()?;
//! assert_eq!(endpoint.name(), "alice");
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::debug;

use super::{endpoint::WalletEndpoint, memory::MemoryWallet};
use crate::{
    config::EndpointConfig,
    data_structures::{Network, PrivateKey},
    errors::WalletError,
    interface::WalletInterface,
};

/// Errors that can occur during endpoint building
#[derive(Debug, Clone)]
pub enum EndpointBuildError {
    /// Error while creating or funding the wallet
    WalletCreation(String),
    /// Conflicting or invalid settings
    ConfigurationError(String),
    /// Missing required parameters
    MissingParameter(String),
}

impl std::fmt::Display for EndpointBuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EndpointBuildError::WalletCreation(msg) => write!(f, "Wallet creation error: {}", msg),
            EndpointBuildError::ConfigurationError(msg) => {
                write!(f, "Configuration error: {}", msg)
            }
            EndpointBuildError::MissingParameter(param) => {
                write!(f, "Missing required parameter: {}", param)
            }
        }
    }
}

impl std::error::Error for EndpointBuildError {}

impl From<WalletError> for EndpointBuildError {
    fn from(err: WalletError) -> Self {
        EndpointBuildError::WalletCreation(err.to_string())
    }
}

/// Where the endpoint's wallet comes from
enum WalletSource {
    Memory { root_key: Option<PrivateKey> },
    External(Arc<dyn WalletInterface>),
}

/// Builder for [`WalletEndpoint`]
pub struct WalletEndpointBuilder {
    name: String,
    source: WalletSource,
    network: Option<Network>,
    fee_satoshis: Option<u64>,
    funding: Vec<u64>,
}

impl WalletEndpointBuilder {
    /// Start a builder for an endpoint called `name`. Without further
    /// configuration the endpoint gets a fresh in-memory wallet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: WalletSource::Memory { root_key: None },
            network: None,
            fee_satoshis: None,
            funding: Vec::new(),
        }
    }

    /// Start from a validated [`EndpointConfig`]. Only in-memory storage is
    /// available, so any other `storage_url` is a configuration error.
    pub fn from_config(config: &EndpointConfig) -> Result<Self, EndpointBuildError> {
        if !config.uses_memory_storage() {
            return Err(EndpointBuildError::ConfigurationError(format!(
                "unsupported storage url '{}'",
                config.storage_url.as_deref().unwrap_or_default()
            )));
        }
        let root_key = config
            .private_key()
            .map_err(|e| EndpointBuildError::ConfigurationError(e.to_string()))?;
        Ok(Self::new(config.name.clone())
            .with_root_key(root_key)
            .with_network(config.network))
    }

    /// Use an in-memory wallet with this root key
    pub fn with_root_key(mut self, root_key: PrivateKey) -> Self {
        self.source = WalletSource::Memory {
            root_key: Some(root_key),
        };
        self
    }

    /// Wrap an existing wallet instead of creating one
    pub fn with_wallet(mut self, wallet: Arc<dyn WalletInterface>) -> Self {
        self.source = WalletSource::External(wallet);
        self
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = Some(network);
        self
    }

    /// Flat fee the in-memory wallet charges per action
    pub fn with_fee(mut self, fee_satoshis: u64) -> Self {
        self.fee_satoshis = Some(fee_satoshis);
        self
    }

    /// Add a starting output of `satoshis`; may be called repeatedly
    pub fn with_funding(mut self, satoshis: u64) -> Self {
        self.funding.push(satoshis);
        self
    }

    /// Build the endpoint
    ///
    /// # Errors
    ///
    /// * `MissingParameter` - no network was set for an in-memory wallet
    /// * `ConfigurationError` - funding or fee settings on an external wallet
    /// * `WalletCreation` - a funding amount was rejected
    pub fn build(self) -> Result<WalletEndpoint, EndpointBuildError> {
        if self.name.trim().is_empty() {
            return Err(EndpointBuildError::MissingParameter("name".to_string()));
        }

        let wallet: Arc<dyn WalletInterface> = match self.source {
            WalletSource::External(wallet) => {
                if !self.funding.is_empty() || self.fee_satoshis.is_some() {
                    return Err(EndpointBuildError::ConfigurationError(
                        "funding and fee only apply to in-memory wallets".to_string(),
                    ));
                }
                wallet
            }
            WalletSource::Memory { root_key } => {
                let network = self.network.ok_or_else(|| {
                    EndpointBuildError::MissingParameter("network".to_string())
                })?;
                let mut memory = match root_key {
                    Some(root_key) => MemoryWallet::from_root_key(root_key, network),
                    None => MemoryWallet::new(network),
                };
                if let Some(fee) = self.fee_satoshis {
                    memory = memory.with_fee(fee);
                }
                for satoshis in &self.funding {
                    memory.fund(*satoshis)?;
                }
                debug!(
                    endpoint = %self.name,
                    network = %network,
                    identity = %memory.identity_key().short(),
                    "built in-memory wallet endpoint"
                );
                Arc::new(memory)
            }
        };

        Ok(WalletEndpoint::new(self.name, wallet))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builds_funded_memory_endpoint() {
        let endpoint = WalletEndpointBuilder::new("payer")
            .with_network(Network::Main)
            .with_funding(3000)
            .with_funding(2000)
            .build()
            .unwrap();
        assert_eq!(endpoint.network().await.unwrap(), Network::Main);

        let outputs = endpoint
            .wallet()
            .list_outputs(crate::interface::ListOutputsArgs::basket("default"))
            .await
            .unwrap();
        assert_eq!(outputs.total_outputs, 2);
        assert_eq!(outputs.spendable_satoshis(), 5000);
    }

    #[test]
    fn test_network_required_for_memory_wallet() {
        let result = WalletEndpointBuilder::new("payer").build();
        assert!(matches!(result, Err(EndpointBuildError::MissingParameter(_))));
    }

    #[test]
    fn test_external_wallet_rejects_funding() {
        let wallet: Arc<dyn WalletInterface> = Arc::new(MemoryWallet::new(Network::Test));
        let result = WalletEndpointBuilder::new("payer")
            .with_wallet(wallet)
            .with_funding(100)
            .build();
        assert!(matches!(result, Err(EndpointBuildError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = EndpointConfig::generate("carol", Network::Test);
        let expected = config.private_key().unwrap().public_key();
        let endpoint = WalletEndpointBuilder::from_config(&config)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(endpoint.name(), "carol");
        assert_eq!(endpoint.identity_key().await.unwrap(), expected);

        let remote = config.with_storage_url("https://storage.example.com");
        assert!(matches!(
            WalletEndpointBuilder::from_config(&remote),
            Err(EndpointBuildError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_root_key_fixes_identity() {
        let key = PrivateKey::random();
        let expected = key.public_key();
        let endpoint = WalletEndpointBuilder::new("payee")
            .with_root_key(key)
            .with_network(Network::Test)
            .build()
            .unwrap();
        assert_eq!(endpoint.identity_key().await.unwrap(), expected);
    }
}
