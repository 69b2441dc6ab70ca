//! Network and identity checks across two wallet endpoints
//!
//! Both checks query the wallets themselves. Nothing here trusts a network or
//! identity key supplied by a caller, so a handoff cannot be pointed at a
//! mainnet wallet by mislabelling it.

use tracing::{debug, warn};

use crate::{
    data_structures::{Network, PublicKey},
    errors::{HandoffError, HandoffResult},
    wallet::WalletEndpoint,
};

/// Stateless precondition checks for a handoff
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkGuard;

impl NetworkGuard {
    pub fn new() -> Self {
        Self
    }

    /// Compare two known networks
    pub fn check_networks(local: Network, remote: Network) -> HandoffResult<Network> {
        if local != remote {
            return Err(HandoffError::NetworkMismatch { local, remote });
        }
        Ok(local)
    }

    /// Both endpoints must report the same network. Returns that network.
    pub async fn validate(
        &self,
        local: &WalletEndpoint,
        remote: &WalletEndpoint,
    ) -> HandoffResult<Network> {
        let local_network = local.network().await?;
        let remote_network = remote.network().await?;

        match Self::check_networks(local_network, remote_network) {
            Ok(network) => {
                debug!(
                    local = local.name(),
                    remote = remote.name(),
                    %network,
                    "endpoints agree on network"
                );
                Ok(network)
            }
            Err(err) => {
                warn!(
                    local = local.name(),
                    remote = remote.name(),
                    local_network = %local_network,
                    remote_network = %remote_network,
                    "endpoint network mismatch"
                );
                Err(err)
            }
        }
    }

    /// Identity key as reported by the endpoint's own wallet
    pub async fn identity_of(&self, endpoint: &WalletEndpoint) -> HandoffResult<PublicKey> {
        let identity = endpoint.identity_key().await?;
        debug!(endpoint = endpoint.name(), identity = %identity.short(), "resolved identity");
        Ok(identity)
    }
}
