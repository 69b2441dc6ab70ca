//! A named handle on one wallet

use std::fmt;
use std::sync::Arc;

use crate::{
    data_structures::{Network, PublicKey},
    errors::HandoffResult,
    interface::{GetPublicKeyArgs, WalletInterface},
};

/// A Wallet Interface the orchestration layers talk to, with a name for logs.
/// The endpoint's network is whatever the wallet reports; it is never cached.
#[derive(Clone)]
pub struct WalletEndpoint {
    name: String,
    wallet: Arc<dyn WalletInterface>,
}

impl fmt::Debug for WalletEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletEndpoint")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl WalletEndpoint {
    pub fn new(name: impl Into<String>, wallet: Arc<dyn WalletInterface>) -> Self {
        Self {
            name: name.into(),
            wallet,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wallet(&self) -> &Arc<dyn WalletInterface> {
        &self.wallet
    }

    pub async fn identity_key(&self) -> HandoffResult<PublicKey> {
        Ok(self
            .wallet
            .get_public_key(GetPublicKeyArgs::identity())
            .await?
            .public_key)
    }

    pub async fn network(&self) -> HandoffResult<Network> {
        Ok(self.wallet.get_network().await?.network)
    }
}
