//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Notify;

use wallet_handoff_libs::{
    data_structures::{Network, DEFAULT_BASKET},
    errors::WalletResult,
    interface::*,
    wallet::{MemoryWallet, WalletEndpoint, WalletEndpointBuilder},
};

/// In-memory endpoint with optional starting balance
pub fn endpoint(name: &str, network: Network, funding: u64) -> WalletEndpoint {
    let mut builder = WalletEndpointBuilder::new(name).with_network(network);
    if funding > 0 {
        builder = builder.with_funding(funding);
    }
    builder.build().expect("Failed to build endpoint")
}

/// Endpoint wrapping a wallet the test keeps a handle on
pub fn endpoint_for(name: &str, wallet: Arc<MemoryWallet>) -> WalletEndpoint {
    WalletEndpointBuilder::new(name)
        .with_wallet(wallet)
        .build()
        .expect("Failed to build endpoint")
}

pub fn funded_wallet(network: Network, funding: u64) -> Arc<MemoryWallet> {
    let wallet = MemoryWallet::new(network);
    wallet.fund(funding).expect("Failed to fund wallet");
    Arc::new(wallet)
}

pub async fn default_outputs(endpoint: &WalletEndpoint) -> ListOutputsResult {
    endpoint
        .wallet()
        .list_outputs(ListOutputsArgs::basket(DEFAULT_BASKET))
        .await
        .expect("Failed to list outputs")
}

/// Wallet whose `sign_action` parks until released, so a test can race a
/// second call against an in-flight one
pub struct GatedWallet {
    pub inner: MemoryWallet,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedWallet {
    pub fn new(inner: MemoryWallet) -> Self {
        Self {
            inner,
            entered: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl WalletInterface for GatedWallet {
    async fn create_action(&self, args: CreateActionArgs) -> WalletResult<CreateActionResult> {
        self.inner.create_action(args).await
    }

    async fn sign_action(&self, args: SignActionArgs) -> WalletResult<SignActionResult> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.sign_action(args).await
    }

    async fn abort_action(&self, args: AbortActionArgs) -> WalletResult<AbortActionResult> {
        self.inner.abort_action(args).await
    }

    async fn list_actions(&self, args: ListActionsArgs) -> WalletResult<ListActionsResult> {
        self.inner.list_actions(args).await
    }

    async fn internalize_action(
        &self,
        args: InternalizeActionArgs,
    ) -> WalletResult<InternalizeActionResult> {
        self.inner.internalize_action(args).await
    }

    async fn list_outputs(&self, args: ListOutputsArgs) -> WalletResult<ListOutputsResult> {
        self.inner.list_outputs(args).await
    }

    async fn relinquish_output(
        &self,
        args: RelinquishOutputArgs,
    ) -> WalletResult<RelinquishOutputResult> {
        self.inner.relinquish_output(args).await
    }

    async fn get_public_key(&self, args: GetPublicKeyArgs) -> WalletResult<GetPublicKeyResult> {
        self.inner.get_public_key(args).await
    }

    async fn get_network(&self) -> WalletResult<GetNetworkResult> {
        self.inner.get_network().await
    }
}
