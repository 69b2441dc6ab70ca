//! The Wallet Interface consumed by the orchestration layers
//!
//! Everything below the orchestration core (signing, key derivation,
//! transaction serialization, output storage, certificates, chain queries) is
//! reached through [`WalletInterface`]. The core never reinterprets the bytes it
//! gets back. [`crate::wallet::MemoryWallet`] is a complete in-process
//! implementation used by the tests and the `handoff` binary.

pub mod args;

use async_trait::async_trait;

pub use args::*;

use crate::errors::{WalletError, WalletResult};

fn unsupported<T>(operation: &str) -> WalletResult<T> {
    Err(WalletError::Unsupported(operation.to_string()))
}

/// Operations a wallet endpoint exposes. Every call is a suspension point and
/// may be abandoned by the caller.
#[async_trait]
pub trait WalletInterface: Send + Sync {
    // === Actions ===

    async fn create_action(&self, args: CreateActionArgs) -> WalletResult<CreateActionResult>;

    async fn sign_action(&self, args: SignActionArgs) -> WalletResult<SignActionResult>;

    async fn abort_action(&self, args: AbortActionArgs) -> WalletResult<AbortActionResult>;

    async fn list_actions(&self, args: ListActionsArgs) -> WalletResult<ListActionsResult>;

    async fn internalize_action(
        &self,
        args: InternalizeActionArgs,
    ) -> WalletResult<InternalizeActionResult>;

    // === Outputs ===

    async fn list_outputs(&self, args: ListOutputsArgs) -> WalletResult<ListOutputsResult>;

    async fn relinquish_output(
        &self,
        args: RelinquishOutputArgs,
    ) -> WalletResult<RelinquishOutputResult>;

    // === Keys & linkage ===

    async fn get_public_key(&self, args: GetPublicKeyArgs) -> WalletResult<GetPublicKeyResult>;

    async fn reveal_counterparty_key_linkage(
        &self,
        _args: RevealCounterpartyKeyLinkageArgs,
    ) -> WalletResult<RevealCounterpartyKeyLinkageResult> {
        unsupported("revealCounterpartyKeyLinkage")
    }

    async fn reveal_specific_key_linkage(
        &self,
        _args: RevealSpecificKeyLinkageArgs,
    ) -> WalletResult<RevealSpecificKeyLinkageResult> {
        unsupported("revealSpecificKeyLinkage")
    }

    // === Certificates ===

    async fn acquire_certificate(
        &self,
        _args: AcquireCertificateArgs,
    ) -> WalletResult<crate::data_structures::Certificate> {
        unsupported("acquireCertificate")
    }

    async fn list_certificates(
        &self,
        _args: ListCertificatesArgs,
    ) -> WalletResult<ListCertificatesResult> {
        unsupported("listCertificates")
    }

    async fn prove_certificate(
        &self,
        _args: ProveCertificateArgs,
    ) -> WalletResult<ProveCertificateResult> {
        unsupported("proveCertificate")
    }

    async fn relinquish_certificate(
        &self,
        _args: RelinquishCertificateArgs,
    ) -> WalletResult<RelinquishCertificateResult> {
        unsupported("relinquishCertificate")
    }

    async fn discover_by_identity_key(
        &self,
        _args: DiscoverByIdentityKeyArgs,
    ) -> WalletResult<DiscoverCertificatesResult> {
        unsupported("discoverByIdentityKey")
    }

    async fn discover_by_attributes(
        &self,
        _args: DiscoverByAttributesArgs,
    ) -> WalletResult<DiscoverCertificatesResult> {
        unsupported("discoverByAttributes")
    }

    // === Wallet info ===

    async fn get_network(&self) -> WalletResult<GetNetworkResult>;

    async fn get_height(&self) -> WalletResult<GetHeightResult> {
        unsupported("getHeight")
    }

    async fn get_version(&self) -> WalletResult<GetVersionResult> {
        unsupported("getVersion")
    }

    async fn is_authenticated(&self) -> WalletResult<AuthenticatedResult> {
        Ok(AuthenticatedResult {
            authenticated: true,
        })
    }
}
