//! Key linkage derivation across two wallets

use std::sync::Arc;

use wallet_handoff_libs::{
    data_structures::Network,
    errors::HandoffError,
    interface::WalletInterface,
    linkage::{generate_salt, KeyLinkageDeriver, LockingScript},
    wallet::MemoryWallet,
};

fn deriver(wallet: &Arc<MemoryWallet>) -> KeyLinkageDeriver {
    KeyLinkageDeriver::new(Arc::clone(wallet) as Arc<dyn WalletInterface>)
}

#[tokio::test]
async fn test_derivation_is_deterministic() {
    let payer = Arc::new(MemoryWallet::new(Network::Test));
    let payee = Arc::new(MemoryWallet::new(Network::Test));
    let prefix = generate_salt(8).unwrap();
    let suffix = generate_salt(8).unwrap();

    let first = deriver(&payer)
        .derive_for(&prefix, &suffix, &payee.identity_key(), false)
        .await
        .unwrap();
    let second = deriver(&payer)
        .derive(&prefix, &suffix, &payee.identity_key().to_hex(), false)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(
        first.locking_script,
        LockingScript::pay_to_public_key_hash(&first.derived_public_key)
    );
}

#[tokio::test]
async fn test_payer_and_payee_agree_on_the_key() {
    let payer = Arc::new(MemoryWallet::new(Network::Test));
    let payee = Arc::new(MemoryWallet::new(Network::Test));
    let prefix = generate_salt(8).unwrap();
    let suffix = generate_salt(8).unwrap();

    let sent = deriver(&payer)
        .derive_for(&prefix, &suffix, &payee.identity_key(), false)
        .await
        .unwrap();
    let received = deriver(&payee)
        .derive_for(&prefix, &suffix, &payer.identity_key(), true)
        .await
        .unwrap();

    assert_eq!(sent.derived_public_key, received.derived_public_key);
    assert_eq!(sent.locking_script, received.locking_script);

    // A third wallet claiming the payee's side lands on a different key
    let outsider = Arc::new(MemoryWallet::new(Network::Test));
    let guessed = deriver(&outsider)
        .derive_for(&prefix, &suffix, &payer.identity_key(), true)
        .await
        .unwrap();
    assert_ne!(guessed.locking_script, sent.locking_script);
}

#[tokio::test]
async fn test_fresh_salts_give_unlinkable_scripts() {
    let payer = Arc::new(MemoryWallet::new(Network::Test));
    let payee = Arc::new(MemoryWallet::new(Network::Test));
    let counterparty = payee.identity_key();

    let first = deriver(&payer)
        .derive_for(
            &generate_salt(8).unwrap(),
            &generate_salt(8).unwrap(),
            &counterparty,
            false,
        )
        .await
        .unwrap();
    let second = deriver(&payer)
        .derive_for(
            &generate_salt(8).unwrap(),
            &generate_salt(8).unwrap(),
            &counterparty,
            false,
        )
        .await
        .unwrap();

    assert_ne!(first.locking_script, second.locking_script);
}

#[tokio::test]
async fn test_invalid_counterparty_is_a_derivation_error() {
    let payer = Arc::new(MemoryWallet::new(Network::Test));
    let prefix = generate_salt(8).unwrap();

    let err = deriver(&payer)
        .derive(&prefix, &prefix, "not-a-key", false)
        .await
        .unwrap_err();
    assert!(matches!(err, HandoffError::DerivationError(_)));

    let err = deriver(&payer)
        .derive(&prefix, "", &payer.identity_key().to_hex(), false)
        .await
        .unwrap_err();
    assert!(matches!(err, HandoffError::DerivationError(_)));
}

#[tokio::test]
async fn test_rederive_from_stored_record() {
    let payer = Arc::new(MemoryWallet::new(Network::Main));
    let payee = Arc::new(MemoryWallet::new(Network::Main));

    let linkage = deriver(&payer)
        .derive_for(
            &generate_salt(16).unwrap(),
            &generate_salt(16).unwrap(),
            &payee.identity_key(),
            false,
        )
        .await
        .unwrap();

    let instructions = linkage.handoff_record().to_custom_instructions().unwrap();
    let record =
        wallet_handoff_libs::linkage::HandoffRecord::from_custom_instructions(&instructions)
            .unwrap();
    let rebuilt = deriver(&payer).rederive(&record, false).await.unwrap();

    assert_eq!(rebuilt, linkage);
}
