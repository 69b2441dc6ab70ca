//! Action lifecycle integration tests against the in-memory wallet

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{endpoint, funded_wallet, GatedWallet};
use wallet_handoff_libs::{
    data_structures::{ActionStatus, AtomicBeef, Network, PaymentRemittance, PrivateKey},
    errors::{ErrorKind, HandoffError},
    interface::{CreateActionInput, CreateActionOutput, SignActionSpend, WalletInterface},
    lifecycle::{ActionFilter, ActionLifecycleManager, ActionSpec},
    linkage::LockingScript,
    wallet::{MemoryWallet, MockFailureModes},
};

fn payment_script() -> String {
    LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key()).to_hex()
}

fn payment_spec(satoshis: u64) -> ActionSpec {
    ActionSpec::new("test")
        .with_output(CreateActionOutput::new(payment_script(), satoshis, "payment"))
        .randomize_outputs(false)
}

#[tokio::test]
async fn test_create_signs_inline() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet.clone());

    let action = manager
        .create(payment_spec(1000).sign_and_process(true))
        .await
        .expect("Failed to create action");

    assert_eq!(action.status, ActionStatus::Signed);
    assert_eq!(action.outputs[0].satoshis, 1000);
    assert!(action.txid.is_some());
    assert!(action.tx.is_some());
    assert!(action.reference.is_none());
    assert_eq!(wallet.balance().unwrap(), 5000 - 1000 - wallet.fee_satoshis());
}

#[tokio::test]
async fn test_empty_spec_rejected_before_wallet() {
    let wallet = Arc::new(MemoryWallet::new(Network::Test));
    wallet
        .set_failure_mode(MockFailureModes {
            fail_create_action: true,
            ..Default::default()
        })
        .unwrap();
    let manager = ActionLifecycleManager::new(wallet.clone());

    let err = manager.create(ActionSpec::new("test")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpec);

    // The injected failure was never consumed
    assert!(wallet.get_failure_modes().unwrap().fail_create_action);
}

#[tokio::test]
async fn test_abort_releases_inputs_and_closes_reference() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet.clone());

    let action = manager
        .create(payment_spec(1000).sign_and_process(false))
        .await
        .unwrap();
    assert_eq!(action.status, ActionStatus::Signable);
    let reference = action.reference.clone().expect("signable action carries a reference");
    assert_eq!(wallet.balance().unwrap(), 0, "inputs are reserved while signable");

    let aborted = manager.abort(&reference).await.unwrap();
    assert_eq!(aborted.status, ActionStatus::Aborted);
    assert_eq!(wallet.balance().unwrap(), 5000);

    let err = manager.sign(&reference, BTreeMap::new()).await.unwrap_err();
    assert_eq!(err, HandoffError::UnknownReference(reference.clone()));
    let err = manager.abort(&reference).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownReference);
}

#[tokio::test]
async fn test_signed_action_is_closed() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet.clone());

    let action = manager
        .create(payment_spec(1000).sign_and_process(false))
        .await
        .unwrap();
    let reference = action.reference.unwrap();
    assert_eq!(manager.pending_references().unwrap(), vec![reference.clone()]);

    let signed = manager.sign(&reference, BTreeMap::new()).await.unwrap();
    assert_eq!(signed.status, ActionStatus::Signed);
    assert!(signed.txid.is_some());
    assert!(manager.pending_references().unwrap().is_empty());

    assert_eq!(
        manager.sign(&reference, BTreeMap::new()).await.unwrap_err().kind(),
        ErrorKind::UnknownReference
    );
    assert_eq!(
        manager.abort(&reference).await.unwrap_err().kind(),
        ErrorKind::UnknownReference
    );

    // The terminal snapshot remains readable until pruned
    assert_eq!(manager.get(&reference).await.unwrap().status, ActionStatus::Signed);
    assert_eq!(manager.prune_terminal().unwrap(), 1);
    assert!(manager.get(&reference).await.is_err());
}

#[tokio::test]
async fn test_unseen_reference_is_unknown() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet);

    let err = manager.sign("not-a-reference", BTreeMap::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownReference);
    let err = manager.abort("not-a-reference").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownReference);
}

#[tokio::test]
async fn test_cooperative_input_needs_spend() {
    let wallet = Arc::new(MemoryWallet::new(Network::Test));
    let outpoint = wallet.fund(5000).unwrap();
    let manager = ActionLifecycleManager::new(wallet.clone());

    let spec = payment_spec(1000).with_input(CreateActionInput::deferred(
        outpoint,
        98,
        "cooperatively unlocked",
    ));
    let action = manager.create(spec).await.unwrap();
    assert_eq!(action.status, ActionStatus::Signable);
    let reference = action.reference.unwrap();

    // Missing unlocking data is a caller error; the action stays signable
    let err = manager.sign(&reference, BTreeMap::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpec);
    assert_eq!(manager.get(&reference).await.unwrap().status, ActionStatus::Signable);

    let mut spends = BTreeMap::new();
    spends.insert(
        0,
        SignActionSpend {
            unlocking_script: "ab".repeat(98),
            sequence_number: None,
        },
    );
    let signed = manager.sign(&reference, spends).await.unwrap();
    assert_eq!(signed.status, ActionStatus::Signed);
}

#[tokio::test]
async fn test_wallet_failure_marks_action_failed() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet.clone());

    let action = manager
        .create(payment_spec(1000).sign_and_process(false))
        .await
        .unwrap();
    let reference = action.reference.unwrap();

    wallet
        .set_failure_mode(MockFailureModes {
            fail_sign_action: true,
            ..Default::default()
        })
        .unwrap();
    let err = manager.sign(&reference, BTreeMap::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Wallet);
    assert!(!err.is_retryable());

    assert_eq!(manager.get(&reference).await.unwrap().status, ActionStatus::Failed);
    assert_eq!(wallet.balance().unwrap(), 5000, "failed action released its inputs");
    assert_eq!(
        manager.sign(&reference, BTreeMap::new()).await.unwrap_err().kind(),
        ErrorKind::UnknownReference
    );
}

#[tokio::test]
async fn test_racing_abort_is_rejected() {
    let inner = MemoryWallet::new(Network::Test);
    inner.fund(5000).unwrap();
    let wallet = Arc::new(GatedWallet::new(inner));
    let manager = Arc::new(ActionLifecycleManager::new(wallet.clone()));

    let action = manager
        .create(payment_spec(1000).sign_and_process(false))
        .await
        .unwrap();
    let reference = action.reference.unwrap();

    let signer = {
        let manager = manager.clone();
        let reference = reference.clone();
        tokio::spawn(async move { manager.sign(&reference, BTreeMap::new()).await })
    };
    wallet.entered.notified().await;

    let err = manager.abort(&reference).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConcurrentMutation);
    assert!(err.is_retryable());

    wallet.release.notify_one();
    let signed = signer.await.expect("signer task panicked").unwrap();
    assert_eq!(signed.status, ActionStatus::Signed);

    // Retrying after re-fetching state finds the action terminal
    assert_eq!(
        manager.abort(&reference).await.unwrap_err().kind(),
        ErrorKind::UnknownReference
    );
}

#[tokio::test]
async fn test_list_is_summary_only_by_default() {
    let wallet = funded_wallet(Network::Test, 5000);
    let manager = ActionLifecycleManager::new(wallet);

    manager
        .create(payment_spec(1000).with_label("payments"))
        .await
        .unwrap();
    manager.create(payment_spec(500)).await.unwrap();

    let summary = manager
        .list(ActionFilter::new().with_any_label(vec!["payments".to_string()]))
        .await
        .unwrap();
    assert_eq!(summary.total_actions, 1);
    let action = &summary.actions[0];
    assert!(action.inputs.is_empty());
    assert!(action.outputs.is_empty());
    assert!(action.labels.is_empty());
    assert!(action.tx.is_none());

    let detailed = manager
        .list(
            ActionFilter::new()
                .with_all_labels(vec!["payments".to_string()])
                .with_details(),
        )
        .await
        .unwrap();
    let action = &detailed.actions[0];
    assert!(!action.inputs.is_empty());
    assert_eq!(action.outputs[0].satoshis, 1000);
    assert_eq!(action.labels, vec!["payments".to_string()]);

    let page = manager
        .list(ActionFilter::new().with_limit(1).with_offset(1))
        .await
        .unwrap();
    assert_eq!(page.actions.len(), 1);
    assert!(page.total_actions >= 3, "funding plus two payments");
}

#[tokio::test]
async fn test_internalize_requires_distinct_claims() {
    let payee = endpoint("payee", Network::Test, 0);
    let manager = ActionLifecycleManager::new(payee.wallet().clone());
    let tx = AtomicBeef::new(vec![1, 1, 1, 1]);

    let err = manager
        .internalize(tx.clone(), Vec::new(), "nothing", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpec);

    let claims = vec![
        PaymentRemittance::basket_insertion(0, "tokens"),
        PaymentRemittance::basket_insertion(0, "tokens"),
    ];
    let err = manager
        .internalize(tx, claims, "twice", Vec::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidSpec);
}

#[tokio::test]
async fn test_basket_insertion_round_trip() {
    let payer = funded_wallet(Network::Test, 5000);
    let payer_manager = ActionLifecycleManager::new(payer.clone());
    let action = payer_manager.create(payment_spec(700)).await.unwrap();
    let tx = action.tx.expect("signed action carries transaction bytes");

    let payee = endpoint("payee", Network::Test, 0);
    let manager = ActionLifecycleManager::new(payee.wallet().clone());
    let result = manager
        .internalize(
            tx,
            vec![PaymentRemittance::basket_insertion(0, "tokens")],
            "token receipt",
            vec!["tokens".to_string()],
        )
        .await
        .unwrap();
    assert!(result.accepted);
    assert!(!result.is_merge);

    let tokens = payee
        .wallet()
        .list_outputs(wallet_handoff_libs::interface::ListOutputsArgs::basket("tokens"))
        .await
        .unwrap();
    assert_eq!(tokens.total_outputs, 1);
    assert_eq!(tokens.outputs[0].satoshis, 700);
}
