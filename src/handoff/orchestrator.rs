//! Sequences a complete cross-wallet transfer
//!
//! `idle → endpointsValidated → keyDerived → fundingActionCreated →
//! transactionExchanged → internalized`
//!
//! The payer half ([`HandoffOrchestrator::send`]) validates both endpoints,
//! derives the payee's one-time key and funds an output locked to it. The
//! payee half ([`HandoffOrchestrator::receive`]) internalizes the resulting
//! payload. [`HandoffOrchestrator::transfer`] runs both against two endpoints
//! held by the same process.
//!
//! The first failure is returned unchanged and the handoff stays at the last
//! stage it completed; see [`HandoffOrchestrator::progress`]. Nothing is
//! retried here. Progress of finished calls is kept until
//! [`HandoffOrchestrator::prune_finished`] drops it.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use rand::RngCore;
use tracing::{debug, info, warn};

use super::{
    payload::{HandoffPayload, HandoffReceipt, PAYLOAD_VERSION},
    stage::{HandoffDirection, HandoffStage},
};
use crate::{
    cancellation::CancellationToken,
    config::HandoffConfig,
    data_structures::ActionStatus,
    errors::{HandoffError, HandoffResult, WalletError},
    events::{EventDispatcher, EventDispatcherError, HandoffEvent, HandoffEventListener},
    interface::CreateActionOutput,
    lifecycle::{ActionLifecycleManager, ActionSpec},
    linkage::{generate_salt, KeyLinkageDeriver},
    validation::NetworkGuard,
    wallet::WalletEndpoint,
};

/// The funding action has a single requested output and randomization is
/// off, so the payment always lands at index 0.
const PAYMENT_OUTPUT_INDEX: u32 = 0;

/// How far one handoff got
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffProgress {
    pub handoff_id: String,
    pub direction: HandoffDirection,
    pub stage: HandoffStage,
    /// The call driving this handoff has returned, successfully or not
    pub finished: bool,
}

pub struct HandoffOrchestrator {
    config: HandoffConfig,
    guard: NetworkGuard,
    dispatcher: tokio::sync::Mutex<EventDispatcher>,
    cancellation: Option<Arc<dyn CancellationToken>>,
    progress: Mutex<Vec<HandoffProgress>>,
}

impl HandoffOrchestrator {
    pub fn new(config: HandoffConfig) -> HandoffResult<Self> {
        config
            .validate()
            .map_err(|e| HandoffError::InvalidSpec(e.to_string()))?;
        Ok(Self {
            config,
            guard: NetworkGuard::new(),
            dispatcher: tokio::sync::Mutex::new(EventDispatcher::new()),
            cancellation: None,
            progress: Mutex::new(Vec::new()),
        })
    }

    /// Abandon handoffs once `token` is cancelled. Checked before every stage
    /// up to, but not after, internalization.
    pub fn with_cancellation(mut self, token: Arc<dyn CancellationToken>) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_listener(
        mut self,
        listener: Box<dyn HandoffEventListener>,
    ) -> Result<Self, EventDispatcherError> {
        self.dispatcher.get_mut().register(listener)?;
        Ok(self)
    }

    pub fn config(&self) -> &HandoffConfig {
        &self.config
    }

    /// Progress of a handoff started by this orchestrator
    pub fn progress(&self, handoff_id: &str) -> Option<HandoffProgress> {
        let progress = self.progress.lock().ok()?;
        progress.iter().find(|p| p.handoff_id == handoff_id).cloned()
    }

    /// Progress of the most recently started handoff
    pub fn latest(&self) -> Option<HandoffProgress> {
        self.progress.lock().ok()?.last().cloned()
    }

    /// Drop progress of handoffs whose call has returned. Returns how many
    /// entries were removed; handoffs still in flight are kept.
    pub fn prune_finished(&self) -> usize {
        match self.progress.lock() {
            Ok(mut progress) => {
                let before = progress.len();
                progress.retain(|p| !p.finished);
                before - progress.len()
            }
            Err(_) => 0,
        }
    }

    /// Payer half: validate, derive, fund. Returns the payload to deliver to
    /// the payee.
    pub async fn send(
        &self,
        payer: &WalletEndpoint,
        payee: &WalletEndpoint,
    ) -> HandoffResult<HandoffPayload> {
        let handoff_id = self.start(HandoffDirection::Export);
        let result = async {
            self.validate_endpoints(&handoff_id, payer, payee).await?;
            self.derive_and_fund(&handoff_id, payer, payee).await
        }
        .await;
        self.settle(&handoff_id, result).await
    }

    /// Payee half: claim the output described by `payload`. The sender key is
    /// taken from the payer's wallet, not from the payload.
    pub async fn receive(
        &self,
        payee: &WalletEndpoint,
        payer: &WalletEndpoint,
        payload: &HandoffPayload,
    ) -> HandoffResult<HandoffReceipt> {
        let handoff_id = self.start(HandoffDirection::Import);
        let result = async {
            self.validate_endpoints(&handoff_id, payee, payer).await?;
            self.advance(&handoff_id, HandoffStage::TransactionExchanged)
                .await;
            self.claim(&handoff_id, HandoffDirection::Import, payee, payer, payload)
                .await
        }
        .await;
        self.settle(&handoff_id, result).await
    }

    /// Run a full handoff between `local` and `remote`. `Export` pays the
    /// remote endpoint, `Import` pays the local one.
    pub async fn transfer(
        &self,
        local: &WalletEndpoint,
        remote: &WalletEndpoint,
        direction: HandoffDirection,
    ) -> HandoffResult<HandoffReceipt> {
        let handoff_id = self.start(direction);
        let (payer, payee) = match direction {
            HandoffDirection::Export => (local, remote),
            HandoffDirection::Import => (remote, local),
        };

        let result = async {
            self.validate_endpoints(&handoff_id, local, remote).await?;
            let payload = self.derive_and_fund(&handoff_id, payer, payee).await?;

            // Cross the trust boundary the same way an out-of-band delivery would
            let delivered = HandoffPayload::from_json(&payload.to_json()?)?;
            self.advance(&handoff_id, HandoffStage::TransactionExchanged)
                .await;

            self.claim(&handoff_id, direction, payee, payer, &delivered)
                .await
        }
        .await;
        self.settle(&handoff_id, result).await
    }

    async fn validate_endpoints(
        &self,
        handoff_id: &str,
        local: &WalletEndpoint,
        remote: &WalletEndpoint,
    ) -> HandoffResult<()> {
        if self.config.amount == 0 {
            return Err(HandoffError::InvalidSpec(
                "handoff amount must be greater than zero".to_string(),
            ));
        }
        self.check_cancelled(HandoffStage::EndpointsValidated)?;
        let network = self.guard.validate(local, remote).await?;
        debug!(handoff = handoff_id, %network, "endpoints validated");
        self.advance(handoff_id, HandoffStage::EndpointsValidated)
            .await;
        Ok(())
    }

    async fn derive_and_fund(
        &self,
        handoff_id: &str,
        payer: &WalletEndpoint,
        payee: &WalletEndpoint,
    ) -> HandoffResult<HandoffPayload> {
        let payer_identity = self.guard.identity_of(payer).await?;
        let payee_identity = self.guard.identity_of(payee).await?;

        self.check_cancelled(HandoffStage::KeyDerived)?;
        let derivation_prefix = generate_salt(self.config.derivation_entropy_bytes)?;
        let derivation_suffix = generate_salt(self.config.derivation_entropy_bytes)?;
        let linkage = KeyLinkageDeriver::new(Arc::clone(payer.wallet()))
            .derive_for(&derivation_prefix, &derivation_suffix, &payee_identity, false)
            .await?;
        self.advance(handoff_id, HandoffStage::KeyDerived).await;

        self.check_cancelled(HandoffStage::FundingActionCreated)?;
        let instructions = linkage.handoff_record().to_custom_instructions()?;
        let spec = ActionSpec::new(self.config.description.clone())
            .with_output(
                CreateActionOutput::new(
                    linkage.locking_script.to_hex(),
                    self.config.amount,
                    "Payment to counterparty",
                )
                .with_custom_instructions(instructions),
            )
            .with_label(self.config.sender_label.clone())
            .randomize_outputs(false);

        let lifecycle = ActionLifecycleManager::new(Arc::clone(payer.wallet()));
        let mut action = lifecycle.create(spec).await?;

        if action.status == ActionStatus::Signable {
            let reference = action.reference.clone().ok_or_else(|| {
                HandoffError::Wallet(WalletError::Serialization(
                    "signable action without a reference".to_string(),
                ))
            })?;
            action = match lifecycle.sign(&reference, BTreeMap::new()).await {
                Ok(signed) => signed,
                Err(err) => {
                    if let Err(abort_err) = lifecycle.abort(&reference).await {
                        debug!(handoff = handoff_id, error = %abort_err, "funding action already released");
                    }
                    return Err(err);
                }
            };
        }

        let transaction_bytes = action.tx.ok_or_else(|| {
            HandoffError::Wallet(WalletError::Serialization(
                "funding action returned no transaction bytes".to_string(),
            ))
        })?;
        info!(
            handoff = handoff_id,
            txid = ?action.txid,
            amount = self.config.amount,
            payee = %payee_identity.short(),
            "funding action created"
        );
        self.advance(handoff_id, HandoffStage::FundingActionCreated)
            .await;

        Ok(HandoffPayload {
            version: PAYLOAD_VERSION,
            transaction_bytes,
            output_index: PAYMENT_OUTPUT_INDEX,
            derivation_prefix,
            derivation_suffix,
            sender_identity_key: payer_identity,
            amount: self.config.amount,
        })
    }

    async fn claim(
        &self,
        handoff_id: &str,
        direction: HandoffDirection,
        payee: &WalletEndpoint,
        payer: &WalletEndpoint,
        payload: &HandoffPayload,
    ) -> HandoffResult<HandoffReceipt> {
        let sender = self.guard.identity_of(payer).await?;
        if payload.sender_identity_key != sender {
            warn!(
                handoff = handoff_id,
                claimed = %payload.sender_identity_key.short(),
                actual = %sender.short(),
                "payload sender differs from payer identity; using payer identity"
            );
        }
        let payee_identity = self.guard.identity_of(payee).await?;

        self.check_cancelled(HandoffStage::Internalized)?;
        let lifecycle = ActionLifecycleManager::new(Arc::clone(payee.wallet()));
        let result = lifecycle
            .internalize(
                payload.transaction_bytes.clone(),
                vec![payload.remittance(sender)],
                self.config.description.clone(),
                Vec::new(),
            )
            .await?;

        self.advance(handoff_id, HandoffStage::Internalized).await;
        self.dispatcher
            .lock()
            .await
            .dispatch(HandoffEvent::completed(
                handoff_id,
                &result.txid,
                payload.amount,
                result.is_merge,
            ))
            .await;

        Ok(HandoffReceipt {
            handoff_id: handoff_id.to_string(),
            direction,
            stage: HandoffStage::Internalized,
            txid: result.txid,
            output_index: payload.output_index,
            amount: payload.amount,
            sender_identity_key: sender,
            payee_identity_key: payee_identity,
            is_merge: result.is_merge,
        })
    }

    fn start(&self, direction: HandoffDirection) -> String {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        let handoff_id = hex::encode(bytes);
        if let Ok(mut progress) = self.progress.lock() {
            progress.push(HandoffProgress {
                handoff_id: handoff_id.clone(),
                direction,
                stage: HandoffStage::Idle,
                finished: false,
            });
        }
        debug!(handoff = %handoff_id, %direction, "handoff started");
        handoff_id
    }

    fn stage_of(&self, handoff_id: &str) -> HandoffStage {
        self.progress(handoff_id)
            .map(|p| p.stage)
            .unwrap_or(HandoffStage::Idle)
    }

    async fn advance(&self, handoff_id: &str, stage: HandoffStage) {
        if let Ok(mut progress) = self.progress.lock() {
            if let Some(entry) = progress.iter_mut().find(|p| p.handoff_id == handoff_id) {
                entry.stage = stage;
            }
        }
        self.dispatcher
            .lock()
            .await
            .dispatch(HandoffEvent::stage_reached(handoff_id, stage))
            .await;
    }

    fn check_cancelled(&self, next: HandoffStage) -> HandoffResult<()> {
        match &self.cancellation {
            Some(token) => token.check(next.as_str()),
            None => Ok(()),
        }
    }

    async fn settle<T>(&self, handoff_id: &str, result: HandoffResult<T>) -> HandoffResult<T> {
        if let Ok(mut progress) = self.progress.lock() {
            if let Some(entry) = progress.iter_mut().find(|p| p.handoff_id == handoff_id) {
                entry.finished = true;
            }
        }
        if let Err(err) = &result {
            let stage = self.stage_of(handoff_id);
            warn!(handoff = handoff_id, last_stage = %stage, kind = %err.kind(), error = %err, "handoff stopped");
            self.dispatcher
                .lock()
                .await
                .dispatch(HandoffEvent::failed(
                    handoff_id,
                    stage,
                    err.kind(),
                    err.to_string(),
                ))
                .await;
        }
        result
    }
}

impl std::fmt::Debug for HandoffOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandoffOrchestrator")
            .field("config", &self.config)
            .field("cancellable", &self.cancellation.is_some())
            .finish_non_exhaustive()
    }
}
