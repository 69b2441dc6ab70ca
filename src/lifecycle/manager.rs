//! Drives Actions from intent to a terminal state
//!
//! The manager keeps one record per `signable` Action, keyed by reference.
//! Each record sits behind its own async mutex: `sign` and `abort` take it
//! with `try_lock`, so two calls racing on one reference never both reach the
//! wallet and the loser sees [`HandoffError::ConcurrentMutation`]. Terminal
//! records stay readable through `get` until pruned, but `sign` and `abort` on
//! them fail with [`HandoffError::UnknownReference`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::spec::ActionSpec;
use crate::{
    data_structures::{
        Action, ActionInput, ActionOutput, ActionStatus, AtomicBeef, PaymentRemittance,
    },
    errors::{HandoffError, HandoffResult, WalletError},
    interface::{
        AbortActionArgs, InternalizeActionArgs, InternalizeActionResult, ListActionsArgs,
        ListActionsResult, QueryMode, SignActionArgs, SignActionSpend, WalletInterface,
    },
};

type ActionRecord = Arc<tokio::sync::Mutex<Action>>;

/// Which Actions `list` returns and how much of each
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionFilter {
    pub labels: Vec<String>,
    pub label_query_mode: QueryMode,
    pub include_labels: bool,
    pub include_inputs: bool,
    pub include_outputs: bool,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl ActionFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Match Actions carrying any of `labels`
    pub fn with_any_label(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self.label_query_mode = QueryMode::Any;
        self
    }

    /// Match Actions carrying every one of `labels`
    pub fn with_all_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self.label_query_mode = QueryMode::All;
        self
    }

    /// Include inputs, outputs and labels in the listing
    pub fn with_details(mut self) -> Self {
        self.include_inputs = true;
        self.include_outputs = true;
        self.include_labels = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    fn to_args(&self) -> ListActionsArgs {
        ListActionsArgs {
            labels: self.labels.clone(),
            label_query_mode: self.label_query_mode,
            include_labels: self.include_labels,
            include_inputs: self.include_inputs,
            include_outputs: self.include_outputs,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

/// Lifecycle manager bound to one wallet
pub struct ActionLifecycleManager {
    wallet: Arc<dyn WalletInterface>,
    records: Mutex<HashMap<String, ActionRecord>>,
}

impl ActionLifecycleManager {
    pub fn new(wallet: Arc<dyn WalletInterface>) -> Self {
        Self {
            wallet,
            records: Mutex::new(HashMap::new()),
        }
    }

    fn registry(&self) -> HandoffResult<std::sync::MutexGuard<'_, HashMap<String, ActionRecord>>> {
        self.records
            .lock()
            .map_err(|_| HandoffError::Wallet(WalletError::Storage("action registry poisoned".to_string())))
    }

    fn record(&self, reference: &str) -> HandoffResult<ActionRecord> {
        self.registry()?
            .get(reference)
            .cloned()
            .ok_or_else(|| HandoffError::UnknownReference(reference.to_string()))
    }

    fn forget(&self, reference: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.remove(reference);
        }
    }

    /// References of Actions currently awaiting `sign` or `abort`. A record
    /// locked by an in-flight call counts as pending.
    pub fn pending_references(&self) -> HandoffResult<Vec<String>> {
        let mut references: Vec<String> = self
            .registry()?
            .iter()
            .filter(|(_, record)| {
                record
                    .try_lock()
                    .map(|action| !action.status.is_terminal())
                    .unwrap_or(true)
            })
            .map(|(reference, _)| reference.clone())
            .collect();
        references.sort();
        Ok(references)
    }

    /// Drop terminal records. Returns how many were removed.
    pub fn prune_terminal(&self) -> HandoffResult<usize> {
        let mut records = self.registry()?;
        let before = records.len();
        records.retain(|_, record| {
            record
                .try_lock()
                .map(|action| !action.status.is_terminal())
                .unwrap_or(true)
        });
        Ok(before - records.len())
    }

    /// Snapshot of an Action this manager made signable
    pub async fn get(&self, reference: &str) -> HandoffResult<Action> {
        let record = self.record(reference)?;
        let action = record.lock().await;
        Ok(action.clone())
    }

    /// Ask the wallet for a new Action. Returns it `signed`, or `signable`
    /// with a reference when cooperative signing is still needed.
    pub async fn create(&self, spec: ActionSpec) -> HandoffResult<Action> {
        spec.validate()?;

        let mut action = Action {
            reference: None,
            txid: None,
            status: ActionStatus::Unsigned,
            description: spec.description.clone(),
            satoshis: -(spec.outputs.iter().map(|o| o.satoshis).sum::<u64>() as i64),
            is_outgoing: true,
            inputs: spec
                .inputs
                .iter()
                .map(|input| ActionInput {
                    source_outpoint: input.outpoint.clone(),
                    source_satoshis: 0,
                    source_locking_script: None,
                    unlocking_script: input.unlocking_script.clone(),
                    input_description: input.input_description.clone(),
                    sequence_number: input.sequence_number.unwrap_or(u32::MAX),
                })
                .collect(),
            outputs: spec
                .outputs
                .iter()
                .enumerate()
                .map(|(index, output)| ActionOutput {
                    output_index: index as u32,
                    satoshis: output.satoshis,
                    locking_script: Some(output.locking_script.clone()),
                    spendable: false,
                    output_description: output.output_description.clone(),
                    basket: output.basket.clone(),
                    tags: output.tags.clone(),
                    custom_instructions: output.custom_instructions.clone(),
                })
                .collect(),
            labels: spec.labels.clone(),
            lock_time: spec.lock_time.unwrap_or(0),
            version: spec.version.unwrap_or(1),
            tx: None,
        };

        let result = self.wallet.create_action(spec.to_args()).await.map_err(|e| {
            warn!(error = %e, "createAction rejected");
            HandoffError::from(e)
        })?;

        if let Some(signable) = result.signable_transaction {
            action.status = ActionStatus::Signable;
            action.reference = Some(signable.reference.clone());
            action.tx = Some(signable.tx);
            self.registry()?.insert(
                signable.reference.clone(),
                Arc::new(tokio::sync::Mutex::new(action.clone())),
            );
            debug!(reference = %signable.reference, "action is signable");
            return Ok(action);
        }

        let txid = result.txid.ok_or_else(|| {
            HandoffError::Wallet(WalletError::Serialization(
                "createAction returned neither a txid nor a signable transaction".to_string(),
            ))
        })?;
        action.status = ActionStatus::Signed;
        action.txid = Some(txid);
        action.tx = result.tx;
        info!(txid = ?action.txid, "action signed on creation");
        Ok(action)
    }

    /// Supply unlocking data for a `signable` Action and finalize it
    pub async fn sign(
        &self,
        reference: &str,
        spends: BTreeMap<u32, SignActionSpend>,
    ) -> HandoffResult<Action> {
        let record = self.record(reference)?;
        let mut action = record
            .try_lock()
            .map_err(|_| HandoffError::ConcurrentMutation(reference.to_string()))?;
        if action.status.is_terminal() {
            return Err(HandoffError::UnknownReference(reference.to_string()));
        }

        let result = self
            .wallet
            .sign_action(SignActionArgs {
                reference: reference.to_string(),
                spends,
            })
            .await;

        match result {
            Ok(signed) => {
                action.status = ActionStatus::Signed;
                action.txid = Some(signed.txid);
                action.tx = signed.tx;
                info!(reference, txid = ?action.txid, "action signed");
                Ok(action.clone())
            }
            Err(WalletError::UnknownReference(_)) => {
                self.forget(reference);
                Err(HandoffError::UnknownReference(reference.to_string()))
            }
            Err(err @ WalletError::InvalidArgument { .. }) => {
                // Still signable; the caller can retry with corrected spends
                Err(err.into())
            }
            Err(err) => {
                warn!(reference, error = %err, "signing failed; action marked failed");
                action.status = ActionStatus::Failed;
                if let Err(abort_err) = self
                    .wallet
                    .abort_action(AbortActionArgs {
                        reference: reference.to_string(),
                    })
                    .await
                {
                    debug!(reference, error = %abort_err, "could not release inputs of failed action");
                }
                Err(err.into())
            }
        }
    }

    /// Abandon a `signable` Action, returning its inputs to spendable
    pub async fn abort(&self, reference: &str) -> HandoffResult<Action> {
        let record = self.record(reference)?;
        let mut action = record
            .try_lock()
            .map_err(|_| HandoffError::ConcurrentMutation(reference.to_string()))?;
        if action.status.is_terminal() {
            return Err(HandoffError::UnknownReference(reference.to_string()));
        }

        match self
            .wallet
            .abort_action(AbortActionArgs {
                reference: reference.to_string(),
            })
            .await
        {
            Ok(_) => {
                action.status = ActionStatus::Aborted;
                info!(reference, "action aborted");
                Ok(action.clone())
            }
            Err(WalletError::UnknownReference(_)) => {
                self.forget(reference);
                Err(HandoffError::UnknownReference(reference.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Summary listing unless the filter asks for details
    pub async fn list(&self, filter: ActionFilter) -> HandoffResult<ListActionsResult> {
        Ok(self.wallet.list_actions(filter.to_args()).await?)
    }

    /// Claim outputs of a received transaction
    pub async fn internalize(
        &self,
        tx: AtomicBeef,
        remittances: Vec<PaymentRemittance>,
        description: impl Into<String>,
        labels: Vec<String>,
    ) -> HandoffResult<InternalizeActionResult> {
        if remittances.is_empty() {
            return Err(HandoffError::InvalidSpec(
                "at least one output must be claimed".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = remittances.iter().find(|r| !seen.insert(r.output_index)) {
            return Err(HandoffError::InvalidSpec(format!(
                "output {} has more than one remittance",
                dup.output_index
            )));
        }

        let result = self
            .wallet
            .internalize_action(InternalizeActionArgs {
                tx,
                outputs: remittances,
                description: description.into(),
                labels,
            })
            .await
            .map_err(|e| {
                warn!(error = %e, "internalizeAction rejected");
                HandoffError::from(e)
            })?;
        info!(txid = %result.txid, is_merge = result.is_merge, "transaction internalized");
        Ok(result)
    }
}
