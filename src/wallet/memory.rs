//! In-process Wallet Interface implementation
//!
//! [`MemoryWallet`] keeps outputs, actions, pending signatures and certificates
//! in memory behind a single mutex. Keys are real: outputs are locked to child
//! keys derived from the wallet's root key, so a payment can only be claimed by
//! the wallet it was derived for. Failure injection follows the same pattern
//! as the mock storage it grew out of: set a flag, the next matching call fails
//! and the flag resets.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use curve25519_dalek::scalar::Scalar;
use rand::{seq::SliceRandom, RngCore};
use tracing::{debug, info, warn};

use super::transaction::{MemoryTransaction, TxInput, TxOutput};
use crate::{
    crypto::{
        anyone_public_key, derive_private_scalar, derive_public_key,
        encryption::encrypt_for,
        invoice_number, shared_secret,
        signature::sign,
        specific_linkage,
    },
    data_structures::{
        Action, ActionInput, ActionOutput, ActionStatus, AtomicBeef, Certificate,
        IdentityCertificate, Network, Outpoint, PrivateKey, PublicKey, RemittanceProtocol,
        DEFAULT_BASKET,
    },
    errors::{WalletError, WalletResult},
    interface::*,
    linkage::{
        key_id, wallet_payment_protocol, HandoffRecord, LockingScript, UnlockingScript,
        HANDOFF_RECORD_TYPE,
    },
    storage::{MemoryOutputStore, OutputFilter, OutputKey, StoredOutput},
};

/// Flat fee charged on every action the wallet funds
pub const DEFAULT_FEE_SATOSHIS: u64 = 10;
pub const MEMORY_WALLET_VERSION: &str = concat!("memory-wallet-", env!("CARGO_PKG_VERSION"));
const REFERENCE_BYTES: usize = 12;
const CHANGE_KEY_BYTES: usize = 8;

/// Simulated failures for exercising error paths
#[derive(Debug, Clone, Default)]
pub struct MockFailureModes {
    /// Fail next create_action call
    pub fail_create_action: bool,
    /// Fail next sign_action call
    pub fail_sign_action: bool,
    /// Fail next internalize_action call
    pub fail_internalize_action: bool,
    /// Fail next get_public_key call
    pub fail_get_public_key: bool,
    /// Return this error from the next operation of any kind
    pub next_error: Option<WalletError>,
}

/// An output an action will create, before its txid is known
#[derive(Debug, Clone)]
struct PlannedOutput {
    satoshis: u64,
    locking_script: LockingScript,
    description: String,
    basket: Option<String>,
    tags: Vec<String>,
    custom_instructions: Option<String>,
    /// Set when the wallet tracks the output after the action completes
    key: Option<OutputKey>,
    is_change: bool,
}

impl PlannedOutput {
    fn to_action_output(&self, index: u32) -> ActionOutput {
        ActionOutput {
            output_index: index,
            satoshis: self.satoshis,
            locking_script: Some(self.locking_script.to_hex()),
            spendable: matches!(self.key, Some(OutputKey::Identity | OutputKey::Derived { .. })),
            output_description: self.description.clone(),
            basket: self.basket.clone(),
            tags: self.tags.clone(),
            custom_instructions: self.custom_instructions.clone(),
        }
    }

    fn to_stored(&self, txid: &str, index: u32) -> Option<StoredOutput> {
        let key = self.key.clone()?;
        let mut stored = StoredOutput::new(
            Outpoint::new(txid, index),
            self.satoshis,
            self.locking_script.clone(),
            key,
        )
        .with_tags(self.tags.clone())
        .with_custom_instructions(self.custom_instructions.clone());
        stored.basket = self.basket.clone();
        Some(stored)
    }
}

/// Action awaiting completion, either immediately or through `sign_action`
#[derive(Debug, Clone)]
struct PendingAction {
    reference: String,
    action_index: usize,
    tx: MemoryTransaction,
    /// Per input: the key the wallet signs with, or `None` when the caller
    /// supplies the unlocking script
    input_keys: Vec<Option<OutputKey>>,
    outputs: Vec<PlannedOutput>,
    return_txid_only: bool,
    no_send: bool,
}

struct CompletedAction {
    txid: String,
    tx: AtomicBeef,
    change: Vec<Outpoint>,
}

#[derive(Debug, Default)]
struct WalletState {
    outputs: MemoryOutputStore,
    actions: Vec<Action>,
    pending: HashMap<String, PendingAction>,
    certificates: Vec<Certificate>,
    height: u32,
    funding_count: u32,
}

/// Complete in-memory wallet
#[derive(Clone)]
pub struct MemoryWallet {
    root_key: Arc<PrivateKey>,
    identity_key: PublicKey,
    network: Network,
    fee_satoshis: u64,
    state: Arc<Mutex<WalletState>>,
    failure_modes: Arc<Mutex<MockFailureModes>>,
}

impl fmt::Debug for MemoryWallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryWallet")
            .field("identity_key", &self.identity_key)
            .field("network", &self.network)
            .field("fee_satoshis", &self.fee_satoshis)
            .finish_non_exhaustive()
    }
}

impl MemoryWallet {
    /// Wallet with a fresh random root key
    pub fn new(network: Network) -> Self {
        Self::from_root_key(PrivateKey::random(), network)
    }

    pub fn from_root_key(root_key: PrivateKey, network: Network) -> Self {
        let identity_key = root_key.public_key();
        Self {
            root_key: Arc::new(root_key),
            identity_key,
            network,
            fee_satoshis: DEFAULT_FEE_SATOSHIS,
            state: Arc::new(Mutex::new(WalletState {
                height: 1,
                ..Default::default()
            })),
            failure_modes: Arc::new(Mutex::new(MockFailureModes::default())),
        }
    }

    pub fn with_fee(mut self, fee_satoshis: u64) -> Self {
        self.fee_satoshis = fee_satoshis;
        self
    }

    pub fn identity_key(&self) -> PublicKey {
        self.identity_key
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn fee_satoshis(&self) -> u64 {
        self.fee_satoshis
    }

    /// Set failure mode for testing error conditions
    pub fn set_failure_mode(&self, mode: MockFailureModes) -> WalletResult<()> {
        *self.failure_modes()? = mode;
        Ok(())
    }

    pub fn get_failure_modes(&self) -> WalletResult<MockFailureModes> {
        Ok(self.failure_modes()?.clone())
    }

    pub fn set_height(&self, height: u32) -> WalletResult<()> {
        self.state()?.height = height;
        Ok(())
    }

    /// Credit the default basket with a new output locked to a self-derived key
    pub fn fund(&self, satoshis: u64) -> WalletResult<Outpoint> {
        if satoshis == 0 {
            return Err(WalletError::invalid_argument(
                "satoshis",
                "funding amount must be positive",
            ));
        }
        let mut state = self.state()?;
        state.funding_count += 1;
        let key = OutputKey::Derived {
            counterparty: self.identity_key,
            key_id: format!("funding {}", state.funding_count),
        };
        let locking_script = LockingScript::pay_to_public_key_hash(&self.public_key_for(&key)?);

        let mut tx = MemoryTransaction::new(1, state.funding_count);
        tx.outputs.push(TxOutput {
            satoshis,
            locking_script: locking_script.clone(),
        });
        let txid = tx.txid()?;
        let outpoint = Outpoint::new(txid.clone(), 0);
        state.outputs.insert(
            StoredOutput::new(outpoint.clone(), satoshis, locking_script.clone(), key)
                .in_basket(DEFAULT_BASKET),
        )?;
        state.actions.push(Action {
            reference: None,
            txid: Some(txid),
            status: ActionStatus::Signed,
            description: "Wallet funding".to_string(),
            satoshis: satoshis as i64,
            is_outgoing: false,
            inputs: Vec::new(),
            outputs: vec![ActionOutput {
                output_index: 0,
                satoshis,
                locking_script: Some(locking_script.to_hex()),
                spendable: true,
                output_description: "funding".to_string(),
                basket: Some(DEFAULT_BASKET.to_string()),
                tags: Vec::new(),
                custom_instructions: None,
            }],
            labels: vec!["funding".to_string()],
            lock_time: tx.lock_time,
            version: tx.version,
            tx: Some(tx.to_beef()?),
        });

        debug!(outpoint = %outpoint, satoshis, "funded memory wallet");
        Ok(outpoint)
    }

    /// Spendable satoshis in the default basket
    pub fn balance(&self) -> WalletResult<u64> {
        Ok(self.state()?.outputs.balance(DEFAULT_BASKET))
    }

    fn state(&self) -> WalletResult<MutexGuard<'_, WalletState>> {
        self.state
            .lock()
            .map_err(|_| WalletError::Storage("wallet state lock poisoned".to_string()))
    }

    fn failure_modes(&self) -> WalletResult<MutexGuard<'_, MockFailureModes>> {
        self.failure_modes
            .lock()
            .map_err(|_| WalletError::Storage("failure mode lock poisoned".to_string()))
    }

    /// Check if an operation should fail and return the appropriate error
    fn check_failure(&self, operation: &str) -> WalletResult<()> {
        let mut modes = self.failure_modes()?;

        if let Some(error) = modes.next_error.take() {
            return Err(error);
        }

        let flag = match operation {
            "create_action" => &mut modes.fail_create_action,
            "sign_action" => &mut modes.fail_sign_action,
            "internalize_action" => &mut modes.fail_internalize_action,
            "get_public_key" => &mut modes.fail_get_public_key,
            _ => return Ok(()),
        };
        if *flag {
            *flag = false; // Reset after use
            return Err(WalletError::Storage(format!("Mock failure: {operation}")));
        }
        Ok(())
    }

    fn resolve_counterparty(&self, counterparty: Counterparty) -> PublicKey {
        match counterparty {
            Counterparty::Key(key) => key,
            Counterparty::Other(SpecialCounterparty::Myself) => self.identity_key,
            Counterparty::Other(SpecialCounterparty::Anyone) => anyone_public_key(),
        }
    }

    fn public_key_for(&self, key: &OutputKey) -> WalletResult<PublicKey> {
        match key {
            OutputKey::Identity => Ok(self.identity_key),
            OutputKey::Derived {
                counterparty,
                key_id,
            } => {
                let invoice = invoice_number(&wallet_payment_protocol(), key_id)?;
                derive_public_key(&self.root_key, counterparty, &invoice, true)
            }
            OutputKey::External => Err(WalletError::invalid_argument(
                "key",
                "output is not locked to a key this wallet holds",
            )),
        }
    }

    fn spending_scalar(&self, key: &OutputKey) -> WalletResult<Scalar> {
        match key {
            OutputKey::Identity => Ok(self.root_key.scalar()),
            OutputKey::Derived {
                counterparty,
                key_id,
            } => {
                let invoice = invoice_number(&wallet_payment_protocol(), key_id)?;
                derive_private_scalar(&self.root_key, counterparty, &invoice)
            }
            OutputKey::External => Err(WalletError::invalid_argument(
                "inputs",
                "output is not spendable by this wallet",
            )),
        }
    }

    fn change_output(&self, satoshis: u64) -> WalletResult<PlannedOutput> {
        let key = OutputKey::Derived {
            counterparty: self.identity_key,
            key_id: format!("change {}", random_token(CHANGE_KEY_BYTES)),
        };
        Ok(PlannedOutput {
            satoshis,
            locking_script: LockingScript::pay_to_public_key_hash(&self.public_key_for(&key)?),
            description: "change".to_string(),
            basket: Some(DEFAULT_BASKET.to_string()),
            tags: Vec::new(),
            custom_instructions: None,
            key: Some(key),
            is_change: true,
        })
    }

    /// Unlock wallet-owned inputs, spend them and store the new outputs
    fn complete(
        &self,
        state: &mut WalletState,
        mut pending: PendingAction,
    ) -> WalletResult<CompletedAction> {
        let digest = pending.tx.signature_digest()?;
        for (input, key) in pending.tx.inputs.iter_mut().zip(&pending.input_keys) {
            if input.unlocking_script.is_some() {
                continue;
            }
            let key = key.as_ref().ok_or_else(|| {
                WalletError::invalid_argument(
                    "spends",
                    format!("no unlocking script for input {}", input.source_outpoint),
                )
            })?;
            let scalar = self.spending_scalar(key)?;
            let public_key = self.public_key_for(key)?;
            input.unlocking_script =
                Some(UnlockingScript::new(sign(&scalar, &digest), public_key).to_hex());
        }

        let txid = pending.tx.txid()?;
        let beef = pending.tx.to_beef()?;
        let spent: Vec<Outpoint> = pending
            .tx
            .inputs
            .iter()
            .map(|i| i.source_outpoint.clone())
            .collect();
        state.outputs.mark_spent(&spent, &txid);

        let mut change = Vec::new();
        for (index, planned) in pending.outputs.iter().enumerate() {
            if let Some(stored) = planned.to_stored(&txid, index as u32) {
                if planned.is_change {
                    change.push(stored.outpoint.clone());
                }
                state.outputs.insert(stored)?;
            }
        }

        if let Some(action) = state.actions.get_mut(pending.action_index) {
            action.status = ActionStatus::Signed;
            action.txid = Some(txid.clone());
            action.tx = Some(beef.clone());
            for (recorded, input) in action.inputs.iter_mut().zip(&pending.tx.inputs) {
                recorded.unlocking_script = input.unlocking_script.clone();
            }
        }

        info!(
            txid = %txid,
            reference = %pending.reference,
            inputs = pending.tx.inputs.len(),
            outputs = pending.tx.outputs.len(),
            "action signed"
        );
        Ok(CompletedAction {
            txid,
            tx: beef,
            change: if pending.no_send { change } else { Vec::new() },
        })
    }

    fn find_certificate(
        state: &WalletState,
        certificate_type: &str,
        serial_number: &str,
        certifier: &PublicKey,
    ) -> Option<usize> {
        state.certificates.iter().position(|c| {
            c.certificate_type == certificate_type
                && c.serial_number == serial_number
                && &c.certifier == certifier
        })
    }

    fn identity_certificates<'a>(
        certificates: impl Iterator<Item = &'a Certificate>,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> DiscoverCertificatesResult {
        let (limit, offset) = page_bounds(limit, offset);
        let matching: Vec<&Certificate> = certificates.collect();
        DiscoverCertificatesResult {
            total_certificates: matching.len() as u32,
            certificates: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|c| IdentityCertificate {
                    certificate: c.clone(),
                    certifier_name: None,
                    publicly_revealed_keyring: Default::default(),
                    decrypted_fields: c.fields.clone(),
                })
                .collect(),
        }
    }
}

fn random_token(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    STANDARD.encode(buf)
}

fn unix_time() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
        .to_string()
}

fn validate_create_args(args: &CreateActionArgs) -> WalletResult<Vec<LockingScript>> {
    if args.description.trim().is_empty() {
        return Err(WalletError::invalid_argument(
            "description",
            "must not be empty",
        ));
    }
    if args.inputs.is_empty() && args.outputs.is_empty() {
        return Err(WalletError::invalid_argument(
            "outputs",
            "an action needs at least one input or output",
        ));
    }
    let mut seen = HashSet::new();
    for input in &args.inputs {
        if !seen.insert(&input.outpoint) {
            return Err(WalletError::invalid_argument(
                "inputs",
                format!("outpoint {} listed twice", input.outpoint),
            ));
        }
        if let Some(script) = &input.unlocking_script {
            hex::decode(script)?;
        }
    }
    args.outputs
        .iter()
        .map(|output| {
            if output.satoshis == 0 {
                return Err(WalletError::invalid_argument(
                    "outputs",
                    "output satoshis must be positive",
                ));
            }
            LockingScript::from_hex(&output.locking_script)
        })
        .collect()
}

#[async_trait]
impl WalletInterface for MemoryWallet {
    async fn create_action(&self, args: CreateActionArgs) -> WalletResult<CreateActionResult> {
        self.check_failure("create_action")?;
        let scripts = validate_create_args(&args)?;
        let requested_total = args
            .outputs
            .iter()
            .try_fold(0u64, |acc, o| acc.checked_add(o.satoshis))
            .ok_or_else(|| WalletError::invalid_argument("outputs", "total value overflows"))?;

        let mut state = self.state()?;

        // Caller-specified inputs first
        let mut tx = MemoryTransaction::new(args.version.unwrap_or(1), args.lock_time.unwrap_or(0));
        let mut input_keys = Vec::new();
        let mut action_inputs = Vec::new();
        let mut deferred = false;
        for input in &args.inputs {
            let stored = state.outputs.get(&input.outpoint).ok_or_else(|| {
                WalletError::invalid_argument("inputs", format!("unknown outpoint {}", input.outpoint))
            })?;
            if !stored.status.is_spendable() {
                return Err(WalletError::invalid_argument(
                    "inputs",
                    format!("output {} is not spendable", input.outpoint),
                ));
            }
            let key = if input.unlocking_script.is_some() {
                None
            } else if input.needs_cooperative_signing() {
                deferred = true;
                None
            } else if stored.key == OutputKey::External {
                return Err(WalletError::invalid_argument(
                    "inputs",
                    format!(
                        "output {} needs an unlocking script or unlockingScriptLength",
                        input.outpoint
                    ),
                ));
            } else {
                Some(stored.key.clone())
            };
            action_inputs.push(ActionInput {
                source_outpoint: input.outpoint.clone(),
                source_satoshis: stored.satoshis,
                source_locking_script: Some(stored.locking_script.to_hex()),
                unlocking_script: input.unlocking_script.clone(),
                input_description: input.input_description.clone(),
                sequence_number: input.sequence_number.unwrap_or(u32::MAX),
            });
            tx.inputs.push(TxInput {
                source_outpoint: input.outpoint.clone(),
                source_satoshis: stored.satoshis,
                unlocking_script: input.unlocking_script.clone(),
                sequence_number: input.sequence_number.unwrap_or(u32::MAX),
            });
            input_keys.push(key);
        }

        // Fund the remainder from the default basket, smallest outputs first
        let target = requested_total.saturating_add(self.fee_satoshis);
        let mut input_total = tx.total_input_satoshis();
        if input_total < target {
            for candidate in state.outputs.spendable_in_basket(DEFAULT_BASKET) {
                if input_total >= target {
                    break;
                }
                if tx.inputs.iter().any(|i| i.source_outpoint == candidate.outpoint) {
                    continue;
                }
                input_total += candidate.satoshis;
                action_inputs.push(ActionInput {
                    source_outpoint: candidate.outpoint.clone(),
                    source_satoshis: candidate.satoshis,
                    source_locking_script: Some(candidate.locking_script.to_hex()),
                    unlocking_script: None,
                    input_description: "funding".to_string(),
                    sequence_number: u32::MAX,
                });
                tx.inputs.push(TxInput {
                    source_outpoint: candidate.outpoint.clone(),
                    source_satoshis: candidate.satoshis,
                    unlocking_script: None,
                    sequence_number: u32::MAX,
                });
                input_keys.push(Some(candidate.key.clone()));
            }
        }
        if input_total < target {
            return Err(WalletError::InsufficientFunds(format!(
                "need {target} satoshis including fee, {input_total} available"
            )));
        }

        let mut planned: Vec<PlannedOutput> = args
            .outputs
            .iter()
            .zip(scripts)
            .map(|(output, locking_script)| {
                let key = if locking_script.is_locked_to(&self.identity_key) {
                    Some(OutputKey::Identity)
                } else {
                    output.basket.as_ref().map(|_| OutputKey::External)
                };
                PlannedOutput {
                    satoshis: output.satoshis,
                    locking_script,
                    description: output.output_description.clone(),
                    basket: output.basket.clone(),
                    tags: output.tags.clone(),
                    custom_instructions: output.custom_instructions.clone(),
                    key,
                    is_change: false,
                }
            })
            .collect();
        let change = input_total - target;
        if change > 0 {
            planned.push(self.change_output(change)?);
        }
        if args.options.randomize_outputs {
            planned.shuffle(&mut rand::thread_rng());
        }
        tx.outputs = planned
            .iter()
            .map(|p| TxOutput {
                satoshis: p.satoshis,
                locking_script: p.locking_script.clone(),
            })
            .collect();

        let reference = random_token(REFERENCE_BYTES);
        let outpoints: Vec<Outpoint> = tx.inputs.iter().map(|i| i.source_outpoint.clone()).collect();
        state.outputs.reserve(&outpoints, &reference)?;

        let signable = deferred || !args.options.sign_and_process;
        state.actions.push(Action {
            reference: signable.then(|| reference.clone()),
            txid: None,
            status: if signable {
                ActionStatus::Signable
            } else {
                ActionStatus::Unsigned
            },
            description: args.description.clone(),
            satoshis: -((requested_total + self.fee_satoshis) as i64),
            is_outgoing: true,
            inputs: action_inputs,
            outputs: planned
                .iter()
                .enumerate()
                .map(|(i, p)| p.to_action_output(i as u32))
                .collect(),
            labels: args.labels.clone(),
            lock_time: tx.lock_time,
            version: tx.version,
            tx: None,
        });
        let pending = PendingAction {
            reference: reference.clone(),
            action_index: state.actions.len() - 1,
            tx,
            input_keys,
            outputs: planned,
            return_txid_only: args.options.return_txid_only,
            no_send: args.options.no_send,
        };

        if signable {
            let unsigned = pending.tx.to_beef()?;
            debug!(reference = %reference, "action awaiting signatures");
            state.pending.insert(reference.clone(), pending);
            return Ok(CreateActionResult {
                txid: None,
                tx: None,
                signable_transaction: Some(SignableTransaction {
                    reference,
                    tx: unsigned,
                }),
                no_send_change: Vec::new(),
            });
        }

        let action_index = pending.action_index;
        let return_txid_only = pending.return_txid_only;
        match self.complete(&mut state, pending) {
            Ok(done) => Ok(CreateActionResult {
                txid: Some(done.txid),
                tx: (!return_txid_only).then_some(done.tx),
                signable_transaction: None,
                no_send_change: done.change,
            }),
            Err(e) => {
                warn!(reference = %reference, error = %e, "action could not be completed");
                state.outputs.release(&reference);
                if let Some(action) = state.actions.get_mut(action_index) {
                    action.status = ActionStatus::Failed;
                }
                Err(e)
            }
        }
    }

    async fn sign_action(&self, args: SignActionArgs) -> WalletResult<SignActionResult> {
        self.check_failure("sign_action")?;
        let mut state = self.state()?;

        let pending = state
            .pending
            .get(&args.reference)
            .ok_or_else(|| WalletError::UnknownReference(args.reference.clone()))?;
        for (&index, spend) in &args.spends {
            if index as usize >= pending.tx.inputs.len() {
                return Err(WalletError::invalid_argument(
                    "spends",
                    format!("input {index} does not exist"),
                ));
            }
            hex::decode(&spend.unlocking_script)?;
        }
        for (index, (input, key)) in pending.tx.inputs.iter().zip(&pending.input_keys).enumerate() {
            if input.unlocking_script.is_none()
                && key.is_none()
                && !args.spends.contains_key(&(index as u32))
            {
                return Err(WalletError::invalid_argument(
                    "spends",
                    format!("missing unlocking script for input {index}"),
                ));
            }
        }

        let Some(mut pending) = state.pending.remove(&args.reference) else {
            return Err(WalletError::UnknownReference(args.reference));
        };
        for (index, spend) in args.spends {
            let index = index as usize;
            if let Some(input) = pending.tx.inputs.get_mut(index) {
                input.unlocking_script = Some(spend.unlocking_script);
                if let Some(sequence) = spend.sequence_number {
                    input.sequence_number = sequence;
                }
            }
        }

        let reference = pending.reference.clone();
        let action_index = pending.action_index;
        let return_txid_only = pending.return_txid_only;
        match self.complete(&mut state, pending) {
            Ok(done) => Ok(SignActionResult {
                txid: done.txid,
                tx: (!return_txid_only).then_some(done.tx),
            }),
            Err(e) => {
                state.outputs.release(&reference);
                if let Some(action) = state.actions.get_mut(action_index) {
                    action.status = ActionStatus::Failed;
                }
                Err(e)
            }
        }
    }

    async fn abort_action(&self, args: AbortActionArgs) -> WalletResult<AbortActionResult> {
        self.check_failure("abort_action")?;
        let mut state = self.state()?;
        let pending = state
            .pending
            .remove(&args.reference)
            .ok_or_else(|| WalletError::UnknownReference(args.reference.clone()))?;
        let released = state.outputs.release(&pending.reference);
        if let Some(action) = state.actions.get_mut(pending.action_index) {
            action.status = ActionStatus::Aborted;
        }
        debug!(reference = %args.reference, released, "action aborted");
        Ok(AbortActionResult { aborted: true })
    }

    async fn list_actions(&self, args: ListActionsArgs) -> WalletResult<ListActionsResult> {
        let (limit, offset) = page_bounds(args.limit, args.offset);
        let state = self.state()?;
        let matching: Vec<&Action> = state
            .actions
            .iter()
            .filter(|a| args.label_query_mode.matches(&args.labels, &a.labels))
            .collect();

        Ok(ListActionsResult {
            total_actions: matching.len() as u32,
            actions: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .map(|action| {
                    let mut action = action.clone();
                    action.tx = None;
                    if !args.include_inputs {
                        action.inputs.clear();
                    }
                    if !args.include_outputs {
                        action.outputs.clear();
                    }
                    if !args.include_labels {
                        action.labels.clear();
                    }
                    action
                })
                .collect(),
        })
    }

    async fn internalize_action(
        &self,
        args: InternalizeActionArgs,
    ) -> WalletResult<InternalizeActionResult> {
        self.check_failure("internalize_action")?;
        let tx = MemoryTransaction::from_beef(&args.tx)?;
        let txid = tx.txid()?;
        if args.outputs.is_empty() {
            return Err(WalletError::invalid_argument(
                "outputs",
                "at least one output must be claimed",
            ));
        }

        // Every claim is checked before anything is stored
        let mut seen = HashSet::new();
        let mut claims = Vec::with_capacity(args.outputs.len());
        let mut credited = 0u64;
        for remittance in &args.outputs {
            let output_index = remittance.output_index;
            if !seen.insert(output_index) {
                return Err(WalletError::invalid_argument(
                    "outputs",
                    format!("output {output_index} claimed twice"),
                ));
            }
            let output = tx.outputs.get(output_index as usize).ok_or_else(|| {
                WalletError::ClaimRejected {
                    output_index,
                    reason: format!("transaction has {} outputs", tx.outputs.len()),
                }
            })?;
            if output.satoshis == 0 {
                return Err(WalletError::ClaimRejected {
                    output_index,
                    reason: "output carries no value".to_string(),
                });
            }
            let outpoint = Outpoint::new(txid.clone(), output_index);

            let claim = match &remittance.protocol {
                RemittanceProtocol::WalletPayment { payment_remittance } => {
                    let key = OutputKey::Derived {
                        counterparty: payment_remittance.sender_identity_key,
                        key_id: key_id(
                            &payment_remittance.derivation_prefix,
                            &payment_remittance.derivation_suffix,
                        ),
                    };
                    let expected = self.public_key_for(&key)?;
                    if !output.locking_script.is_locked_to(&expected) {
                        return Err(WalletError::ClaimRejected {
                            output_index,
                            reason: "locking script does not pay the key derived from the remittance"
                                .to_string(),
                        });
                    }
                    let record = HandoffRecord {
                        record_type: HANDOFF_RECORD_TYPE.to_string(),
                        prefix: payment_remittance.derivation_prefix.clone(),
                        suffix: payment_remittance.derivation_suffix.clone(),
                        counterparty: payment_remittance.sender_identity_key,
                    };
                    credited += output.satoshis;
                    StoredOutput::new(outpoint, output.satoshis, output.locking_script.clone(), key)
                        .in_basket(DEFAULT_BASKET)
                        .with_custom_instructions(Some(serde_json::to_string(&record)?))
                }
                RemittanceProtocol::BasketInsertion {
                    insertion_remittance,
                } => {
                    let basket = insertion_remittance.basket.trim();
                    if basket.is_empty() || basket == DEFAULT_BASKET {
                        return Err(WalletError::invalid_argument(
                            "basket",
                            format!("cannot insert into basket '{basket}'"),
                        ));
                    }
                    StoredOutput::new(
                        outpoint,
                        output.satoshis,
                        output.locking_script.clone(),
                        OutputKey::External,
                    )
                    .in_basket(basket)
                    .with_tags(insertion_remittance.tags.clone())
                    .with_custom_instructions(insertion_remittance.custom_instructions.clone())
                }
            };
            claims.push(claim);
        }

        let mut state = self.state()?;
        let claimed = claims.len();
        let fresh: Vec<StoredOutput> = claims
            .into_iter()
            .filter(|c| !state.outputs.contains(&c.outpoint))
            .collect();
        let is_merge = fresh.len() < claimed;
        if fresh.is_empty() {
            debug!(txid = %txid, "transaction already internalized");
            return Ok(InternalizeActionResult {
                accepted: true,
                is_merge,
                txid,
            });
        }

        let action_outputs: Vec<ActionOutput> = fresh
            .iter()
            .map(|stored| ActionOutput {
                output_index: stored.outpoint.index,
                satoshis: stored.satoshis,
                locking_script: Some(stored.locking_script.to_hex()),
                spendable: stored.is_spendable(),
                output_description: args.description.clone(),
                basket: stored.basket.clone(),
                tags: stored.tags.clone(),
                custom_instructions: stored.custom_instructions.clone(),
            })
            .collect();
        for stored in fresh {
            state.outputs.insert(stored)?;
        }
        if !is_merge {
            state.actions.push(Action {
                reference: None,
                txid: Some(txid.clone()),
                status: ActionStatus::Signed,
                description: args.description,
                satoshis: credited as i64,
                is_outgoing: false,
                inputs: Vec::new(),
                outputs: action_outputs,
                labels: args.labels,
                lock_time: tx.lock_time,
                version: tx.version,
                tx: Some(args.tx),
            });
        }

        info!(txid = %txid, credited, is_merge, "transaction internalized");
        Ok(InternalizeActionResult {
            accepted: true,
            is_merge,
            txid,
        })
    }

    async fn list_outputs(&self, args: ListOutputsArgs) -> WalletResult<ListOutputsResult> {
        let (limit, offset) = page_bounds(args.limit, args.offset);
        let filter = OutputFilter::new()
            .with_basket(args.basket.clone())
            .with_tags(args.tags.clone(), args.tag_query_mode)
            .with_limit(limit)
            .with_offset(offset);
        let (total, page) = self.state()?.outputs.query(&filter);

        Ok(ListOutputsResult {
            total_outputs: total as u32,
            outputs: page
                .iter()
                .map(|o| {
                    o.to_wallet_output(
                        args.include_locking_scripts,
                        args.include_custom_instructions,
                        args.include_tags,
                    )
                })
                .collect(),
        })
    }

    async fn relinquish_output(
        &self,
        args: RelinquishOutputArgs,
    ) -> WalletResult<RelinquishOutputResult> {
        self.state()?.outputs.relinquish(&args.basket, &args.output)?;
        Ok(RelinquishOutputResult { relinquished: true })
    }

    async fn get_public_key(&self, args: GetPublicKeyArgs) -> WalletResult<GetPublicKeyResult> {
        self.check_failure("get_public_key")?;
        if args.identity_key {
            return Ok(GetPublicKeyResult {
                public_key: self.identity_key,
            });
        }
        let protocol_id = args
            .protocol_id
            .as_ref()
            .ok_or_else(|| WalletError::invalid_argument("protocolID", "required unless identityKey"))?;
        let key_id = args
            .key_id
            .as_deref()
            .ok_or_else(|| WalletError::invalid_argument("keyID", "required unless identityKey"))?;
        let invoice = invoice_number(protocol_id, key_id)?;
        let counterparty = self.resolve_counterparty(args.counterparty.unwrap_or_else(Counterparty::myself));

        Ok(GetPublicKeyResult {
            public_key: derive_public_key(&self.root_key, &counterparty, &invoice, args.for_self)?,
        })
    }

    async fn reveal_counterparty_key_linkage(
        &self,
        args: RevealCounterpartyKeyLinkageArgs,
    ) -> WalletResult<RevealCounterpartyKeyLinkageResult> {
        let linkage = shared_secret(&self.root_key, &args.counterparty)?.compress();
        let verifier_secret = shared_secret(&self.root_key, &args.verifier)?;
        let proof = sign(&self.root_key.scalar(), linkage.as_bytes());

        Ok(RevealCounterpartyKeyLinkageResult {
            prover: self.identity_key,
            verifier: args.verifier,
            counterparty: args.counterparty,
            revelation_time: unix_time(),
            encrypted_linkage: encrypt_for(&verifier_secret, "counterparty linkage", linkage.as_bytes())?,
            encrypted_linkage_proof: encrypt_for(&verifier_secret, "counterparty linkage proof", &proof)?,
        })
    }

    async fn reveal_specific_key_linkage(
        &self,
        args: RevealSpecificKeyLinkageArgs,
    ) -> WalletResult<RevealSpecificKeyLinkageResult> {
        let invoice = invoice_number(&args.protocol_id, &args.key_id)?;
        let linkage = specific_linkage(&self.root_key, &args.counterparty, &invoice)?;
        let verifier_secret = shared_secret(&self.root_key, &args.verifier)?;

        // Proof type 0: the linkage is revealed without a proof
        Ok(RevealSpecificKeyLinkageResult {
            prover: self.identity_key,
            verifier: args.verifier,
            counterparty: args.counterparty,
            protocol_id: args.protocol_id,
            key_id: args.key_id,
            encrypted_linkage: encrypt_for(&verifier_secret, "specific linkage", &linkage)?,
            encrypted_linkage_proof: encrypt_for(&verifier_secret, "specific linkage proof", &[0])?,
            proof_type: 0,
        })
    }

    async fn acquire_certificate(&self, args: AcquireCertificateArgs) -> WalletResult<Certificate> {
        if args.acquisition_protocol == AcquisitionProtocol::Issuance {
            return Err(WalletError::Unsupported(
                "certificate issuance requires a certifier service".to_string(),
            ));
        }
        let serial_number = args
            .serial_number
            .ok_or_else(|| WalletError::invalid_argument("serialNumber", "required for direct acquisition"))?;
        let signature = args
            .signature
            .ok_or_else(|| WalletError::invalid_argument("signature", "required for direct acquisition"))?;

        let certificate = Certificate {
            certificate_type: args.certificate_type,
            serial_number,
            subject: self.identity_key,
            certifier: args.certifier,
            revocation_outpoint: args.revocation_outpoint,
            fields: args.fields,
            signature,
        };
        let mut state = self.state()?;
        match Self::find_certificate(
            &state,
            &certificate.certificate_type,
            &certificate.serial_number,
            &certificate.certifier,
        ) {
            Some(existing) => state.certificates[existing] = certificate.clone(),
            None => state.certificates.push(certificate.clone()),
        }
        Ok(certificate)
    }

    async fn list_certificates(
        &self,
        args: ListCertificatesArgs,
    ) -> WalletResult<ListCertificatesResult> {
        let (limit, offset) = page_bounds(args.limit, args.offset);
        let state = self.state()?;
        let matching: Vec<&Certificate> = state
            .certificates
            .iter()
            .filter(|c| args.certifiers.is_empty() || args.certifiers.contains(&c.certifier))
            .filter(|c| args.types.is_empty() || args.types.contains(&c.certificate_type))
            .collect();
        Ok(ListCertificatesResult {
            total_certificates: matching.len() as u32,
            certificates: matching.into_iter().skip(offset).take(limit).cloned().collect(),
        })
    }

    async fn prove_certificate(
        &self,
        args: ProveCertificateArgs,
    ) -> WalletResult<ProveCertificateResult> {
        let certificate = {
            let state = self.state()?;
            let index = Self::find_certificate(
                &state,
                &args.certificate.certificate_type,
                &args.certificate.serial_number,
                &args.certificate.certifier,
            )
            .ok_or_else(|| {
                WalletError::NotFound(format!("certificate {}", args.certificate.serial_number))
            })?;
            state.certificates[index].clone()
        };

        let verifier_secret = shared_secret(&self.root_key, &args.verifier)?;
        let mut keyring_for_verifier = BTreeMap::new();
        for field in &args.fields_to_reveal {
            let value = certificate.fields.get(field).ok_or_else(|| {
                WalletError::invalid_argument("fieldsToReveal", format!("certificate has no field '{field}'"))
            })?;
            let context = format!("certificate field {} {}", certificate.serial_number, field);
            let sealed = encrypt_for(&verifier_secret, &context, value.as_bytes())?;
            keyring_for_verifier.insert(field.clone(), STANDARD.encode(sealed));
        }
        Ok(ProveCertificateResult {
            keyring_for_verifier,
        })
    }

    async fn relinquish_certificate(
        &self,
        args: RelinquishCertificateArgs,
    ) -> WalletResult<RelinquishCertificateResult> {
        let mut state = self.state()?;
        let index = Self::find_certificate(
            &state,
            &args.certificate_type,
            &args.serial_number,
            &args.certifier,
        )
        .ok_or_else(|| WalletError::NotFound(format!("certificate {}", args.serial_number)))?;
        state.certificates.remove(index);
        Ok(RelinquishCertificateResult { relinquished: true })
    }

    // Discovery only sees certificates held by this wallet; there is no overlay lookup.
    async fn discover_by_identity_key(
        &self,
        args: DiscoverByIdentityKeyArgs,
    ) -> WalletResult<DiscoverCertificatesResult> {
        let state = self.state()?;
        Ok(Self::identity_certificates(
            state.certificates.iter().filter(|c| c.subject == args.identity_key),
            args.limit,
            args.offset,
        ))
    }

    async fn discover_by_attributes(
        &self,
        args: DiscoverByAttributesArgs,
    ) -> WalletResult<DiscoverCertificatesResult> {
        let state = self.state()?;
        Ok(Self::identity_certificates(
            state
                .certificates
                .iter()
                .filter(|c| c.matches_attributes(&args.attributes)),
            args.limit,
            args.offset,
        ))
    }

    async fn get_network(&self) -> WalletResult<GetNetworkResult> {
        Ok(GetNetworkResult {
            network: self.network,
        })
    }

    async fn get_height(&self) -> WalletResult<GetHeightResult> {
        Ok(GetHeightResult {
            height: self.state()?.height,
        })
    }

    async fn get_version(&self) -> WalletResult<GetVersionResult> {
        Ok(GetVersionResult {
            version: MEMORY_WALLET_VERSION.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::encryption::decrypt_from;

    fn payee_output(script: &LockingScript, satoshis: u64) -> CreateActionOutput {
        CreateActionOutput::new(script.to_hex(), satoshis, "payment")
    }

    fn create_args(outputs: Vec<CreateActionOutput>) -> CreateActionArgs {
        CreateActionArgs {
            description: "test".to_string(),
            input_beef: None,
            inputs: Vec::new(),
            outputs,
            lock_time: None,
            version: None,
            labels: vec!["test".to_string()],
            options: CreateActionOptions {
                randomize_outputs: false,
                ..Default::default()
            },
        }
    }

    #[tokio::test]
    async fn test_create_action_signs_and_tracks_change() {
        let wallet = MemoryWallet::new(Network::Test);
        wallet.fund(10_000).unwrap();
        let other = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());

        let result = wallet
            .create_action(create_args(vec![payee_output(&other, 1000)]))
            .await
            .unwrap();
        assert!(result.txid.is_some());
        assert!(result.signable_transaction.is_none());

        let tx = MemoryTransaction::from_beef(&result.tx.unwrap()).unwrap();
        assert_eq!(tx.outputs[0].satoshis, 1000);
        assert_eq!(tx.outputs[0].locking_script, other);
        assert!(tx.is_fully_unlocked());
        assert_eq!(wallet.balance().unwrap(), 10_000 - 1000 - DEFAULT_FEE_SATOSHIS);
    }

    #[tokio::test]
    async fn test_insufficient_funds_reserves_nothing() {
        let wallet = MemoryWallet::new(Network::Test);
        wallet.fund(500).unwrap();
        let other = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());

        let err = wallet
            .create_action(create_args(vec![payee_output(&other, 1000)]))
            .await
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds(_)));
        assert_eq!(wallet.balance().unwrap(), 500);
    }

    #[tokio::test]
    async fn test_signable_round_trip_and_reference_reuse() {
        let wallet = MemoryWallet::new(Network::Test);
        wallet.fund(5000).unwrap();
        let other = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());
        let mut args = create_args(vec![payee_output(&other, 1000)]);
        args.options.sign_and_process = false;

        let created = wallet.create_action(args).await.unwrap();
        let reference = created.signable_transaction.unwrap().reference;
        assert_eq!(wallet.balance().unwrap(), 0);

        let signed = wallet
            .sign_action(SignActionArgs {
                reference: reference.clone(),
                spends: Default::default(),
            })
            .await
            .unwrap();
        assert_eq!(signed.txid.len(), 64);

        let again = wallet
            .sign_action(SignActionArgs {
                reference: reference.clone(),
                spends: Default::default(),
            })
            .await;
        assert!(matches!(again, Err(WalletError::UnknownReference(_))));
        let abort = wallet.abort_action(AbortActionArgs { reference }).await;
        assert!(matches!(abort, Err(WalletError::UnknownReference(_))));
    }

    #[tokio::test]
    async fn test_abort_releases_inputs() {
        let wallet = MemoryWallet::new(Network::Test);
        wallet.fund(5000).unwrap();
        let other = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());
        let mut args = create_args(vec![payee_output(&other, 1000)]);
        args.options.sign_and_process = false;

        let reference = wallet
            .create_action(args)
            .await
            .unwrap()
            .signable_transaction
            .unwrap()
            .reference;
        let aborted = wallet
            .abort_action(AbortActionArgs { reference })
            .await
            .unwrap();
        assert!(aborted.aborted);
        assert_eq!(wallet.balance().unwrap(), 5000);

        let listed = wallet
            .list_actions(ListActionsArgs {
                labels: vec!["test".to_string()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(listed.actions[0].status, ActionStatus::Aborted);
        assert!(listed.actions[0].outputs.is_empty());
    }

    #[tokio::test]
    async fn test_deferred_input_needs_spend() {
        let wallet = MemoryWallet::new(Network::Test);
        let funding = wallet.fund(5000).unwrap();
        let other = LockingScript::pay_to_public_key_hash(&PrivateKey::random().public_key());
        let mut args = create_args(vec![payee_output(&other, 1000)]);
        args.inputs
            .push(CreateActionInput::deferred(funding, 98, "cooperative input"));

        let reference = wallet
            .create_action(args)
            .await
            .unwrap()
            .signable_transaction
            .unwrap()
            .reference;

        let missing = wallet
            .sign_action(SignActionArgs {
                reference: reference.clone(),
                spends: Default::default(),
            })
            .await;
        assert!(matches!(missing, Err(WalletError::InvalidArgument { .. })));

        let mut spends = std::collections::BTreeMap::new();
        spends.insert(
            0,
            SignActionSpend {
                unlocking_script: "00".repeat(98),
                sequence_number: None,
            },
        );
        assert!(wallet
            .sign_action(SignActionArgs { reference, spends })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_internalize_wallet_payment() {
        let payer = MemoryWallet::new(Network::Test);
        let payee = MemoryWallet::new(Network::Test);
        payer.fund(10_000).unwrap();

        let derived = payer
            .get_public_key(GetPublicKeyArgs {
                protocol_id: Some(wallet_payment_protocol()),
                key_id: Some(key_id("cHJlZml4", "c3VmZml4")),
                counterparty: Some(Counterparty::Key(payee.identity_key())),
                ..Default::default()
            })
            .await
            .unwrap()
            .public_key;
        let script = LockingScript::pay_to_public_key_hash(&derived);
        let tx = payer
            .create_action(create_args(vec![payee_output(&script, 2500)]))
            .await
            .unwrap()
            .tx
            .unwrap();

        let args = InternalizeActionArgs {
            tx: tx.clone(),
            outputs: vec![crate::data_structures::PaymentRemittance::wallet_payment(
                0,
                "cHJlZml4",
                "c3VmZml4",
                payer.identity_key(),
            )],
            description: "received".to_string(),
            labels: Vec::new(),
        };
        let first = payee.internalize_action(args.clone()).await.unwrap();
        assert!(first.accepted && !first.is_merge);
        assert_eq!(payee.balance().unwrap(), 2500);

        let second = payee.internalize_action(args).await.unwrap();
        assert!(second.is_merge);
        assert_eq!(payee.balance().unwrap(), 2500);

        // A different payee cannot claim it
        let stranger = MemoryWallet::new(Network::Test);
        let rejected = stranger
            .internalize_action(InternalizeActionArgs {
                tx,
                outputs: vec![crate::data_structures::PaymentRemittance::wallet_payment(
                    0,
                    "cHJlZml4",
                    "c3VmZml4",
                    payer.identity_key(),
                )],
                description: "received".to_string(),
                labels: Vec::new(),
            })
            .await;
        assert!(matches!(rejected, Err(WalletError::ClaimRejected { output_index: 0, .. })));
        assert_eq!(stranger.balance().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failure_mode_resets_after_use() {
        let wallet = MemoryWallet::new(Network::Main);
        wallet
            .set_failure_mode(MockFailureModes {
                fail_get_public_key: true,
                ..Default::default()
            })
            .unwrap();
        assert!(wallet.get_public_key(GetPublicKeyArgs::identity()).await.is_err());
        assert!(wallet.get_public_key(GetPublicKeyArgs::identity()).await.is_ok());
        assert!(!wallet.get_failure_modes().unwrap().fail_get_public_key);
    }

    #[tokio::test]
    async fn test_counterparty_linkage_readable_by_verifier() {
        let prover = MemoryWallet::new(Network::Test);
        let counterparty = PrivateKey::random().public_key();
        let verifier = PrivateKey::random();

        let revealed = prover
            .reveal_counterparty_key_linkage(RevealCounterpartyKeyLinkageArgs {
                counterparty,
                verifier: verifier.public_key(),
            })
            .await
            .unwrap();
        let secret = shared_secret(&verifier, &prover.identity_key()).unwrap();
        let linkage = decrypt_from(&secret, "counterparty linkage", &revealed.encrypted_linkage).unwrap();
        assert_eq!(linkage.len(), 32);
    }

    #[tokio::test]
    async fn test_certificate_lifecycle() {
        let wallet = MemoryWallet::new(Network::Test);
        let certifier = PrivateKey::random().public_key();
        let mut fields = std::collections::BTreeMap::new();
        fields.insert("email".to_string(), "a@example.com".to_string());

        let certificate = wallet
            .acquire_certificate(AcquireCertificateArgs {
                certificate_type: "ZW1haWw=".to_string(),
                certifier,
                acquisition_protocol: AcquisitionProtocol::Direct,
                fields: fields.clone(),
                serial_number: Some("c2VyaWFs".to_string()),
                revocation_outpoint: None,
                signature: Some("00".to_string()),
                certifier_url: None,
            })
            .await
            .unwrap();
        assert_eq!(certificate.subject, wallet.identity_key());

        let found = wallet
            .discover_by_attributes(DiscoverByAttributesArgs {
                attributes: fields,
                limit: None,
                offset: None,
            })
            .await
            .unwrap();
        assert_eq!(found.total_certificates, 1);

        let proof = wallet
            .prove_certificate(ProveCertificateArgs {
                certificate: certificate.clone(),
                fields_to_reveal: vec!["email".to_string()],
                verifier: PrivateKey::random().public_key(),
            })
            .await
            .unwrap();
        assert!(proof.keyring_for_verifier.contains_key("email"));

        wallet
            .relinquish_certificate(RelinquishCertificateArgs {
                certificate_type: certificate.certificate_type,
                serial_number: certificate.serial_number,
                certifier,
            })
            .await
            .unwrap();
        let listed = wallet
            .list_certificates(ListCertificatesArgs::default())
            .await
            .unwrap();
        assert_eq!(listed.total_certificates, 0);
    }
}
