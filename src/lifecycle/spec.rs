//! Builder for the intent behind a new Action

use crate::{
    data_structures::AtomicBeef,
    errors::{HandoffError, HandoffResult},
    interface::{CreateActionArgs, CreateActionInput, CreateActionOptions, CreateActionOutput},
};

/// Everything needed to ask a wallet for a new Action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub description: String,
    pub input_beef: Option<AtomicBeef>,
    pub inputs: Vec<CreateActionInput>,
    pub outputs: Vec<CreateActionOutput>,
    pub lock_time: Option<u32>,
    pub version: Option<u32>,
    pub labels: Vec<String>,
    pub options: CreateActionOptions,
}

impl ActionSpec {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            input_beef: None,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: None,
            version: None,
            labels: Vec::new(),
            options: CreateActionOptions::default(),
        }
    }

    pub fn with_input(mut self, input: CreateActionInput) -> Self {
        self.inputs.push(input);
        self
    }

    /// Transaction data proving the inputs, when they are not the wallet's own
    pub fn with_input_beef(mut self, beef: AtomicBeef) -> Self {
        self.input_beef = Some(beef);
        self
    }

    pub fn with_output(mut self, output: CreateActionOutput) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.labels.push(label.into());
        self
    }

    pub fn with_lock_time(mut self, lock_time: u32) -> Self {
        self.lock_time = Some(lock_time);
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_options(mut self, options: CreateActionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sign_and_process(mut self, enabled: bool) -> Self {
        self.options.sign_and_process = enabled;
        self
    }

    pub fn randomize_outputs(mut self, enabled: bool) -> Self {
        self.options.randomize_outputs = enabled;
        self
    }

    pub fn no_send(mut self, enabled: bool) -> Self {
        self.options.no_send = enabled;
        self
    }

    pub fn accept_delayed_broadcast(mut self, enabled: bool) -> Self {
        self.options.accept_delayed_broadcast = enabled;
        self
    }

    pub fn return_txid_only(mut self, enabled: bool) -> Self {
        self.options.return_txid_only = enabled;
        self
    }

    pub fn with_known_txid(mut self, txid: impl Into<String>) -> Self {
        self.options.known_txids.push(txid.into());
        self
    }

    /// Reject requests a wallet could never turn into an Action
    pub fn validate(&self) -> HandoffResult<()> {
        if self.description.trim().is_empty() {
            return Err(HandoffError::InvalidSpec(
                "action description must not be empty".to_string(),
            ));
        }
        if self.inputs.is_empty() && self.outputs.is_empty() {
            return Err(HandoffError::InvalidSpec(
                "an action needs at least one input or output".to_string(),
            ));
        }
        if let Some(output) = self.outputs.iter().find(|o| o.satoshis == 0) {
            return Err(HandoffError::InvalidSpec(format!(
                "output '{}' carries no value",
                output.output_description
            )));
        }
        Ok(())
    }

    pub(crate) fn to_args(&self) -> CreateActionArgs {
        CreateActionArgs {
            description: self.description.clone(),
            input_beef: self.input_beef.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            lock_time: self.lock_time,
            version: self.version,
            labels: self.labels.clone(),
            options: self.options.clone(),
        }
    }
}
