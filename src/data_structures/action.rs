//! Actions: proposed or completed value transfers inside a wallet

use serde::{Deserialize, Serialize};

use super::types::{AtomicBeef, Outpoint};

/// Status of an action. `Signed`, `Aborted` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    Unsigned,
    Signable,
    Signed,
    Aborted,
    Failed,
}

impl ActionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActionStatus::Signed | ActionStatus::Aborted | ActionStatus::Failed
        )
    }

    /// Whether the state machine allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: ActionStatus) -> bool {
        use ActionStatus::*;
        matches!(
            (self, next),
            (Unsigned, Signable)
                | (Unsigned, Signed)
                | (Unsigned, Failed)
                | (Signable, Signed)
                | (Signable, Aborted)
                | (Signable, Failed)
        )
    }
}

impl std::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionStatus::Unsigned => "unsigned",
            ActionStatus::Signable => "signable",
            ActionStatus::Signed => "signed",
            ActionStatus::Aborted => "aborted",
            ActionStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionInput {
    pub source_outpoint: Outpoint,
    pub source_satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_locking_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unlocking_script: Option<String>,
    pub input_description: String,
    pub sequence_number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutput {
    pub output_index: u32,
    pub satoshis: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locking_script: Option<String>,
    pub spendable: bool,
    pub output_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basket: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_instructions: Option<String>,
}

/// A proposed or finalized value transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    /// Correlation id while the action awaits cooperative signing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub status: ActionStatus,
    pub description: String,
    /// Net value change for the wallet
    pub satoshis: i64,
    pub is_outgoing: bool,
    #[serde(default)]
    pub inputs: Vec<ActionInput>,
    #[serde(default)]
    pub outputs: Vec<ActionOutput>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub lock_time: u32,
    pub version: u32,
    /// Final (signed) or unsigned transaction bytes, when the wallet returned them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx: Option<AtomicBeef>,
}

impl Action {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Sum of all output values
    pub fn total_output_satoshis(&self) -> u64 {
        self.outputs.iter().map(|o| o.satoshis).sum()
    }
}
