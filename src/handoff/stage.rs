//! Handoff state machine stages and transfer direction

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::HandoffError;

/// Stages of a handoff in the order they complete. A failed handoff stays at
/// the last stage it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandoffStage {
    Idle,
    EndpointsValidated,
    KeyDerived,
    FundingActionCreated,
    TransactionExchanged,
    Internalized,
}

impl HandoffStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandoffStage::Idle => "idle",
            HandoffStage::EndpointsValidated => "endpointsValidated",
            HandoffStage::KeyDerived => "keyDerived",
            HandoffStage::FundingActionCreated => "fundingActionCreated",
            HandoffStage::TransactionExchanged => "transactionExchanged",
            HandoffStage::Internalized => "internalized",
        }
    }

    pub fn is_complete(&self) -> bool {
        *self == HandoffStage::Internalized
    }
}

impl fmt::Display for HandoffStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which side of a transfer the local endpoint is on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandoffDirection {
    /// Local endpoint pays the remote endpoint
    Export,
    /// Remote endpoint pays the local endpoint
    Import,
}

impl fmt::Display for HandoffDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandoffDirection::Export => write!(f, "export"),
            HandoffDirection::Import => write!(f, "import"),
        }
    }
}

impl FromStr for HandoffDirection {
    type Err = HandoffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "export" => Ok(HandoffDirection::Export),
            "import" => Ok(HandoffDirection::Import),
            other => Err(HandoffError::InvalidSpec(format!(
                "direction must be 'export' or 'import', got '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert!(HandoffStage::Idle < HandoffStage::EndpointsValidated);
        assert!(HandoffStage::EndpointsValidated < HandoffStage::KeyDerived);
        assert!(HandoffStage::TransactionExchanged < HandoffStage::Internalized);
        assert_eq!(HandoffStage::FundingActionCreated.to_string(), "fundingActionCreated");
        assert_eq!(
            serde_json::to_string(&HandoffStage::KeyDerived).unwrap(),
            "\"keyDerived\""
        );
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("Import".parse::<HandoffDirection>().unwrap(), HandoffDirection::Import);
        assert!("sideways".parse::<HandoffDirection>().is_err());
    }
}
