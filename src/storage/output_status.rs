use serde::{Deserialize, Serialize};

/// Output status enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputStatus {
    Spendable = 0,
    /// Held as an input of a signable action
    Reserved = 1,
    Spent = 2,
    Relinquished = 3,
}

impl OutputStatus {
    pub fn is_spendable(&self) -> bool {
        matches!(self, OutputStatus::Spendable)
    }
}

impl From<u32> for OutputStatus {
    fn from(value: u32) -> Self {
        match value {
            0 => OutputStatus::Spendable,
            1 => OutputStatus::Reserved,
            2 => OutputStatus::Spent,
            3 => OutputStatus::Relinquished,
            _ => OutputStatus::Spent,
        }
    }
}

impl From<OutputStatus> for u32 {
    fn from(status: OutputStatus) -> Self {
        status as u32
    }
}
