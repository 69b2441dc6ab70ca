//! Cross-wallet payment handoff

pub mod orchestrator;
pub mod payload;
pub mod stage;

pub use orchestrator::{HandoffOrchestrator, HandoffProgress};
pub use payload::{HandoffPayload, HandoffReceipt, PAYLOAD_VERSION};
pub use stage::{HandoffDirection, HandoffStage};
