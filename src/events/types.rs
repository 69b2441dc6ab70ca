//! Event types emitted while a handoff progresses

use std::time::SystemTime;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{errors::ErrorKind, handoff::HandoffStage};

/// Common metadata for all handoff events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique identifier for this event
    pub event_id: String,
    pub timestamp: SystemTime,
    /// Handoff the event belongs to
    pub correlation_id: Option<String>,
    /// Component that emitted the event
    pub source: String,
}

impl EventMetadata {
    pub fn new(source: &str) -> Self {
        Self {
            event_id: random_event_id(),
            timestamp: SystemTime::now(),
            correlation_id: None,
            source: source.to_string(),
        }
    }

    pub fn with_correlation(source: &str, correlation_id: String) -> Self {
        Self {
            correlation_id: Some(correlation_id),
            ..Self::new(source)
        }
    }
}

fn random_event_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Events emitted by the handoff orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HandoffEvent {
    /// A stage of the handoff state machine completed
    StageReached {
        metadata: EventMetadata,
        handoff_id: String,
        stage: HandoffStage,
    },
    /// The handoff stopped; `stage` is the last one that completed
    HandoffFailed {
        metadata: EventMetadata,
        handoff_id: String,
        stage: HandoffStage,
        kind: ErrorKind,
        message: String,
    },
    /// The payee accepted the transaction
    HandoffCompleted {
        metadata: EventMetadata,
        handoff_id: String,
        txid: String,
        amount: u64,
        is_merge: bool,
    },
}

impl HandoffEvent {
    pub fn stage_reached(handoff_id: &str, stage: HandoffStage) -> Self {
        HandoffEvent::StageReached {
            metadata: EventMetadata::with_correlation("handoff", handoff_id.to_string()),
            handoff_id: handoff_id.to_string(),
            stage,
        }
    }

    pub fn failed(handoff_id: &str, stage: HandoffStage, kind: ErrorKind, message: String) -> Self {
        HandoffEvent::HandoffFailed {
            metadata: EventMetadata::with_correlation("handoff", handoff_id.to_string()),
            handoff_id: handoff_id.to_string(),
            stage,
            kind,
            message,
        }
    }

    pub fn completed(handoff_id: &str, txid: &str, amount: u64, is_merge: bool) -> Self {
        HandoffEvent::HandoffCompleted {
            metadata: EventMetadata::with_correlation("handoff", handoff_id.to_string()),
            handoff_id: handoff_id.to_string(),
            txid: txid.to_string(),
            amount,
            is_merge,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            HandoffEvent::StageReached { .. } => "StageReached",
            HandoffEvent::HandoffFailed { .. } => "HandoffFailed",
            HandoffEvent::HandoffCompleted { .. } => "HandoffCompleted",
        }
    }

    pub fn metadata(&self) -> &EventMetadata {
        match self {
            HandoffEvent::StageReached { metadata, .. }
            | HandoffEvent::HandoffFailed { metadata, .. }
            | HandoffEvent::HandoffCompleted { metadata, .. } => metadata,
        }
    }

    pub fn handoff_id(&self) -> &str {
        match self {
            HandoffEvent::StageReached { handoff_id, .. }
            | HandoffEvent::HandoffFailed { handoff_id, .. }
            | HandoffEvent::HandoffCompleted { handoff_id, .. } => handoff_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_carry_correlation() {
        let event = HandoffEvent::stage_reached("h1", HandoffStage::KeyDerived);
        assert_eq!(event.event_type(), "StageReached");
        assert_eq!(event.handoff_id(), "h1");
        assert_eq!(event.metadata().correlation_id.as_deref(), Some("h1"));
        assert_eq!(event.metadata().event_id.len(), 32);
    }

    #[test]
    fn test_event_ids_are_unique() {
        let a = EventMetadata::new("handoff");
        let b = EventMetadata::new("handoff");
        assert_ne!(a.event_id, b.event_id);
    }
}
