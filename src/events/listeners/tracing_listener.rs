//! Writes handoff events to the `tracing` subscriber

use std::error::Error;

use async_trait::async_trait;
use tracing::{error, info};

use crate::events::{HandoffEvent, HandoffEventListener};

/// Logs every handoff event; failures at `error`, the rest at `info`
#[derive(Debug, Clone, Default)]
pub struct TracingListener {
    include_stages: bool,
}

impl TracingListener {
    pub fn new() -> Self {
        Self {
            include_stages: true,
        }
    }

    /// Only log completion and failure
    pub fn outcomes_only() -> Self {
        Self {
            include_stages: false,
        }
    }
}

#[async_trait]
impl HandoffEventListener for TracingListener {
    async fn handle_event(
        &mut self,
        event: &HandoffEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        match event {
            HandoffEvent::StageReached {
                handoff_id, stage, ..
            } => info!(handoff = %handoff_id, %stage, "handoff stage reached"),
            HandoffEvent::HandoffFailed {
                handoff_id,
                stage,
                kind,
                message,
                ..
            } => error!(
                handoff = %handoff_id,
                last_stage = %stage,
                %kind,
                %message,
                "handoff failed"
            ),
            HandoffEvent::HandoffCompleted {
                handoff_id,
                txid,
                amount,
                is_merge,
                ..
            } => info!(
                handoff = %handoff_id,
                %txid,
                amount,
                is_merge,
                "handoff completed"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "TracingListener"
    }

    fn wants_event(&self, event: &HandoffEvent) -> bool {
        self.include_stages || !matches!(event, HandoffEvent::StageReached { .. })
    }
}
