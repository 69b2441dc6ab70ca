//! Captures handoff events in memory for inspection

use std::error::Error;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::events::{HandoffEvent, HandoffEventListener};
use crate::handoff::HandoffStage;

/// Keeps every received event. The shared handle from [`RecordingListener::events`]
/// stays readable after the listener is moved into a dispatcher.
#[derive(Debug, Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<HandoffEvent>>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Arc<Mutex<Vec<HandoffEvent>>> {
        Arc::clone(&self.events)
    }

    /// Stages reached so far, in order
    pub fn stages(&self) -> Vec<HandoffStage> {
        match self.events.lock() {
            Ok(events) => events
                .iter()
                .filter_map(|event| match event {
                    HandoffEvent::StageReached { stage, .. } => Some(*stage),
                    _ => None,
                })
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

#[async_trait]
impl HandoffEventListener for RecordingListener {
    async fn handle_event(
        &mut self,
        event: &HandoffEvent,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.events
            .lock()
            .map_err(|_| "recording listener poisoned")?
            .push(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "RecordingListener"
    }
}
