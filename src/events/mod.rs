//! Event system for handoff progress
//!
//! The orchestrator emits a [`HandoffEvent`] each time a stage completes and
//! once more on success or failure. Listeners registered with an
//! [`EventDispatcher`] receive them in registration order.
//!
//! Listener failures are isolated: they are logged and counted but never
//! interrupt the handoff or the remaining listeners.
//!
//! ```rust,no_run
//! use wallet_handoff_libs::events::{EventDispatcher, listeners::TracingListener};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut dispatcher = EventDispatcher::new();
//! dispatcher.register(Box::new(TracingListener::new()))?;
//! # Ok(())
//! # }
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

pub mod listeners;
pub mod types;

pub use types::*;

/// Reasons a listener cannot be registered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventDispatcherError {
    #[error("a listener named '{0}' is already registered")]
    DuplicateListener(String),
    #[error("listener limit of {limit} reached")]
    TooManyListeners { limit: usize },
    #[error("listener names must not be blank")]
    BlankListenerName,
}

/// Statistics about event processing
#[derive(Debug, Default, Clone)]
pub struct EventStats {
    pub total_events_dispatched: usize,
    pub total_listener_calls: usize,
    pub total_listener_errors: usize,
    pub total_processing_time: Duration,
    pub events_by_type: HashMap<String, usize>,
    pub errors_by_listener: HashMap<String, usize>,
}

/// Handles handoff events asynchronously
///
/// Errors returned from `handle_event` are logged by the dispatcher and do
/// not reach the orchestrator.
#[async_trait]
pub trait HandoffEventListener: Send + Sync {
    async fn handle_event(
        &mut self,
        event: &HandoffEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Name used for registration and logging; must be unique per dispatcher
    fn name(&self) -> &'static str {
        "UnnamedListener"
    }

    /// Skip events this listener has no interest in
    fn wants_event(&self, _event: &HandoffEvent) -> bool {
        true
    }
}

/// Delivers events to registered listeners in registration order
pub struct EventDispatcher {
    listeners: Vec<Box<dyn HandoffEventListener>>,
    registered_names: HashSet<String>,
    max_listeners: Option<usize>,
    stats: EventStats,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("listeners", &self.registered_names)
            .field("stats", &self.stats)
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            registered_names: HashSet::new(),
            max_listeners: None,
            stats: EventStats::default(),
        }
    }

    /// Create a dispatcher that refuses more than `max_listeners` listeners
    pub fn new_with_limit(max_listeners: usize) -> Self {
        Self {
            max_listeners: Some(max_listeners),
            ..Self::new()
        }
    }

    /// Add a listener. Names must be non-blank and unique.
    pub fn register(
        &mut self,
        listener: Box<dyn HandoffEventListener>,
    ) -> Result<(), EventDispatcherError> {
        let name = listener.name();
        if name.trim().is_empty() {
            return Err(EventDispatcherError::BlankListenerName);
        }
        if let Some(limit) = self.max_listeners.filter(|&l| self.listeners.len() >= l) {
            return Err(EventDispatcherError::TooManyListeners { limit });
        }
        if !self.registered_names.insert(name.to_string()) {
            return Err(EventDispatcherError::DuplicateListener(name.to_string()));
        }

        debug!(listener = name, "event listener registered");
        self.listeners.push(listener);
        Ok(())
    }

    /// Dispatch an event to every interested listener
    pub async fn dispatch(&mut self, event: HandoffEvent) {
        let started = Instant::now();
        let event_type = event.event_type();
        let stats = &mut self.stats;
        stats.total_events_dispatched += 1;
        *stats.events_by_type.entry(event_type.to_string()).or_default() += 1;

        for listener in self.listeners.iter_mut().filter(|l| l.wants_event(&event)) {
            stats.total_listener_calls += 1;
            if let Err(e) = listener.handle_event(&event).await {
                stats.total_listener_errors += 1;
                *stats
                    .errors_by_listener
                    .entry(listener.name().to_string())
                    .or_default() += 1;
                warn!(listener = listener.name(), event = event_type, error = %e, "event listener failed");
            }
        }

        stats.total_processing_time += started.elapsed();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn has_listener(&self, name: &str) -> bool {
        self.registered_names.contains(name)
    }

    pub fn get_stats(&self) -> &EventStats {
        &self.stats
    }
}
