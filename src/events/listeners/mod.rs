//! Built-in handoff event listeners

pub mod recording;
pub mod tracing_listener;

pub use recording::RecordingListener;
pub use tracing_listener::TracingListener;
