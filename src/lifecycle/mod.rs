//! Action lifecycle: creation, cooperative signing, commit or abort

pub mod manager;
pub mod spec;

pub use manager::{ActionFilter, ActionLifecycleManager};
pub use spec::ActionSpec;
