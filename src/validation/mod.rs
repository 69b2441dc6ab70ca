//! Preconditions checked before any value moves between endpoints

pub mod network_guard;

pub use network_guard::NetworkGuard;
