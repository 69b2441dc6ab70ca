//! Output storage backing the in-memory wallet
//!
//! Outputs move through [`OutputStatus`]: spendable, reserved by a signable
//! action, spent, or relinquished. Only the wallet's action handling mutates
//! that status.

pub mod output_status;
pub mod output_store;
pub mod stored_output;

pub use output_status::*;
pub use output_store::*;
pub use stored_output::*;
