//! Genesis header relay.
//!
//! Waits for the source chain to finalize the block a committee starts
//! from, packages that block with the committee's boundary block and
//! membership, and hands the result to the destination chain's
//! header-sync contract exactly once. Also reads the destination chain's
//! consensus configuration and peer pool.

pub mod assembler;
pub mod error;
pub mod flow;
pub mod introspection;
pub mod submitter;
pub mod waiter;

#[cfg(test)]
mod mock;

pub use assembler::assemble;
pub use error::{RelayError, Result, SubmitError};
pub use flow::GenesisSync;
pub use introspection::ConsensusInspector;
pub use submitter::{is_already_initialized, BootstrapResult, BootstrapSubmitter};
pub use waiter::{never_cancelled, wait_for_height, CancelSignal, ReadyHead, WaitPolicy};
