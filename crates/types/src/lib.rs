pub mod address;
pub mod block;
pub mod chain;
pub mod codec;
pub mod consensus;
pub mod header;
pub mod snapshot;
pub mod tx;

pub use address::*;
pub use block::*;
pub use chain::*;
pub use consensus::*;
pub use header::*;
pub use snapshot::*;
