//! Reference collaborators for tests and local simulation
//!
//! `TestRuntime` hosts every capability the router consumes on top of one
//! checkpointed in-memory state: a multi-asset ledger, constant-product pools,
//! linear minting curves and router storage.

pub mod curve;
pub mod pool;
pub mod runtime;

pub use curve::{LinearMintCurve, MintQuote};
pub use pool::{derive_pool_id, ConstantProductPool, POOL_ID_DOMAIN};
pub use runtime::TestRuntime;
