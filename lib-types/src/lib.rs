//! Router primitives.
//! Stable, protocol-neutral, behavior-free.
//!
//! Rule: No String identifiers in router state. Ever.

pub mod primitives;

pub use primitives::{Address, Amount, BlockHeight, Bps, ParseIdError, PoolId, TokenId};
