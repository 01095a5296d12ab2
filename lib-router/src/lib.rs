//! Anchor Swap Router
//!
//! Deterministic swap routing between two liquidity mechanisms for one anchor
//! asset:
//!
//! - **Pools**: constant-product pools for any asset pair
//! - **Curve**: one-directional minting curves issuing the anchor for a
//!   foreign asset
//!
//! For every hop the router takes whichever mechanism yields more output.
//! Trades are validated against a half-life-decayed, liquidity-weighted price
//! oracle and executed atomically. A share of every input is retained as a
//! router fee, buffered per asset, converted to the anchor and burned.
//!
//! # Architecture
//!
//! - [`selector`]: path and per-hop mechanism selection
//! - [`oracle`]: decayed TVL-weighted price estimates
//! - [`fee_manager`]: fee buffering, conversion and burning
//! - [`engine`]: the `Router` and its swap state machine
//!
//! Collaborators (pools, curves, ledger, storage, transactions, events) are
//! injected through the traits in [`capabilities`]. [`testing::TestRuntime`]
//! implements all of them in memory.

pub mod capabilities;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod fee_manager;
pub mod math;
pub mod oracle;
pub mod selector;
pub mod store;
pub mod testing;
pub mod types;

pub use capabilities::{
    with_transaction, AnchorConverter, AssetLedger, Capabilities, EventSink, MintingCurve, PoolAnchorConverter,
    PoolLiquidity, PoolQuote, PoolReserves, RouterStore, Transactional,
};
pub use config::{RouterConfig, RouterConfigUpdate};
pub use engine::{check_price_deviation, Router, SwapStage};
pub use errors::{RouterError, RouterResult};
pub use events::RouterEvent;
pub use fee_manager::{FeeManager, FeeOutcome};
pub use math::{FixedU128, PRECISION};
pub use oracle::{decay_weight, PriceOracle, PriceSnapshot};
pub use selector::PathSelector;
pub use store::{InMemoryRouterStore, RouterState};
pub use types::{Hop, Mechanism, Route, SwapOutcome, SwapQuote, SwapRequest, TokenPriceState};

pub use lib_types::{Address, Amount, BlockHeight, Bps, PoolId, TokenId};

/// Default router fee (0.5%)
pub const DEFAULT_ROUTER_FEE_BPS: Bps = 50;

/// Default maximum route deviation from the oracle rate (20%)
pub const DEFAULT_MAX_PRICE_DEVIATION_BPS: Bps = 2_000;

/// Default oracle half-life in blocks
pub const DEFAULT_ORACLE_HALF_LIFE: BlockHeight = 100;

/// Upper bound accepted for `router_fee_bps` (10%)
pub const MAX_ROUTER_FEE_BPS: Bps = 1_000;

/// Upper bound accepted for `max_price_deviation_bps` (100%)
pub const MAX_PRICE_DEVIATION_BPS: Bps = 10_000;

/// Fee buffer size that triggers a flush, in base units of the buffered asset
pub const MIN_BURN_THRESHOLD: Amount = 1_000;

/// Fee conversions must return at least the oracle value less this (2%)
pub const CONVERSION_SLIPPAGE_TOLERANCE_BPS: Bps = 200;

/// Halvings after which an oracle observation carries no weight
pub const MAX_HALVINGS: u64 = 40;

/// A stored estimate is served while its decayed weight exceeds
/// `PRECISION / STALE_WEIGHT_DIVISOR`
pub const STALE_WEIGHT_DIVISOR: u128 = 8;
