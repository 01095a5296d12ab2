//! Router Types
//!
//! Transient routing values (`Route`, `Hop`, `Mechanism`), the persistent
//! per-asset oracle record, and the request/response shapes of the boundary
//! operations.

use lib_types::{Address, Amount, BlockHeight, PoolId, TokenId};
use serde::{Deserialize, Serialize};

use crate::math::FixedU128;

/// Liquidity mechanism chosen for a single hop
///
/// The set is closed: every dispatch site matches both variants exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mechanism {
    /// Constant-product pool swap through the referenced pool
    PoolSwap { pool_id: PoolId },
    /// Mint the anchor asset from the foreign asset's minting curve
    CurveMint,
}

impl Mechanism {
    /// `CurveMint` is only legal from a non-anchor asset into the anchor.
    pub fn is_legal(&self, from: &TokenId, to: &TokenId, anchor: &TokenId) -> bool {
        match self {
            Mechanism::PoolSwap { .. } => true,
            Mechanism::CurveMint => from != anchor && to == anchor,
        }
    }
}

impl std::fmt::Display for Mechanism {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mechanism::PoolSwap { pool_id } => write!(f, "pool_swap({})", pool_id),
            Mechanism::CurveMint => write!(f, "curve_mint"),
        }
    }
}

/// One step of a route
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hop {
    pub from: TokenId,
    pub to: TokenId,
    pub mechanism: Mechanism,
    /// Input amount the quote was computed for
    pub amount_in: Amount,
    /// Quoted output of this hop
    pub expected_output: Amount,
}

/// An ordered path plus the hop-by-hop mechanism choices
///
/// # Invariants
/// - `hops.len() == path.len() - 1`
/// - `hops[i].from == path[i]` and `hops[i].to == path[i + 1]`
/// - `expected_output == hops.last().expected_output`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub path: Vec<TokenId>,
    pub hops: Vec<Hop>,
    pub expected_output: Amount,
}

impl Route {
    /// Input of the first hop, zero for an empty route
    pub fn amount_in(&self) -> Amount {
        self.hops.first().map(|h| h.amount_in).unwrap_or(0)
    }

    pub fn uses_curve(&self) -> bool {
        self.hops
            .iter()
            .any(|h| matches!(h.mechanism, Mechanism::CurveMint))
    }

    /// Check the structural invariants of the route
    pub fn is_consistent(&self) -> bool {
        if self.path.len() < 2 || self.hops.len() != self.path.len() - 1 {
            return false;
        }
        let linked = self
            .hops
            .iter()
            .zip(self.path.windows(2))
            .all(|(hop, pair)| hop.from == pair[0] && hop.to == pair[1]);
        let chained = self
            .hops
            .windows(2)
            .all(|pair| pair[1].amount_in == pair[0].expected_output);
        let total_matches = self
            .hops
            .last()
            .map(|h| h.expected_output == self.expected_output)
            .unwrap_or(false);
        linked && chained && total_matches
    }
}

/// Persistent oracle record for one non-anchor asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPriceState {
    /// Decayed estimate in anchor units per unit of asset
    pub price: FixedU128,
    /// Total liquidity weight of the last snapshot
    pub liquidity_weight: Amount,
    /// Block of the last update
    pub last_update: BlockHeight,
}

/// Caller-supplied swap parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    pub who: Address,
    pub from: TokenId,
    pub to: TokenId,
    pub amount_in: Amount,
    pub min_amount_out: Amount,
    /// Last block at which the swap may execute
    pub deadline: BlockHeight,
}

/// Settled swap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapOutcome {
    pub amount_in: Amount,
    pub router_fee: Amount,
    pub amount_out: Amount,
    pub route: Route,
}

/// Read-only swap estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub amount_in: Amount,
    pub router_fee: Amount,
    pub expected_output: Amount,
    pub route: Route,
}
