//! Router Events
//!
//! Every committed state change of the router emits an event. Events from a
//! rolled-back swap are never emitted.

use lib_types::{Address, Amount, BlockHeight, TokenId};
use serde::{Deserialize, Serialize};

use crate::math::FixedU128;
use crate::types::Mechanism;

/// Router events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum RouterEvent {
    /// Swap settled
    SwapExecuted {
        who: Address,
        from: TokenId,
        to: TokenId,
        /// Amount debited from the caller, including the router fee
        amount_in: Amount,
        router_fee: Amount,
        amount_out: Amount,
        path: Vec<TokenId>,
        mechanisms: Vec<Mechanism>,
        block_height: BlockHeight,
    },

    /// Oracle estimate refreshed
    PriceUpdated {
        asset: TokenId,
        price: FixedU128,
        liquidity_weight: Amount,
        block_height: BlockHeight,
    },

    /// Fee buffer flushed and burned
    FeeBurned {
        /// Asset the fees were collected in
        asset: TokenId,
        /// Buffered amount flushed, in `asset` units
        flushed: Amount,
        /// Anchor amount destroyed
        burned: Amount,
        block_height: BlockHeight,
    },

    /// Conversion of a fee buffer failed; the buffer is kept for a retry
    FeeConversionDeferred {
        asset: TokenId,
        buffered: Amount,
        reason: String,
        block_height: BlockHeight,
    },

    /// Router paused or unpaused by the admin
    PausedChanged { paused: bool },

    /// Router configuration changed by the admin
    ConfigUpdated {
        router_fee_bps: u16,
        max_price_deviation_bps: u16,
        oracle_half_life: BlockHeight,
    },
}

impl RouterEvent {
    /// Block height for events that carry one
    pub fn block_height(&self) -> Option<BlockHeight> {
        match self {
            RouterEvent::SwapExecuted { block_height, .. } => Some(*block_height),
            RouterEvent::PriceUpdated { block_height, .. } => Some(*block_height),
            RouterEvent::FeeBurned { block_height, .. } => Some(*block_height),
            RouterEvent::FeeConversionDeferred { block_height, .. } => Some(*block_height),
            RouterEvent::PausedChanged { .. } => None,
            RouterEvent::ConfigUpdated { .. } => None,
        }
    }

    /// Get event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            RouterEvent::SwapExecuted { .. } => "swap_executed",
            RouterEvent::PriceUpdated { .. } => "price_updated",
            RouterEvent::FeeBurned { .. } => "fee_burned",
            RouterEvent::FeeConversionDeferred { .. } => "fee_conversion_deferred",
            RouterEvent::PausedChanged { .. } => "paused_changed",
            RouterEvent::ConfigUpdated { .. } => "config_updated",
        }
    }
}
