//! Router Errors

use lib_types::{Amount, BlockHeight, Bps, PoolId, TokenId};
use thiserror::Error;

use crate::math::FixedU128;

/// Error during router operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RouterError {
    #[error("No route found from {from} to {to}")]
    NoRouteFound { from: TokenId, to: TokenId },

    #[error("Source and destination assets are identical")]
    IdenticalAssets,

    #[error("Zero amount not allowed")]
    ZeroAmount,

    #[error("Deadline passed: current block {now}, deadline {deadline}")]
    DeadlinePassed { now: BlockHeight, deadline: BlockHeight },

    #[error(
        "Excessive price deviation: route rate {actual}, oracle rate {expected}, max {max_deviation_bps} bps"
    )]
    ExcessivePriceDeviation {
        expected: FixedU128,
        actual: FixedU128,
        max_deviation_bps: Bps,
    },

    #[error("Slippage exceeded: got {amount_out}, minimum {min_amount_out}")]
    SlippageExceeded {
        amount_out: Amount,
        min_amount_out: Amount,
    },

    #[error("No reference price for {0}")]
    PriceUnavailable(TokenId),

    #[error("Mechanism not allowed for {from} -> {to}")]
    InvalidMechanism { from: TokenId, to: TokenId },

    #[error("Arithmetic overflow")]
    ArithmeticOverflow,

    #[error("Router is paused")]
    RouterPaused,

    #[error("Router not initialized")]
    NotInitialized,

    #[error("Router already initialized")]
    AlreadyInitialized,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("State encoding failed: {0}")]
    Codec(String),

    // Pass-through failures surfaced by collaborators
    #[error("Pool not found: {0:?}")]
    PoolNotFound(PoolId),

    #[error("No minting curve for asset {0}")]
    CurveNotFound(TokenId),

    #[error("Insufficient liquidity")]
    InsufficientLiquidity,

    #[error("Insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: Amount, need: Amount },

    #[error("Collaborator failure: {0}")]
    Collaborator(String),
}

/// Result type for router operations
pub type RouterResult<T> = Result<T, RouterError>;
