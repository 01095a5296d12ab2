//! Capability interfaces consumed by the router
//!
//! The router never references concrete pool, curve or ledger implementations.
//! Collaborators are injected as trait objects at construction time. Every
//! trait takes `&self`; implementations use interior mutability, the same way
//! a storage layer backs a `TokenStore`.

use lib_types::{Address, Amount, PoolId, TokenId};

use crate::config::RouterConfig;
use crate::errors::{RouterError, RouterResult};
use crate::events::RouterEvent;
use crate::math::{saturating_mul_div, BPS_DENOMINATOR};
use crate::types::TokenPriceState;
use crate::CONVERSION_SLIPPAGE_TOLERANCE_BPS;

/// Quote returned by a pool for an exact-input swap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolQuote {
    pub pool_id: PoolId,
    pub amount_out: Amount,
}

/// Asset pair and reserves of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolReserves {
    pub asset_a: TokenId,
    pub asset_b: TokenId,
    pub reserve_a: Amount,
    pub reserve_b: Amount,
}

impl PoolReserves {
    /// Reserves oriented as `(reserve of asset, reserve of the other side, other asset)`
    pub fn oriented(&self, asset: &TokenId) -> Option<(Amount, Amount, TokenId)> {
        if &self.asset_a == asset {
            Some((self.reserve_a, self.reserve_b, self.asset_b))
        } else if &self.asset_b == asset {
            Some((self.reserve_b, self.reserve_a, self.asset_a))
        } else {
            None
        }
    }
}

/// Constant-product pool liquidity source
pub trait PoolLiquidity {
    /// Pool holding the unordered pair, if any
    fn pool_for(&self, a: &TokenId, b: &TokenId) -> Option<PoolId>;

    /// Quote output for an exact input, inclusive of the pool's own fee.
    /// Returns `None` when no pool or no liquidity exists.
    fn quote_exact_in(&self, from: &TokenId, to: &TokenId, amount_in: Amount) -> Option<PoolQuote>;

    /// Execute an exact-input swap debiting `who` and crediting the output to `who`
    fn swap_exact_in(
        &self,
        who: &Address,
        pool_id: &PoolId,
        from: &TokenId,
        to: &TokenId,
        amount_in: Amount,
        min_amount_out: Amount,
    ) -> RouterResult<Amount>;

    /// Every pool containing `asset`
    fn pools_with(&self, asset: &TokenId) -> Vec<PoolId>;

    /// Asset pair and reserves of a pool
    fn pool_reserves(&self, pool_id: &PoolId) -> Option<PoolReserves>;
}

/// One-directional minting curve issuing the anchor asset
pub trait MintingCurve {
    fn has_curve(&self, foreign: &TokenId) -> bool;

    /// Anchor amount the user would receive for `amount_in` of `foreign`
    fn quote_mint(&self, foreign: &TokenId, amount_in: Amount) -> RouterResult<Amount>;

    /// Take `amount_in` of `foreign` from `who`, mint, and distribute.
    /// Returns the anchor amount credited to `who`.
    fn mint_with_distribution(
        &self,
        who: &Address,
        foreign: &TokenId,
        amount_in: Amount,
    ) -> RouterResult<Amount>;
}

/// Balances of every asset
pub trait AssetLedger {
    fn balance_of(&self, asset: &TokenId, who: &Address) -> Amount;

    fn transfer(&self, asset: &TokenId, from: &Address, to: &Address, amount: Amount) -> RouterResult<()>;

    /// Permanently remove `amount` from `from` and from total issuance
    fn burn(&self, asset: &TokenId, from: &Address, amount: Amount) -> RouterResult<()>;
}

/// Swap an arbitrary asset held by `account` into the anchor asset
pub trait AnchorConverter {
    /// Returns the anchor amount received
    fn convert_to_anchor(&self, account: &Address, asset: &TokenId, amount: Amount) -> RouterResult<Amount>;
}

/// Keyed persistent storage owned by the router
///
/// Storage is infallible from the router's point of view: commit and crash
/// consistency belong to the surrounding transaction pipeline.
pub trait RouterStore {
    fn config(&self) -> Option<RouterConfig>;
    fn put_config(&self, config: RouterConfig);

    fn is_paused(&self) -> bool;
    fn set_paused(&self, paused: bool);

    fn price_state(&self, asset: &TokenId) -> Option<TokenPriceState>;
    fn put_price_state(&self, asset: &TokenId, state: TokenPriceState);

    fn fee_buffer(&self, asset: &TokenId) -> Amount;
    fn put_fee_buffer(&self, asset: &TokenId, amount: Amount);

    fn total_burned(&self) -> Amount;
    fn put_total_burned(&self, amount: Amount);
}

/// Nested all-or-nothing state layers spanning every collaborator
pub trait Transactional {
    fn begin_transaction(&self);
    fn commit_transaction(&self);
    fn rollback_transaction(&self);
}

/// Sink for observable router events
pub trait EventSink {
    fn emit(&self, event: RouterEvent);
}

/// Run `f` inside a transaction layer: commit on `Ok`, roll back on `Err`.
pub fn with_transaction<T>(
    transactions: &dyn Transactional,
    f: impl FnOnce() -> RouterResult<T>,
) -> RouterResult<T> {
    transactions.begin_transaction();
    match f() {
        Ok(value) => {
            transactions.commit_transaction();
            Ok(value)
        }
        Err(err) => {
            transactions.rollback_transaction();
            Err(err)
        }
    }
}

/// Bundle of injected collaborators
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub pools: &'a dyn PoolLiquidity,
    pub curve: &'a dyn MintingCurve,
    pub ledger: &'a dyn AssetLedger,
    pub converter: &'a dyn AnchorConverter,
    pub store: &'a dyn RouterStore,
    pub transactions: &'a dyn Transactional,
    pub events: &'a dyn EventSink,
}

impl<'a> Capabilities<'a> {
    /// Build the bundle from a single host implementing every collaborator
    pub fn from_host<H>(host: &'a H, converter: &'a dyn AnchorConverter) -> Self
    where
        H: PoolLiquidity + MintingCurve + AssetLedger + RouterStore + Transactional + EventSink,
    {
        Self {
            pools: host,
            curve: host,
            ledger: host,
            converter,
            store: host,
            transactions: host,
            events: host,
        }
    }
}

/// Converts buffered fees by swapping through the direct asset/anchor pool.
///
/// The swap must return at least the stored oracle value of the input less
/// [`CONVERSION_SLIPPAGE_TOLERANCE_BPS`]; an asset without a stored price is
/// not converted.
pub struct PoolAnchorConverter<'a> {
    pools: &'a dyn PoolLiquidity,
    store: &'a dyn RouterStore,
    anchor: TokenId,
}

impl<'a> PoolAnchorConverter<'a> {
    pub fn new(pools: &'a dyn PoolLiquidity, store: &'a dyn RouterStore, anchor: TokenId) -> Self {
        Self { pools, store, anchor }
    }

    /// Lowest acceptable anchor output for `amount` of `asset`
    pub fn min_output(&self, asset: &TokenId, amount: Amount) -> RouterResult<Amount> {
        let price = self
            .store
            .price_state(asset)
            .map(|state| state.price)
            .filter(|price| !price.is_zero())
            .ok_or(RouterError::PriceUnavailable(*asset))?;
        let fair = price.saturating_mul_int(amount);
        Ok(saturating_mul_div(
            fair,
            BPS_DENOMINATOR - CONVERSION_SLIPPAGE_TOLERANCE_BPS as u128,
            BPS_DENOMINATOR,
        ))
    }
}

impl AnchorConverter for PoolAnchorConverter<'_> {
    fn convert_to_anchor(&self, account: &Address, asset: &TokenId, amount: Amount) -> RouterResult<Amount> {
        if asset == &self.anchor {
            return Ok(amount);
        }
        let quote = self
            .pools
            .quote_exact_in(asset, &self.anchor, amount)
            .filter(|q| q.amount_out > 0)
            .ok_or(RouterError::NoRouteFound {
                from: *asset,
                to: self.anchor,
            })?;

        let min_amount_out = self.min_output(asset, amount)?;
        if quote.amount_out < min_amount_out {
            return Err(RouterError::SlippageExceeded {
                amount_out: quote.amount_out,
                min_amount_out,
            });
        }
        self.pools
            .swap_exact_in(account, &quote.pool_id, asset, &self.anchor, amount, min_amount_out)
    }
}
