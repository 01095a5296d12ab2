//! Half-life-decayed, liquidity-weighted price oracle
//!
//! Prices are anchor units per unit of asset as [`FixedU128`]. A refresh takes
//! a TVL-weighted snapshot across every pool holding the asset and merges it
//! into the stored estimate with a weight that halves once per half-life.
//!
//! # Invariants
//! - The anchor's price is always `FixedU128::one()` and is never stored.
//! - `decay_weight(0, h) == PRECISION`; `decay_weight(a, h) == 0` for
//!   `a >= MAX_HALVINGS * h`; non-increasing in `a`.
//! - Stored estimates are only written by `update_price`; reads never persist.

use lib_types::{Amount, BlockHeight, TokenId};
use tracing::debug;

use crate::capabilities::{PoolLiquidity, RouterStore};
use crate::math::{saturating_mul_div, weighted_mean, FixedU128, PRECISION};
use crate::types::TokenPriceState;
use crate::{MAX_HALVINGS, STALE_WEIGHT_DIVISOR};

/// Liquidity-weighted instantaneous price
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub price: FixedU128,
    pub total_weight: Amount,
}

/// Weight of an observation that is `age` blocks old.
///
/// Full precision halves once per elapsed half-life and is interpolated
/// linearly inside a partial interval. A zero half-life keeps no memory.
pub fn decay_weight(age: BlockHeight, half_life: BlockHeight) -> u128 {
    if age == 0 {
        return PRECISION;
    }
    if half_life == 0 {
        return 0;
    }

    let halvings = age / half_life;
    if halvings >= MAX_HALVINGS {
        return 0;
    }

    let base = PRECISION >> halvings;
    let partial = age % half_life;
    // Interpolate from `base` toward `base / 2` across the interval
    let drop = saturating_mul_div(base / 2, partial as u128, half_life as u128);
    base.saturating_sub(drop)
}

pub struct PriceOracle<'a> {
    pools: &'a dyn PoolLiquidity,
    store: &'a dyn RouterStore,
    anchor: TokenId,
    half_life: BlockHeight,
}

impl<'a> PriceOracle<'a> {
    pub fn new(
        pools: &'a dyn PoolLiquidity,
        store: &'a dyn RouterStore,
        anchor: TokenId,
        half_life: BlockHeight,
    ) -> Self {
        Self {
            pools,
            store,
            anchor,
            half_life,
        }
    }

    /// TVL-weighted mean price across all pools containing `asset`.
    ///
    /// Pools not paired with the anchor are converted through the other
    /// asset's stored price; pools whose other side has no stored price
    /// contribute nothing. Returns `None` when the total weight is zero.
    pub fn snapshot(&self, asset: &TokenId) -> Option<PriceSnapshot> {
        if asset == &self.anchor {
            return None;
        }

        let mut observations: Vec<(u128, u128)> = Vec::new();
        let mut total_weight: u128 = 0;

        for pool_id in self.pools.pools_with(asset) {
            let Some(reserves) = self.pools.pool_reserves(&pool_id) else {
                continue;
            };
            let Some((asset_reserve, other_reserve, other)) = reserves.oriented(asset) else {
                continue;
            };
            if asset_reserve == 0 || other_reserve == 0 {
                continue;
            }

            let anchor_reserve = if other == self.anchor {
                other_reserve
            } else {
                match self.store.price_state(&other) {
                    Some(state) => state.price.saturating_mul_int(other_reserve),
                    None => continue,
                }
            };
            if anchor_reserve == 0 {
                continue;
            }

            let price = FixedU128::saturating_from_rational(anchor_reserve, asset_reserve);
            let weight = anchor_reserve.saturating_mul(2);
            observations.push((price.into_inner(), weight));
            total_weight = total_weight.saturating_add(weight);
        }

        if total_weight == 0 {
            return None;
        }

        let price = weighted_mean(&observations)?;

        Some(PriceSnapshot {
            price: FixedU128::from_inner(price),
            total_weight,
        })
    }

    /// Decay-weighted merge of a stored estimate with a fresh snapshot price
    pub fn merge(&self, previous: &TokenPriceState, snapshot: FixedU128, now: BlockHeight) -> FixedU128 {
        let age = now.saturating_sub(previous.last_update);
        let old_weight = decay_weight(age, self.half_life);
        let new_weight = PRECISION;
        let mean = weighted_mean(&[(previous.price.into_inner(), old_weight), (snapshot.into_inner(), new_weight)]);
        FixedU128::from_inner(mean.unwrap_or_else(|| snapshot.into_inner()))
    }

    /// Refresh and persist the estimate for `asset`.
    ///
    /// Returns the new state, or `None` when the asset is the anchor or has
    /// no liquidity (the stored state is then left untouched).
    pub fn update_price(&self, asset: &TokenId, now: BlockHeight) -> Option<TokenPriceState> {
        let snapshot = self.snapshot(asset)?;

        let price = match self.store.price_state(asset) {
            Some(previous) => self.merge(&previous, snapshot.price, now),
            None => snapshot.price,
        };

        let state = TokenPriceState {
            price,
            liquidity_weight: snapshot.total_weight,
            last_update: now,
        };
        self.store.put_price_state(asset, state);

        debug!(
            "Oracle price for {} updated to {} (weight {}) at block {}",
            asset, price, snapshot.total_weight, now
        );
        Some(state)
    }

    /// Anchor units per unit of `asset`. Never fails.
    ///
    /// A stored estimate is trusted while its decayed weight exceeds one
    /// eighth of full precision. Otherwise a live snapshot is computed without
    /// persisting it; with no liquidity the stale estimate is returned, and
    /// zero means no reference price exists at all.
    pub fn get_price(&self, asset: &TokenId, now: BlockHeight) -> FixedU128 {
        if asset == &self.anchor {
            return FixedU128::one();
        }

        let stored = self.store.price_state(asset);
        if let Some(state) = stored {
            let age = now.saturating_sub(state.last_update);
            if decay_weight(age, self.half_life) > PRECISION / STALE_WEIGHT_DIVISOR {
                return state.price;
            }
        }

        match self.snapshot(asset) {
            Some(snapshot) => snapshot.price,
            None => stored.map(|s| s.price).unwrap_or_else(FixedU128::zero),
        }
    }

    /// Units of `to` per unit of `from` implied by the oracle; zero when
    /// either side has no reference price.
    pub fn expected_rate(&self, from: &TokenId, to: &TokenId, now: BlockHeight) -> FixedU128 {
        let price_from = self.get_price(from, now);
        let price_to = self.get_price(to, now);
        if price_from.is_zero() || price_to.is_zero() {
            return FixedU128::zero();
        }
        price_from.saturating_div(price_to)
    }
}
