//! Constant-product pool

use lib_types::{Address, Amount, Bps, PoolId, TokenId};
use serde::{Deserialize, Serialize};

use crate::errors::{RouterError, RouterResult};
use crate::math::{checked_mul_div, BPS_DENOMINATOR};

/// Domain separator for pool ID derivation
pub const POOL_ID_DOMAIN: &[u8] = b"LIB_ROUTER_POOL_V1";

/// Derive a deterministic pool ID from an unordered asset pair
///
/// Pool ID = Blake3(POOL_ID_DOMAIN || min(a, b) || max(a, b))
pub fn derive_pool_id(a: &TokenId, b: &TokenId) -> PoolId {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };

    let mut hasher = blake3::Hasher::new();
    hasher.update(POOL_ID_DOMAIN);
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());

    PoolId::new(*hasher.finalize().as_bytes())
}

/// x * y = k pool over an ordered asset pair (`asset_a < asset_b`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstantProductPool {
    pub id: PoolId,
    pub asset_a: TokenId,
    pub asset_b: TokenId,
    pub reserve_a: Amount,
    pub reserve_b: Amount,
    /// Fee retained in the pool, taken from the input
    pub fee_bps: Bps,
}

impl ConstantProductPool {
    /// Pool seeded with `reserve_x` of `x` and `reserve_y` of `y`, in any order
    pub fn new(x: TokenId, y: TokenId, reserve_x: Amount, reserve_y: Amount, fee_bps: Bps) -> RouterResult<Self> {
        if x == y {
            return Err(RouterError::IdenticalAssets);
        }
        if reserve_x == 0 || reserve_y == 0 {
            return Err(RouterError::InsufficientLiquidity);
        }
        if fee_bps as u128 >= BPS_DENOMINATOR {
            return Err(RouterError::InvalidConfig(format!("pool fee {} bps", fee_bps)));
        }

        let (asset_a, asset_b, reserve_a, reserve_b) = if x < y {
            (x, y, reserve_x, reserve_y)
        } else {
            (y, x, reserve_y, reserve_x)
        };
        Ok(Self {
            id: derive_pool_id(&x, &y),
            asset_a,
            asset_b,
            reserve_a,
            reserve_b,
            fee_bps,
        })
    }

    /// Ledger account holding the pool's reserves
    pub fn account(&self) -> Address {
        Address::new(*self.id.as_bytes())
    }

    pub fn contains(&self, asset: &TokenId) -> bool {
        &self.asset_a == asset || &self.asset_b == asset
    }

    /// `(reserve_in, reserve_out)` for a swap selling `from`
    fn reserves_for(&self, from: &TokenId) -> RouterResult<(Amount, Amount)> {
        if from == &self.asset_a {
            Ok((self.reserve_a, self.reserve_b))
        } else if from == &self.asset_b {
            Ok((self.reserve_b, self.reserve_a))
        } else {
            Err(RouterError::PoolNotFound(self.id))
        }
    }

    /// Asset received when selling `from`
    pub fn counterpart(&self, from: &TokenId) -> Option<TokenId> {
        if from == &self.asset_a {
            Some(self.asset_b)
        } else if from == &self.asset_b {
            Some(self.asset_a)
        } else {
            None
        }
    }

    fn calculate_fee(&self, amount: Amount) -> RouterResult<Amount> {
        // fee = amount * fee_bps / 10000
        let fee = amount
            .checked_mul(self.fee_bps as u128)
            .ok_or(RouterError::ArithmeticOverflow)?
            / BPS_DENOMINATOR;
        Ok(fee)
    }

    /// amount_out = (reserve_out * amount_in) / (reserve_in + amount_in)
    fn calculate_output(amount_in: Amount, reserve_in: Amount, reserve_out: Amount) -> RouterResult<Amount> {
        if reserve_in == 0 || reserve_out == 0 {
            return Err(RouterError::InsufficientLiquidity);
        }

        let denominator = reserve_in
            .checked_add(amount_in)
            .ok_or(RouterError::ArithmeticOverflow)?;

        checked_mul_div(reserve_out, amount_in, denominator).ok_or(RouterError::ArithmeticOverflow)
    }

    /// Output for selling `amount_in` of `from`, after the pool fee
    pub fn quote(&self, from: &TokenId, amount_in: Amount) -> RouterResult<Amount> {
        if amount_in == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let (reserve_in, reserve_out) = self.reserves_for(from)?;
        let fee = self.calculate_fee(amount_in)?;
        Self::calculate_output(amount_in - fee, reserve_in, reserve_out)
    }

    /// Apply a swap to the reserves and return the output.
    ///
    /// The fee stays in the pool, so k never decreases.
    pub fn apply_swap(&mut self, from: &TokenId, amount_in: Amount) -> RouterResult<Amount> {
        let amount_out = self.quote(from, amount_in)?;
        if amount_out == 0 {
            return Err(RouterError::InsufficientLiquidity);
        }

        let (reserve_in, reserve_out) = self.reserves_for(from)?;
        let new_in = reserve_in
            .checked_add(amount_in)
            .ok_or(RouterError::ArithmeticOverflow)?;
        let new_out = reserve_out
            .checked_sub(amount_out)
            .ok_or(RouterError::InsufficientLiquidity)?;

        let old_k = reserve_in.checked_mul(reserve_out);
        let new_k = new_in.checked_mul(new_out);
        if let (Some(old_k), Some(new_k)) = (old_k, new_k) {
            if new_k < old_k {
                return Err(RouterError::Collaborator("constant product decreased".to_string()));
            }
        }

        if from == &self.asset_a {
            self.reserve_a = new_in;
            self.reserve_b = new_out;
        } else {
            self.reserve_b = new_in;
            self.reserve_a = new_out;
        }
        Ok(amount_out)
    }
}
