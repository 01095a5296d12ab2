//! In-memory host implementing every router collaborator
//!
//! Balances, pools, curves and router records live in one `RuntimeState`, so
//! a checkpoint taken by `begin_transaction` covers all of them at once.
//! Events are kept outside the checkpointed state.

use lib_types::{Address, Amount, Bps, PoolId, TokenId};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};

use crate::capabilities::{
    AssetLedger, EventSink, MintingCurve, PoolLiquidity, PoolQuote, PoolReserves, RouterStore, Transactional,
};
use crate::config::RouterConfig;
use crate::errors::{RouterError, RouterResult};
use crate::events::RouterEvent;
use crate::store::RouterState;
use crate::types::TokenPriceState;

use super::curve::LinearMintCurve;
use super::pool::{derive_pool_id, ConstantProductPool};

#[derive(Debug, Clone, Default)]
struct RuntimeState {
    balances: BTreeMap<(TokenId, Address), Amount>,
    issuance: BTreeMap<TokenId, Amount>,
    pools: BTreeMap<PoolId, ConstantProductPool>,
    curves: BTreeMap<TokenId, LinearMintCurve>,
    router: RouterState,
}

impl RuntimeState {
    fn balance(&self, asset: &TokenId, who: &Address) -> Amount {
        self.balances.get(&(*asset, *who)).copied().unwrap_or(0)
    }

    fn credit(&mut self, asset: &TokenId, who: &Address, amount: Amount) -> RouterResult<()> {
        let balance = self.balance(asset, who);
        let next = balance.checked_add(amount).ok_or(RouterError::ArithmeticOverflow)?;
        self.balances.insert((*asset, *who), next);
        Ok(())
    }

    fn debit(&mut self, asset: &TokenId, who: &Address, amount: Amount) -> RouterResult<()> {
        let have = self.balance(asset, who);
        if have < amount {
            return Err(RouterError::InsufficientBalance { have, need: amount });
        }
        if have == amount {
            self.balances.remove(&(*asset, *who));
        } else {
            self.balances.insert((*asset, *who), have - amount);
        }
        Ok(())
    }

    fn move_funds(&mut self, asset: &TokenId, from: &Address, to: &Address, amount: Amount) -> RouterResult<()> {
        self.debit(asset, from, amount)?;
        self.credit(asset, to, amount)
    }

    fn mint(&mut self, asset: &TokenId, who: &Address, amount: Amount) -> RouterResult<()> {
        let supply = self.issuance.get(asset).copied().unwrap_or(0);
        let next = supply.checked_add(amount).ok_or(RouterError::ArithmeticOverflow)?;
        self.credit(asset, who, amount)?;
        self.issuance.insert(*asset, next);
        Ok(())
    }
}

/// Test host: ledger, pools, curves, router storage and transactions
#[derive(Debug, Default)]
pub struct TestRuntime {
    state: RefCell<RuntimeState>,
    checkpoints: RefCell<Vec<RuntimeState>>,
    events: RefCell<Vec<RouterEvent>>,
    failing_pools: RefCell<BTreeSet<PoolId>>,
}

impl TestRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit new units of `asset` to `who`
    pub fn mint(&self, asset: &TokenId, who: &Address, amount: Amount) {
        let mut state = self.state.borrow_mut();
        if let Err(err) = state.mint(asset, who, amount) {
            tracing::warn!("Test mint of {} {} failed: {}", amount, asset, err);
        }
    }

    pub fn total_issuance(&self, asset: &TokenId) -> Amount {
        self.state.borrow().issuance.get(asset).copied().unwrap_or(0)
    }

    pub fn transaction_depth(&self) -> usize {
        self.checkpoints.borrow().len()
    }

    /// Create a pool seeded with freshly minted reserves held by the pool account
    pub fn create_pool(
        &self,
        x: &TokenId,
        y: &TokenId,
        reserve_x: Amount,
        reserve_y: Amount,
        fee_bps: Bps,
    ) -> RouterResult<PoolId> {
        let pool = ConstantProductPool::new(*x, *y, reserve_x, reserve_y, fee_bps)?;
        let mut state = self.state.borrow_mut();
        if state.pools.contains_key(&pool.id) {
            return Err(RouterError::Collaborator(format!("pool {} already exists", pool.id)));
        }

        let account = pool.account();
        state.mint(x, &account, reserve_x)?;
        state.mint(y, &account, reserve_y)?;
        let id = pool.id;
        state.pools.insert(id, pool);
        Ok(id)
    }

    pub fn pool(&self, pool_id: &PoolId) -> Option<ConstantProductPool> {
        self.state.borrow().pools.get(pool_id).cloned()
    }

    pub fn create_curve(&self, foreign: &TokenId, curve: LinearMintCurve) {
        self.state.borrow_mut().curves.insert(*foreign, curve);
    }

    pub fn curve(&self, foreign: &TokenId) -> Option<LinearMintCurve> {
        self.state.borrow().curves.get(foreign).cloned()
    }

    /// Make every subsequent swap through `pool_id` fail
    pub fn fail_swaps_on(&self, pool_id: PoolId) {
        self.failing_pools.borrow_mut().insert(pool_id);
    }

    pub fn events(&self) -> Vec<RouterEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Copy of the router records
    pub fn router_state(&self) -> RouterState {
        self.state.borrow().router.clone()
    }
}

impl PoolLiquidity for TestRuntime {
    fn pool_for(&self, a: &TokenId, b: &TokenId) -> Option<PoolId> {
        let id = derive_pool_id(a, b);
        self.state.borrow().pools.contains_key(&id).then_some(id)
    }

    fn quote_exact_in(&self, from: &TokenId, to: &TokenId, amount_in: Amount) -> Option<PoolQuote> {
        let pool_id = self.pool_for(from, to)?;
        let state = self.state.borrow();
        let amount_out = state.pools.get(&pool_id)?.quote(from, amount_in).ok()?;
        Some(PoolQuote { pool_id, amount_out })
    }

    fn swap_exact_in(
        &self,
        who: &Address,
        pool_id: &PoolId,
        from: &TokenId,
        to: &TokenId,
        amount_in: Amount,
        min_amount_out: Amount,
    ) -> RouterResult<Amount> {
        if self.failing_pools.borrow().contains(pool_id) {
            return Err(RouterError::Collaborator(format!("swap through {} rejected", pool_id)));
        }

        let mut state = self.state.borrow_mut();
        let mut pool = state
            .pools
            .get(pool_id)
            .cloned()
            .ok_or(RouterError::PoolNotFound(*pool_id))?;
        if pool.counterpart(from) != Some(*to) {
            return Err(RouterError::PoolNotFound(*pool_id));
        }

        let have = state.balance(from, who);
        if have < amount_in {
            return Err(RouterError::InsufficientBalance { have, need: amount_in });
        }
        let amount_out = pool.apply_swap(from, amount_in)?;
        if amount_out < min_amount_out {
            return Err(RouterError::SlippageExceeded {
                amount_out,
                min_amount_out,
            });
        }

        let account = pool.account();
        state.move_funds(from, who, &account, amount_in)?;
        state.move_funds(to, &account, who, amount_out)?;
        state.pools.insert(*pool_id, pool);
        Ok(amount_out)
    }

    fn pools_with(&self, asset: &TokenId) -> Vec<PoolId> {
        self.state
            .borrow()
            .pools
            .values()
            .filter(|p| p.contains(asset))
            .map(|p| p.id)
            .collect()
    }

    fn pool_reserves(&self, pool_id: &PoolId) -> Option<PoolReserves> {
        self.state.borrow().pools.get(pool_id).map(|p| PoolReserves {
            asset_a: p.asset_a,
            asset_b: p.asset_b,
            reserve_a: p.reserve_a,
            reserve_b: p.reserve_b,
        })
    }
}

impl MintingCurve for TestRuntime {
    fn has_curve(&self, foreign: &TokenId) -> bool {
        self.state.borrow().curves.contains_key(foreign)
    }

    fn quote_mint(&self, foreign: &TokenId, amount_in: Amount) -> RouterResult<Amount> {
        let state = self.state.borrow();
        let curve = state.curves.get(foreign).ok_or(RouterError::CurveNotFound(*foreign))?;
        Ok(curve.quote(amount_in)?.user)
    }

    fn mint_with_distribution(&self, who: &Address, foreign: &TokenId, amount_in: Amount) -> RouterResult<Amount> {
        let mut state = self.state.borrow_mut();
        let mut curve = state
            .curves
            .get(foreign)
            .cloned()
            .ok_or(RouterError::CurveNotFound(*foreign))?;
        let anchor = state
            .router
            .config
            .map(|c| c.anchor)
            .unwrap_or(TokenId::NATIVE);

        let quote = curve.quote(amount_in)?;
        if quote.total == 0 {
            return Err(RouterError::InsufficientLiquidity);
        }

        state.move_funds(foreign, who, &curve.reserve_account, amount_in)?;
        state.mint(&anchor, who, quote.user)?;
        state.mint(&anchor, &curve.protocol_account, quote.protocol)?;
        curve.supply = curve
            .supply
            .checked_add(quote.total)
            .ok_or(RouterError::ArithmeticOverflow)?;
        state.curves.insert(*foreign, curve);
        Ok(quote.user)
    }
}

impl AssetLedger for TestRuntime {
    fn balance_of(&self, asset: &TokenId, who: &Address) -> Amount {
        self.state.borrow().balance(asset, who)
    }

    fn transfer(&self, asset: &TokenId, from: &Address, to: &Address, amount: Amount) -> RouterResult<()> {
        self.state.borrow_mut().move_funds(asset, from, to, amount)
    }

    fn burn(&self, asset: &TokenId, from: &Address, amount: Amount) -> RouterResult<()> {
        let mut state = self.state.borrow_mut();
        state.debit(asset, from, amount)?;
        let supply = state.issuance.get(asset).copied().unwrap_or(0);
        state.issuance.insert(*asset, supply.saturating_sub(amount));
        Ok(())
    }
}

impl RouterStore for TestRuntime {
    fn config(&self) -> Option<RouterConfig> {
        self.state.borrow().router.config
    }

    fn put_config(&self, config: RouterConfig) {
        self.state.borrow_mut().router.config = Some(config);
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().router.paused
    }

    fn set_paused(&self, paused: bool) {
        self.state.borrow_mut().router.paused = paused;
    }

    fn price_state(&self, asset: &TokenId) -> Option<TokenPriceState> {
        self.state.borrow().router.prices.get(asset).copied()
    }

    fn put_price_state(&self, asset: &TokenId, state: TokenPriceState) {
        self.state.borrow_mut().router.prices.insert(*asset, state);
    }

    fn fee_buffer(&self, asset: &TokenId) -> Amount {
        self.state.borrow().router.fee_buffer(asset)
    }

    fn put_fee_buffer(&self, asset: &TokenId, amount: Amount) {
        self.state.borrow_mut().router.set_fee_buffer(asset, amount);
    }

    fn total_burned(&self) -> Amount {
        self.state.borrow().router.total_burned
    }

    fn put_total_burned(&self, amount: Amount) {
        self.state.borrow_mut().router.total_burned = amount;
    }
}

impl Transactional for TestRuntime {
    fn begin_transaction(&self) {
        let checkpoint = self.state.borrow().clone();
        self.checkpoints.borrow_mut().push(checkpoint);
    }

    fn commit_transaction(&self) {
        self.checkpoints.borrow_mut().pop();
    }

    fn rollback_transaction(&self) {
        if let Some(checkpoint) = self.checkpoints.borrow_mut().pop() {
            *self.state.borrow_mut() = checkpoint;
        }
    }
}

impl EventSink for TestRuntime {
    fn emit(&self, event: RouterEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: TokenId = TokenId::NATIVE;

    fn token(id: u8) -> TokenId {
        TokenId::new([id; 32])
    }

    fn alice() -> Address {
        Address::new([0xa1; 32])
    }

    #[test]
    fn test_mint_transfer_burn() {
        let rt = TestRuntime::new();
        let bob = Address::new([0xb0; 32]);
        rt.mint(&N, &alice(), 1_000);

        rt.transfer(&N, &alice(), &bob, 400).unwrap();
        assert_eq!(rt.balance_of(&N, &alice()), 600);
        assert_eq!(rt.balance_of(&N, &bob), 400);

        rt.burn(&N, &bob, 100).unwrap();
        assert_eq!(rt.total_issuance(&N), 900);
        assert_eq!(
            rt.transfer(&N, &bob, &alice(), 301),
            Err(RouterError::InsufficientBalance { have: 300, need: 301 })
        );
    }

    #[test]
    fn test_pool_swap_moves_funds() {
        let rt = TestRuntime::new();
        let f = token(1);
        let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0).unwrap();
        rt.mint(&f, &alice(), 1_000);

        let out = rt.swap_exact_in(&alice(), &pool_id, &f, &N, 1_000, 999).unwrap();

        assert_eq!(out, 999);
        assert_eq!(rt.balance_of(&N, &alice()), 999);
        let pool = rt.pool(&pool_id).unwrap();
        assert_eq!(rt.balance_of(&f, &pool.account()), 1_001_000);
        assert_eq!(rt.balance_of(&N, &pool.account()), 999_001);
        assert_eq!(rt.pools_with(&f), vec![pool_id]);
    }

    #[test]
    fn test_pool_swap_min_out_leaves_state() {
        let rt = TestRuntime::new();
        let f = token(1);
        let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0).unwrap();
        rt.mint(&f, &alice(), 1_000);

        let result = rt.swap_exact_in(&alice(), &pool_id, &f, &N, 1_000, 1_000);
        assert!(matches!(result, Err(RouterError::SlippageExceeded { .. })));
        assert_eq!(rt.balance_of(&f, &alice()), 1_000);
        assert_eq!(rt.pool(&pool_id).unwrap().reserve_a, 1_000_000);
    }

    #[test]
    fn test_duplicate_pool_rejected() {
        let rt = TestRuntime::new();
        rt.create_pool(&N, &token(1), 10, 10, 0).unwrap();
        assert!(rt.create_pool(&token(1), &N, 10, 10, 0).is_err());
    }

    #[test]
    fn test_curve_mint_distributes() {
        let rt = TestRuntime::new();
        let f = token(1);
        let curve = LinearMintCurve {
            initial_price: crate::math::PRECISION,
            slope: 0,
            supply: 0,
            user_allocation_bps: 3_330,
            reserve_account: Address::new([0xee; 32]),
            protocol_account: Address::new([0xef; 32]),
        };
        rt.create_curve(&f, curve.clone());
        rt.mint(&f, &alice(), 10_000);

        let user = rt.mint_with_distribution(&alice(), &f, 10_000).unwrap();

        assert_eq!(user, 3_330);
        assert_eq!(rt.balance_of(&N, &alice()), 3_330);
        assert_eq!(rt.balance_of(&N, &curve.protocol_account), 6_670);
        assert_eq!(rt.balance_of(&f, &curve.reserve_account), 10_000);
        assert_eq!(rt.curve(&f).unwrap().supply, 10_000);
        assert_eq!(rt.quote_mint(&token(2), 1), Err(RouterError::CurveNotFound(token(2))));
    }

    #[test]
    fn test_rollback_covers_pools_and_balances() {
        let rt = TestRuntime::new();
        let f = token(1);
        let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0).unwrap();
        rt.mint(&f, &alice(), 1_000);

        rt.begin_transaction();
        rt.swap_exact_in(&alice(), &pool_id, &f, &N, 1_000, 0).unwrap();
        rt.put_total_burned(5);
        rt.rollback_transaction();

        assert_eq!(rt.balance_of(&f, &alice()), 1_000);
        assert_eq!(rt.balance_of(&N, &alice()), 0);
        assert_eq!(rt.pool(&pool_id).unwrap().reserve_a, 1_000_000);
        assert_eq!(rt.total_burned(), 0);
    }

    #[test]
    fn test_failure_injection() {
        let rt = TestRuntime::new();
        let f = token(1);
        let pool_id = rt.create_pool(&N, &f, 1_000_000, 1_000_000, 0).unwrap();
        rt.mint(&f, &alice(), 1_000);
        rt.fail_swaps_on(pool_id);

        assert!(matches!(
            rt.swap_exact_in(&alice(), &pool_id, &f, &N, 1_000, 0),
            Err(RouterError::Collaborator(_))
        ));
        // Quotes are unaffected
        assert!(rt.quote_exact_in(&f, &N, 1_000).is_some());
    }
}
