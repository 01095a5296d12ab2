//! Swap execution engine
//!
//! A swap moves through `Requested -> FeeCollected -> Routed -> Validated ->
//! Executed -> Settled`. The router fee is collected in its own transaction
//! layer before the swap layer opens, so it survives any later failure. The
//! fee transfer and its buffer entry commit together. Everything from the first
//! hop to the oracle refresh happens inside one layer and is either committed
//! in full or rolled back in full. Events are only emitted after commit.

use lib_types::{Address, Amount, BlockHeight, Bps, TokenId};
use tracing::{debug, info, warn};

use crate::capabilities::{with_transaction, Capabilities};
use crate::config::{RouterConfig, RouterConfigUpdate};
use crate::errors::{RouterError, RouterResult};
use crate::events::RouterEvent;
use crate::fee_manager::{FeeManager, FeeOutcome};
use crate::math::{checked_bps, FixedU128};
use crate::oracle::PriceOracle;
use crate::selector::PathSelector;
use crate::types::{Hop, Mechanism, Route, SwapOutcome, SwapQuote, SwapRequest, TokenPriceState};

/// Stages of a swap, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SwapStage {
    Requested,
    FeeCollected,
    Routed,
    Validated,
    Executed,
    Settled,
}

/// Reject `actual` when it lies outside `expected ± max_deviation_bps`.
///
/// A zero `expected` rate means there is no reference price and the check is
/// skipped.
pub fn check_price_deviation(expected: FixedU128, actual: FixedU128, max_deviation_bps: Bps) -> RouterResult<()> {
    if expected.is_zero() {
        return Ok(());
    }

    let deviation = max_deviation_bps as u32;
    let lower = expected.saturating_mul_bps(10_000u32.saturating_sub(deviation));
    let upper = expected.saturating_mul_bps(10_000 + deviation);

    if actual < lower || actual > upper {
        return Err(RouterError::ExcessivePriceDeviation {
            expected,
            actual,
            max_deviation_bps,
        });
    }
    Ok(())
}

/// Router fee skimmed from `amount`
pub fn router_fee(amount: Amount, fee_bps: Bps) -> RouterResult<Amount> {
    checked_bps(amount, fee_bps).ok_or(RouterError::ArithmeticOverflow)
}

pub struct Router<'a> {
    caps: Capabilities<'a>,
}

impl<'a> Router<'a> {
    pub fn new(caps: Capabilities<'a>) -> Self {
        Self { caps }
    }

    /// Persist the configuration of a fresh router
    pub fn initialize(&self, config: RouterConfig) -> RouterResult<()> {
        if self.caps.store.config().is_some() {
            return Err(RouterError::AlreadyInitialized);
        }
        config.validate()?;
        self.caps.store.put_config(config);

        info!(
            "Router initialized: anchor={} fee={}bps deviation={}bps half_life={}",
            config.anchor, config.router_fee_bps, config.max_price_deviation_bps, config.oracle_half_life
        );
        Ok(())
    }

    pub fn config(&self) -> RouterResult<RouterConfig> {
        self.caps.store.config().ok_or(RouterError::NotInitialized)
    }

    pub fn is_paused(&self) -> bool {
        self.caps.store.is_paused()
    }

    fn selector(&self, config: &RouterConfig) -> PathSelector<'a> {
        PathSelector::new(self.caps.pools, self.caps.curve, config.anchor)
    }

    fn oracle(&self, config: &RouterConfig) -> PriceOracle<'a> {
        PriceOracle::new(self.caps.pools, self.caps.store, config.anchor, config.oracle_half_life)
    }

    fn fee_manager(&self, config: &RouterConfig) -> FeeManager<'a> {
        FeeManager::new(
            self.caps.store,
            self.caps.ledger,
            self.caps.converter,
            self.caps.transactions,
            self.caps.events,
            config.anchor,
            config.fee_account,
        )
    }

    /// Read-only estimate: router fee first, then route discovery on the rest
    pub fn quote(&self, from: TokenId, to: TokenId, amount_in: Amount) -> RouterResult<SwapQuote> {
        let config = self.config()?;
        if from == to {
            return Err(RouterError::IdenticalAssets);
        }
        if amount_in == 0 {
            return Err(RouterError::ZeroAmount);
        }

        let fee = router_fee(amount_in, config.router_fee_bps)?;
        let net = amount_in - fee;
        if net == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let route = self.selector(&config).find_best_route(from, to, net)?;

        Ok(SwapQuote {
            amount_in,
            router_fee: fee,
            expected_output: route.expected_output,
            route,
        })
    }

    /// Execute a swap at block `now`
    pub fn swap(&self, request: SwapRequest, now: BlockHeight) -> RouterResult<SwapOutcome> {
        let config = self.config()?;
        let SwapRequest {
            who,
            from,
            to,
            amount_in,
            min_amount_out,
            deadline,
        } = request;

        // Requested
        if self.caps.store.is_paused() {
            return Err(RouterError::RouterPaused);
        }
        if from == to {
            return Err(RouterError::IdenticalAssets);
        }
        if amount_in == 0 {
            return Err(RouterError::ZeroAmount);
        }
        if now > deadline {
            return Err(RouterError::DeadlinePassed { now, deadline });
        }
        let have = self.caps.ledger.balance_of(&from, &who);
        if have < amount_in {
            return Err(RouterError::InsufficientBalance { have, need: amount_in });
        }
        let fee = router_fee(amount_in, config.router_fee_bps)?;
        let net = amount_in - fee;
        if net == 0 {
            return Err(RouterError::ZeroAmount);
        }
        self.trace_stage(SwapStage::Requested, &who);

        // FeeCollected
        if fee > 0 {
            let outcome = with_transaction(self.caps.transactions, || {
                self.caps.ledger.transfer(&from, &who, &config.fee_account, fee)?;
                self.fee_manager(&config).receive_fee(&from, fee, now)
            })?;
            match outcome {
                FeeOutcome::Buffered { buffered } => debug!("Fee buffer for {} at {}", from, buffered),
                FeeOutcome::Burned { burned, .. } => debug!("Fee flush burned {}", burned),
                FeeOutcome::ConversionDeferred { .. } => {}
            }
        }
        self.trace_stage(SwapStage::FeeCollected, &who);

        // Routed
        let route = self.selector(&config).find_best_route(from, to, net)?;
        debug_assert!(route.is_consistent());
        debug!(
            "Route {} -> {}: {} hop(s), curve {}, expected {}",
            from,
            to,
            route.hops.len(),
            route.uses_curve(),
            route.expected_output
        );
        self.trace_stage(SwapStage::Routed, &who);

        // Validated
        let oracle = self.oracle(&config);
        let expected_rate = oracle.expected_rate(&from, &to, now);
        let route_rate = FixedU128::saturating_from_rational(route.expected_output, route.amount_in());
        if let Err(err) = check_price_deviation(expected_rate, route_rate, config.max_price_deviation_bps) {
            warn!("Swap {} -> {} rejected: {}", from, to, err);
            return Err(err);
        }
        self.trace_stage(SwapStage::Validated, &who);

        // Executed + Settled, atomically
        let (amount_out, price_updates) = with_transaction(self.caps.transactions, || {
            let amount_out = self.execute_route(&who, &route, net, &config.anchor)?;
            self.trace_stage(SwapStage::Executed, &who);

            if amount_out < min_amount_out {
                return Err(RouterError::SlippageExceeded {
                    amount_out,
                    min_amount_out,
                });
            }

            let updates: Vec<(TokenId, TokenPriceState)> = [from, to]
                .into_iter()
                .filter_map(|asset| oracle.update_price(&asset, now).map(|state| (asset, state)))
                .collect();
            Ok((amount_out, updates))
        })?;
        self.trace_stage(SwapStage::Settled, &who);

        info!(
            "Swap settled: {} {} -> {} {} via {} hop(s), fee {}",
            amount_in,
            from,
            amount_out,
            to,
            route.hops.len(),
            fee
        );

        self.caps.events.emit(RouterEvent::SwapExecuted {
            who,
            from,
            to,
            amount_in,
            router_fee: fee,
            amount_out,
            path: route.path.clone(),
            mechanisms: route.hops.iter().map(|h| h.mechanism).collect(),
            block_height: now,
        });
        for (asset, state) in price_updates {
            self.emit_price_updated(asset, state);
        }

        Ok(SwapOutcome {
            amount_in,
            router_fee: fee,
            amount_out,
            route,
        })
    }

    /// Run every hop in order; the final carried amount is the swap output
    fn execute_route(&self, who: &Address, route: &Route, amount: Amount, anchor: &TokenId) -> RouterResult<Amount> {
        let mut carried = amount;
        for hop in &route.hops {
            carried = self.execute_hop(who, hop, carried, anchor)?;
        }
        Ok(carried)
    }

    /// Execute one hop and return the caller's balance increase in `hop.to`
    fn execute_hop(&self, who: &Address, hop: &Hop, amount: Amount, anchor: &TokenId) -> RouterResult<Amount> {
        let before = self.caps.ledger.balance_of(&hop.to, who);

        match hop.mechanism {
            Mechanism::PoolSwap { pool_id } => {
                self.caps
                    .pools
                    .swap_exact_in(who, &pool_id, &hop.from, &hop.to, amount, 0)?;
            }
            Mechanism::CurveMint => {
                if !hop.mechanism.is_legal(&hop.from, &hop.to, anchor) {
                    return Err(RouterError::InvalidMechanism {
                        from: hop.from,
                        to: hop.to,
                    });
                }
                self.caps.curve.mint_with_distribution(who, &hop.from, amount)?;
            }
        }

        let received = self.caps.ledger.balance_of(&hop.to, who).saturating_sub(before);
        if received == 0 {
            return Err(RouterError::InsufficientLiquidity);
        }
        debug!(
            "Hop {} -> {} via {}: {} in, {} out (quoted {})",
            hop.from, hop.to, hop.mechanism, amount, received, hop.expected_output
        );
        Ok(received)
    }

    /// Refresh and persist the oracle estimate for `asset`
    pub fn update_price(&self, asset: &TokenId, now: BlockHeight) -> RouterResult<Option<TokenPriceState>> {
        let config = self.config()?;
        let updated = self.oracle(&config).update_price(asset, now);
        if let Some(state) = updated {
            self.emit_price_updated(*asset, state);
        }
        Ok(updated)
    }

    pub fn get_price(&self, asset: &TokenId, now: BlockHeight) -> RouterResult<FixedU128> {
        let config = self.config()?;
        Ok(self.oracle(&config).get_price(asset, now))
    }

    pub fn total_burned(&self) -> Amount {
        self.caps.store.total_burned()
    }

    pub fn fee_buffer(&self, asset: &TokenId) -> Amount {
        self.caps.store.fee_buffer(asset)
    }

    pub fn set_paused(&self, caller: &Address, paused: bool) -> RouterResult<()> {
        let config = self.config()?;
        self.ensure_admin(&config, caller)?;

        self.caps.store.set_paused(paused);
        info!("Router {} by {}", if paused { "paused" } else { "unpaused" }, caller);
        self.caps.events.emit(RouterEvent::PausedChanged { paused });
        Ok(())
    }

    pub fn update_config(&self, caller: &Address, update: RouterConfigUpdate) -> RouterResult<RouterConfig> {
        let current = self.config()?;
        self.ensure_admin(&current, caller)?;

        let next = update.apply(&current)?;
        self.caps.store.put_config(next);
        info!(
            "Router config updated: fee={}bps deviation={}bps half_life={}",
            next.router_fee_bps, next.max_price_deviation_bps, next.oracle_half_life
        );
        self.caps.events.emit(RouterEvent::ConfigUpdated {
            router_fee_bps: next.router_fee_bps,
            max_price_deviation_bps: next.max_price_deviation_bps,
            oracle_half_life: next.oracle_half_life,
        });
        Ok(next)
    }

    fn ensure_admin(&self, config: &RouterConfig, caller: &Address) -> RouterResult<()> {
        if caller != &config.admin {
            return Err(RouterError::Unauthorized(format!("{} is not the router admin", caller)));
        }
        Ok(())
    }

    fn emit_price_updated(&self, asset: TokenId, state: TokenPriceState) {
        self.caps.events.emit(RouterEvent::PriceUpdated {
            asset,
            price: state.price,
            liquidity_weight: state.liquidity_weight,
            block_height: state.last_update,
        });
    }

    fn trace_stage(&self, stage: SwapStage, who: &Address) {
        debug!("Swap for {} reached {:?}", who, stage);
    }
}
