//! Router state store
//!
//! `RouterState` is the complete persistent state of one router instance:
//! configuration, pause flag, per-asset oracle records, per-asset fee buffers
//! and the burn counter. Maps are `BTreeMap` so that iteration and encoding are
//! deterministic.

use lib_types::{Amount, TokenId};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::capabilities::{RouterStore, Transactional};
use crate::config::RouterConfig;
use crate::errors::{RouterError, RouterResult};
use crate::types::TokenPriceState;

/// Persistent router records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterState {
    pub config: Option<RouterConfig>,
    pub paused: bool,
    pub prices: BTreeMap<TokenId, TokenPriceState>,
    pub fee_buffers: BTreeMap<TokenId, Amount>,
    pub total_burned: Amount,
}

impl RouterState {
    pub fn encode(&self) -> RouterResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| RouterError::Codec(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> RouterResult<Self> {
        bincode::deserialize(bytes).map_err(|e| RouterError::Codec(e.to_string()))
    }

    pub fn fee_buffer(&self, asset: &TokenId) -> Amount {
        self.fee_buffers.get(asset).copied().unwrap_or(0)
    }

    /// Zero buffers are removed rather than stored
    pub fn set_fee_buffer(&mut self, asset: &TokenId, amount: Amount) {
        if amount == 0 {
            self.fee_buffers.remove(asset);
        } else {
            self.fee_buffers.insert(*asset, amount);
        }
    }
}

/// `RouterStore` backed by memory, with checkpoint-based transaction layers
#[derive(Debug, Default)]
pub struct InMemoryRouterStore {
    state: RefCell<RouterState>,
    checkpoints: RefCell<Vec<RouterState>>,
}

impl InMemoryRouterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: RouterState) -> Self {
        Self {
            state: RefCell::new(state),
            checkpoints: RefCell::new(Vec::new()),
        }
    }

    /// Copy of the committed-or-pending state
    pub fn snapshot(&self) -> RouterState {
        self.state.borrow().clone()
    }

    pub fn transaction_depth(&self) -> usize {
        self.checkpoints.borrow().len()
    }
}

impl RouterStore for InMemoryRouterStore {
    fn config(&self) -> Option<RouterConfig> {
        self.state.borrow().config
    }

    fn put_config(&self, config: RouterConfig) {
        self.state.borrow_mut().config = Some(config);
    }

    fn is_paused(&self) -> bool {
        self.state.borrow().paused
    }

    fn set_paused(&self, paused: bool) {
        self.state.borrow_mut().paused = paused;
    }

    fn price_state(&self, asset: &TokenId) -> Option<TokenPriceState> {
        self.state.borrow().prices.get(asset).copied()
    }

    fn put_price_state(&self, asset: &TokenId, state: TokenPriceState) {
        self.state.borrow_mut().prices.insert(*asset, state);
    }

    fn fee_buffer(&self, asset: &TokenId) -> Amount {
        self.state.borrow().fee_buffer(asset)
    }

    fn put_fee_buffer(&self, asset: &TokenId, amount: Amount) {
        self.state.borrow_mut().set_fee_buffer(asset, amount);
    }

    fn total_burned(&self) -> Amount {
        self.state.borrow().total_burned
    }

    fn put_total_burned(&self, amount: Amount) {
        self.state.borrow_mut().total_burned = amount;
    }
}

impl Transactional for InMemoryRouterStore {
    fn begin_transaction(&self) {
        let snapshot = self.state.borrow().clone();
        self.checkpoints.borrow_mut().push(snapshot);
    }

    fn commit_transaction(&self) {
        self.checkpoints.borrow_mut().pop();
    }

    fn rollback_transaction(&self) {
        if let Some(snapshot) = self.checkpoints.borrow_mut().pop() {
            *self.state.borrow_mut() = snapshot;
        }
    }
}
