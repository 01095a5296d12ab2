//! Fee accumulation and burn
//!
//! Router fees land in the fee account and are tracked per asset in a buffer.
//! Once a buffer reaches [`MIN_BURN_THRESHOLD`] it is flushed: anchor fees are
//! burned as they are, other assets are first converted to the anchor. A
//! failed conversion is rolled back and the buffer is kept for the next
//! receipt.

use lib_types::{Address, Amount, BlockHeight, TokenId};
use tracing::{info, warn};

use crate::capabilities::{with_transaction, AnchorConverter, AssetLedger, EventSink, RouterStore, Transactional};
use crate::errors::{RouterError, RouterResult};
use crate::events::RouterEvent;
use crate::MIN_BURN_THRESHOLD;

/// Result of handing a fee to the manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeeOutcome {
    /// Below threshold, nothing flushed
    Buffered { buffered: Amount },
    /// Buffer flushed and `burned` anchor units destroyed
    Burned { flushed: Amount, burned: Amount },
    /// Flush attempted but failed; buffer retained
    ConversionDeferred { buffered: Amount, reason: String },
}

pub struct FeeManager<'a> {
    store: &'a dyn RouterStore,
    ledger: &'a dyn AssetLedger,
    converter: &'a dyn AnchorConverter,
    transactions: &'a dyn Transactional,
    events: &'a dyn EventSink,
    anchor: TokenId,
    fee_account: Address,
}

impl<'a> FeeManager<'a> {
    pub fn new(
        store: &'a dyn RouterStore,
        ledger: &'a dyn AssetLedger,
        converter: &'a dyn AnchorConverter,
        transactions: &'a dyn Transactional,
        events: &'a dyn EventSink,
        anchor: TokenId,
        fee_account: Address,
    ) -> Self {
        Self {
            store,
            ledger,
            converter,
            transactions,
            events,
            anchor,
            fee_account,
        }
    }

    pub fn total_burned(&self) -> Amount {
        self.store.total_burned()
    }

    pub fn buffer(&self, asset: &TokenId) -> Amount {
        self.store.fee_buffer(asset)
    }

    /// Record `amount` of `asset` already held by the fee account and try to
    /// flush the buffer.
    pub fn receive_fee(&self, asset: &TokenId, amount: Amount, now: BlockHeight) -> RouterResult<FeeOutcome> {
        let buffered = self
            .store
            .fee_buffer(asset)
            .checked_add(amount)
            .ok_or(RouterError::ArithmeticOverflow)?;
        self.store.put_fee_buffer(asset, buffered);

        if buffered < MIN_BURN_THRESHOLD {
            return Ok(FeeOutcome::Buffered { buffered });
        }

        match with_transaction(self.transactions, || self.flush(asset, buffered)) {
            Ok(burned) => {
                self.store.put_fee_buffer(asset, 0);
                let total = self.store.total_burned().saturating_add(burned);
                self.store.put_total_burned(total);

                info!(
                    "Burned {} anchor from {} {} in fees (total burned {})",
                    burned, buffered, asset, total
                );
                self.events.emit(RouterEvent::FeeBurned {
                    asset: *asset,
                    flushed: buffered,
                    burned,
                    block_height: now,
                });
                Ok(FeeOutcome::Burned {
                    flushed: buffered,
                    burned,
                })
            }
            Err(err) => {
                let reason = err.to_string();
                warn!("Fee flush for {} deferred, {} kept in buffer: {}", asset, buffered, reason);
                self.events.emit(RouterEvent::FeeConversionDeferred {
                    asset: *asset,
                    buffered,
                    reason: reason.clone(),
                    block_height: now,
                });
                Ok(FeeOutcome::ConversionDeferred { buffered, reason })
            }
        }
    }

    /// Convert (if needed) and burn; returns the anchor amount destroyed
    fn flush(&self, asset: &TokenId, amount: Amount) -> RouterResult<Amount> {
        let anchor_amount = if asset == &self.anchor {
            amount
        } else {
            self.converter.convert_to_anchor(&self.fee_account, asset, amount)?
        };
        if anchor_amount > 0 {
            self.ledger.burn(&self.anchor, &self.fee_account, anchor_amount)?;
        }
        Ok(anchor_amount)
    }
}
