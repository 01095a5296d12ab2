//! Linear minting curve
//!
//! The spot price of the anchor, in foreign units per anchor unit, grows
//! linearly with the minted supply:
//!
//! `price(s) = (initial_price + slope * s / PRECISION) / PRECISION`
//!
//! Minting is one-directional. The foreign input goes to the curve reserve
//! and every mint is split between the buyer and the protocol.

use lib_types::{Address, Amount, Bps};
use serde::{Deserialize, Serialize};

use crate::errors::{RouterError, RouterResult};
use crate::math::{checked_bps, checked_mul_div, integer_sqrt, PRECISION};

/// Mint amounts for one purchase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintQuote {
    pub total: Amount,
    pub user: Amount,
    pub protocol: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearMintCurve {
    /// Fixed-point foreign units per anchor unit at zero supply
    pub initial_price: u128,
    /// Fixed-point price increase per `PRECISION` anchor units minted
    pub slope: u128,
    /// Anchor units minted so far
    pub supply: Amount,
    /// Share of each mint credited to the buyer
    pub user_allocation_bps: Bps,
    /// Receives the foreign input
    pub reserve_account: Address,
    /// Receives the protocol share of each mint
    pub protocol_account: Address,
}

impl LinearMintCurve {
    /// Fixed-point spot price at the current supply
    pub fn spot_price(&self) -> RouterResult<u128> {
        let growth = checked_mul_div(self.slope, self.supply, PRECISION).ok_or(RouterError::ArithmeticOverflow)?;
        self.initial_price
            .checked_add(growth)
            .ok_or(RouterError::ArithmeticOverflow)
    }

    /// Anchor minted for `amount_in` foreign units.
    ///
    /// Integrating the price from the current supply over `d` units and
    /// solving for `d` gives, with `b` the spot price and
    /// `D = b^2 + 2 * slope * amount_in`:
    ///
    /// `d = 2 * amount_in * PRECISION / (b + sqrt(D))`
    ///
    /// A flat curve reduces to `amount_in * PRECISION / b`.
    pub fn quote(&self, amount_in: Amount) -> RouterResult<MintQuote> {
        if amount_in == 0 {
            return Err(RouterError::ZeroAmount);
        }
        let b = self.spot_price()?;

        let discriminant = b
            .checked_mul(b)
            .and_then(|bb| {
                self.slope
                    .checked_mul(2)
                    .and_then(|s2| s2.checked_mul(amount_in))
                    .and_then(|term| bb.checked_add(term))
            })
            .ok_or(RouterError::ArithmeticOverflow)?;
        let denominator = b
            .checked_add(integer_sqrt(discriminant))
            .ok_or(RouterError::ArithmeticOverflow)?;
        if denominator == 0 {
            return Err(RouterError::Collaborator("curve has zero price".to_string()));
        }

        let doubled = amount_in.checked_mul(2).ok_or(RouterError::ArithmeticOverflow)?;
        let total = checked_mul_div(doubled, PRECISION, denominator).ok_or(RouterError::ArithmeticOverflow)?;

        let user = checked_bps(total, self.user_allocation_bps).ok_or(RouterError::ArithmeticOverflow)?;
        Ok(MintQuote {
            total,
            user,
            protocol: total - user,
        })
    }
}
