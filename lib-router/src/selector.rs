//! Path & mechanism selection
//!
//! Two candidate paths are considered for every trade: the direct pair and
//! the pair mediated by the anchor asset. Each hop independently picks
//! whichever mechanism quotes the larger output; there is no a-priori
//! preference for the pool or the curve.

use lib_types::{Amount, TokenId};
use tracing::debug;

use crate::capabilities::{MintingCurve, PoolLiquidity};
use crate::errors::{RouterError, RouterResult};
use crate::types::{Hop, Mechanism, Route};

pub struct PathSelector<'a> {
    pools: &'a dyn PoolLiquidity,
    curve: &'a dyn MintingCurve,
    anchor: TokenId,
}

impl<'a> PathSelector<'a> {
    pub fn new(pools: &'a dyn PoolLiquidity, curve: &'a dyn MintingCurve, anchor: TokenId) -> Self {
        Self { pools, curve, anchor }
    }

    /// Candidate paths in preference order for ties
    pub fn candidate_paths(&self, from: TokenId, to: TokenId) -> Vec<Vec<TokenId>> {
        let mut paths = vec![vec![from, to]];
        if from != self.anchor && to != self.anchor {
            paths.push(vec![from, self.anchor, to]);
        }
        paths
    }

    /// Best route by final output; ties keep the earlier candidate.
    pub fn find_best_route(&self, from: TokenId, to: TokenId, amount: Amount) -> RouterResult<Route> {
        let mut best: Option<Route> = None;

        for path in self.candidate_paths(from, to) {
            let Some(route) = self.route_for_path(&path, amount) else {
                debug!("Path {:?} has no viable mechanism", path);
                continue;
            };
            let better = best
                .as_ref()
                .map_or(true, |current| route.expected_output > current.expected_output);
            if better {
                best = Some(route);
            }
        }

        best.ok_or(RouterError::NoRouteFound { from, to })
    }

    /// Compose hops along `path`; `None` if any hop is unresolvable
    pub fn route_for_path(&self, path: &[TokenId], amount: Amount) -> Option<Route> {
        if path.len() < 2 {
            return None;
        }

        let mut hops = Vec::with_capacity(path.len() - 1);
        let mut carried = amount;
        for pair in path.windows(2) {
            let hop = self.find_best_hop(pair[0], pair[1], carried)?;
            carried = hop.expected_output;
            hops.push(hop);
        }

        Some(Route {
            path: path.to_vec(),
            hops,
            expected_output: carried,
        })
    }

    /// Pick the mechanism with the strictly larger quote for one hop.
    ///
    /// The pool is queried first and kept on an exact tie.
    pub fn find_best_hop(&self, from: TokenId, to: TokenId, amount: Amount) -> Option<Hop> {
        if amount == 0 || from == to {
            return None;
        }

        let pool = self
            .pools
            .quote_exact_in(&from, &to, amount)
            .filter(|q| q.amount_out > 0)
            .map(|q| (Mechanism::PoolSwap { pool_id: q.pool_id }, q.amount_out));

        let curve = if self.curve_eligible(&from, &to) {
            match self.curve.quote_mint(&from, amount) {
                Ok(out) if out > 0 => Some((Mechanism::CurveMint, out)),
                Ok(_) => None,
                Err(err) => {
                    debug!("Curve quote for {} unavailable: {}", from, err);
                    None
                }
            }
        } else {
            None
        };

        let (mechanism, expected_output) = match (pool, curve) {
            (Some(p), Some(c)) => {
                if c.1 > p.1 {
                    c
                } else {
                    p
                }
            }
            (Some(p), None) => p,
            (None, Some(c)) => c,
            (None, None) => return None,
        };

        Some(Hop {
            from,
            to,
            mechanism,
            amount_in: amount,
            expected_output,
        })
    }

    fn curve_eligible(&self, from: &TokenId, to: &TokenId) -> bool {
        Mechanism::CurveMint.is_legal(from, to, &self.anchor) && self.curve.has_curve(from)
    }
}
