//! Router configuration
//!
//! Set once at initialization and changed only through the admin update path.
//! Loadable from TOML, where identifiers are written as hex strings:
//!
//! ```toml
//! anchor = "native"
//! router_fee_bps = 50
//! max_price_deviation_bps = 2000
//! oracle_half_life = 100
//! admin = "0101010101010101010101010101010101010101010101010101010101010101"
//! fee_account = "0202020202020202020202020202020202020202020202020202020202020202"
//! ```

use lib_types::{Address, BlockHeight, Bps, TokenId};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{RouterError, RouterResult};
use crate::{
    DEFAULT_MAX_PRICE_DEVIATION_BPS, DEFAULT_ORACLE_HALF_LIFE, DEFAULT_ROUTER_FEE_BPS,
    MAX_PRICE_DEVIATION_BPS, MAX_ROUTER_FEE_BPS,
};

/// Serialize 32-byte identifiers through their hex `Display`/`FromStr` forms
mod hex_id {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

fn default_anchor() -> TokenId {
    TokenId::NATIVE
}

fn default_router_fee_bps() -> Bps {
    DEFAULT_ROUTER_FEE_BPS
}

fn default_max_price_deviation_bps() -> Bps {
    DEFAULT_MAX_PRICE_DEVIATION_BPS
}

fn default_oracle_half_life() -> BlockHeight {
    DEFAULT_ORACLE_HALF_LIFE
}

/// Router configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfig {
    /// The single asset all prices are denominated in
    #[serde(default = "default_anchor", with = "hex_id")]
    pub anchor: TokenId,
    /// Maximum deviation of a route's rate from the oracle rate
    #[serde(default = "default_max_price_deviation_bps")]
    pub max_price_deviation_bps: Bps,
    /// Fee skimmed from every swap input
    #[serde(default = "default_router_fee_bps")]
    pub router_fee_bps: Bps,
    /// Oracle half-life in blocks
    #[serde(default = "default_oracle_half_life")]
    pub oracle_half_life: BlockHeight,
    /// Address authorized for pause and config updates
    #[serde(with = "hex_id")]
    pub admin: Address,
    /// Account holding buffered fees; burns are taken from it
    #[serde(with = "hex_id")]
    pub fee_account: Address,
}

impl RouterConfig {
    /// Configuration with default parameters and the native anchor
    pub fn new(admin: Address, fee_account: Address) -> Self {
        Self {
            anchor: default_anchor(),
            max_price_deviation_bps: DEFAULT_MAX_PRICE_DEVIATION_BPS,
            router_fee_bps: DEFAULT_ROUTER_FEE_BPS,
            oracle_half_life: DEFAULT_ORACLE_HALF_LIFE,
            admin,
            fee_account,
        }
    }

    pub fn with_anchor(mut self, anchor: TokenId) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn with_router_fee_bps(mut self, bps: Bps) -> Self {
        self.router_fee_bps = bps;
        self
    }

    pub fn with_max_price_deviation_bps(mut self, bps: Bps) -> Self {
        self.max_price_deviation_bps = bps;
        self
    }

    pub fn with_oracle_half_life(mut self, blocks: BlockHeight) -> Self {
        self.oracle_half_life = blocks;
        self
    }

    pub fn validate(&self) -> RouterResult<()> {
        if self.router_fee_bps > MAX_ROUTER_FEE_BPS {
            return Err(RouterError::InvalidConfig(format!(
                "router_fee_bps {} exceeds maximum {}",
                self.router_fee_bps, MAX_ROUTER_FEE_BPS
            )));
        }
        if self.max_price_deviation_bps > MAX_PRICE_DEVIATION_BPS {
            return Err(RouterError::InvalidConfig(format!(
                "max_price_deviation_bps {} exceeds maximum {}",
                self.max_price_deviation_bps, MAX_PRICE_DEVIATION_BPS
            )));
        }
        if self.admin.is_zero() {
            return Err(RouterError::InvalidConfig("admin address is zero".to_string()));
        }
        if self.fee_account.is_zero() {
            return Err(RouterError::InvalidConfig("fee account is zero".to_string()));
        }
        Ok(())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(raw: &str) -> RouterResult<Self> {
        let config: RouterConfig =
            toml::from_str(raw).map_err(|e| RouterError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RouterError::InvalidConfig(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!(
            "Loaded router config from {}: fee={}bps deviation={}bps half_life={}",
            path.display(),
            config.router_fee_bps,
            config.max_price_deviation_bps,
            config.oracle_half_life
        );
        Ok(config)
    }

    pub fn to_toml_string(&self) -> RouterResult<String> {
        toml::to_string(self).map_err(|e| RouterError::InvalidConfig(e.to_string()))
    }
}

/// Partial configuration change applied by the admin
///
/// The anchor is fixed for the lifetime of a router instance and cannot be
/// changed here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterConfigUpdate {
    pub router_fee_bps: Option<Bps>,
    pub max_price_deviation_bps: Option<Bps>,
    pub oracle_half_life: Option<BlockHeight>,
    pub admin: Option<Address>,
    pub fee_account: Option<Address>,
}

impl RouterConfigUpdate {
    /// Apply to `current`, returning the validated result
    pub fn apply(&self, current: &RouterConfig) -> RouterResult<RouterConfig> {
        let mut next = *current;
        if let Some(bps) = self.router_fee_bps {
            next.router_fee_bps = bps;
        }
        if let Some(bps) = self.max_price_deviation_bps {
            next.max_price_deviation_bps = bps;
        }
        if let Some(blocks) = self.oracle_half_life {
            next.oracle_half_life = blocks;
        }
        if let Some(admin) = self.admin {
            next.admin = admin;
        }
        if let Some(account) = self.fee_account {
            next.fee_account = account;
        }
        next.validate()?;
        Ok(next)
    }
}
