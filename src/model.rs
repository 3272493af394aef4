//! Core deposit entity and amount scaling helpers.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

/// Native coins on EVM chains carry 18 decimals.
pub const NATIVE_DECIMALS: u8 = 18;

/// Confirmation state machine:
/// `UNCONFIRMED -> CONFIRMING -> CONFIRMED` (terminal). A deposit whose
/// first observation already exceeds the threshold may jump straight from
/// `UNCONFIRMED` to `CONFIRMED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepositStatus {
    Unconfirmed,
    Confirming,
    Confirmed,
}

impl DepositStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unconfirmed => "UNCONFIRMED",
            Self::Confirming => "CONFIRMING",
            Self::Confirmed => "CONFIRMED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "UNCONFIRMED" => Some(Self::Unconfirmed),
            "CONFIRMING" => Some(Self::Confirming),
            "CONFIRMED" => Some(Self::Confirmed),
            _ => None,
        }
    }

    /// Pending deposits are the ones the confirmation tracker still visits.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Unconfirmed | Self::Confirming)
    }
}

impl fmt::Display for DepositStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Native` iff the deposit has no token contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Asset {
    Native,
    Erc20,
}

impl Asset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Native => "NATIVE",
            Self::Erc20 => "ERC20",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NATIVE" => Some(Self::Native),
            "ERC20" => Some(Self::Erc20),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored deposit row. Created once by the pipeline, mutated only by the
/// confirmation tracker (status and confirmations), never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct Deposit {
    pub id: i64,
    pub tx_hash: String,
    pub user_address: Option<String>,
    pub monitored_address: Option<String>,
    pub chain: String,
    pub token_address: Option<String>,
    pub asset: Asset,
    pub amount: Decimal,
    pub decimals: i32,
    pub block_number: i64,
    pub status: DepositStatus,
    pub confirmations: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A detected transfer on its way into the store.
#[derive(Debug, Clone)]
pub struct NewDeposit {
    pub tx_hash: String,
    pub monitored_address: String,
    pub chain: String,
    pub token_address: Option<String>,
    pub asset: Asset,
    pub amount: Decimal,
    pub decimals: u8,
    pub block_number: u64,
}

/// Scale a raw on-chain integer amount down by `10^decimals`.
///
/// Returns `None` when the value does not fit the decimal range (raw amounts
/// beyond ~7.9e28 or more than 28 decimals); callers log and skip those.
pub fn scale_units(raw: U256, decimals: u8) -> Option<Decimal> {
    let mantissa = i128::try_from(raw).ok()?;
    Decimal::try_from_i128_with_scale(mantissa, u32::from(decimals)).ok()
}

/// Convert a wei amount to whole native coins (18 decimals).
pub fn wei_to_coin(wei: U256) -> Option<Decimal> {
    scale_units(wei, NATIVE_DECIMALS)
}

/// Canonical lowercase `0x…` form used for stored addresses, so that rows
/// compare cleanly regardless of how the source checksums them.
pub fn format_address(address: &Address) -> String {
    address.to_string().to_lowercase()
}
