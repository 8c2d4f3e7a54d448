//! Purchase domain types
//!
//! Request validation and the mint split the token contract applies to each
//! `buyGold` call: the buyer receives tokens equal to the value sent and the
//! profit recipient receives an extra `profit_bps` basis points of it.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use super::address::{parse_address, AddressError};
use super::snapshot::DISPLAY_DECIMALS;
use super::units::{format_fixed, parse_units, UnitsError, ETHER_DECIMALS};

/// Profit share minted by the contract, in basis points (1%)
pub const DEFAULT_PROFIT_BPS: u32 = 100;

pub const BPS_DENOMINATOR: u32 = 10_000;

/// Local precondition violations. Nothing has been sent when one of these is
/// returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidPurchase {
    #[error("amount is required")]
    MissingAmount,

    #[error("profit wallet is required")]
    MissingRecipient,

    #[error("amount {0:?} is not a decimal number")]
    MalformedAmount(String),

    #[error("amount must be greater than zero")]
    NonPositiveAmount,

    #[error("amount {amount}: {source}")]
    UnrepresentableAmount {
        amount: String,
        #[source]
        source: UnitsError,
    },

    #[error("invalid profit wallet address: {0}")]
    InvalidRecipient(#[from] AddressError),
}

/// A purchase intent exactly as the caller supplied it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    /// Native currency to spend, whole units ("0.1")
    pub native_amount: String,
    /// Account receiving the profit share
    pub profit_recipient: String,
}

impl PurchaseRequest {
    pub fn new(native_amount: impl Into<String>, profit_recipient: impl Into<String>) -> Self {
        Self {
            native_amount: native_amount.into(),
            profit_recipient: profit_recipient.into(),
        }
    }

    /// Check every local precondition. Pure: no side effects.
    pub fn validate(&self) -> Result<ValidatedPurchase, InvalidPurchase> {
        let amount = self.native_amount.trim();
        if amount.is_empty() {
            return Err(InvalidPurchase::MissingAmount);
        }
        if self.profit_recipient.trim().is_empty() {
            return Err(InvalidPurchase::MissingRecipient);
        }

        let (native_amount, value_wei) = parse_native_amount(amount)?;
        let profit_recipient = parse_address(self.profit_recipient.trim())?;

        Ok(ValidatedPurchase {
            native_amount,
            value_wei,
            profit_recipient,
        })
    }
}

/// Parse a whole-unit native amount into its decimal and wei forms.
/// Must be positive and representable in wei.
pub fn parse_native_amount(amount: &str) -> Result<(Decimal, U256), InvalidPurchase> {
    let amount = amount.trim();
    if amount.is_empty() {
        return Err(InvalidPurchase::MissingAmount);
    }

    let native_amount = Decimal::from_str(amount)
        .map_err(|_| InvalidPurchase::MalformedAmount(amount.to_string()))?;
    if native_amount <= Decimal::ZERO {
        return Err(InvalidPurchase::NonPositiveAmount);
    }

    let value_wei = parse_units(amount, ETHER_DECIMALS).map_err(|source| {
        InvalidPurchase::UnrepresentableAmount {
            amount: amount.to_string(),
            source,
        }
    })?;
    if value_wei.is_zero() {
        return Err(InvalidPurchase::NonPositiveAmount);
    }

    Ok((native_amount, value_wei))
}

/// A request that passed validation and is ready to submit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPurchase {
    pub native_amount: Decimal,
    /// Transaction value in wei
    pub value_wei: U256,
    pub profit_recipient: Address,
}

/// Token amounts minted by one purchase, in token base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MintSplit {
    pub user_tokens: U256,
    pub profit_tokens: U256,
}

impl MintSplit {
    /// The split the contract documents: 100% of value to the buyer plus
    /// `profit_bps` of value to the profit recipient.
    pub fn expected(value_wei: U256, profit_bps: u32) -> Self {
        Self {
            user_tokens: value_wei,
            profit_tokens: value_wei * U256::from(profit_bps) / U256::from(BPS_DENOMINATOR),
        }
    }

    pub fn total(&self) -> U256 {
        self.user_tokens.saturating_add(self.profit_tokens)
    }

    pub fn user_display(&self, decimals: u8) -> String {
        format_fixed(self.user_tokens, decimals, DISPLAY_DECIMALS)
    }

    pub fn profit_display(&self, decimals: u8) -> String {
        format_fixed(self.profit_tokens, decimals, DISPLAY_DECIMALS)
    }

    pub fn total_display(&self, decimals: u8) -> String {
        format_fixed(self.total(), decimals, DISPLAY_DECIMALS)
    }
}

/// Where the reported mint amounts came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MintSource {
    /// Decoded from the `GoldPurchased` event in the receipt
    Event,
    /// Computed from the documented split; the receipt carried no event
    Computed,
}

/// Observable projection of a purchase attempt's state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchasePhase {
    Idle,
    Validating,
    Submitting,
    AwaitingConfirmation,
    Refreshing,
    Settled,
    Failed,
}

impl PurchasePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PurchasePhase::Settled | PurchasePhase::Failed)
    }
}

impl fmt::Display for PurchasePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PurchasePhase::Idle => "idle",
            PurchasePhase::Validating => "validating",
            PurchasePhase::Submitting => "submitting",
            PurchasePhase::AwaitingConfirmation => "awaiting confirmation",
            PurchasePhase::Refreshing => "refreshing",
            PurchasePhase::Settled => "settled",
            PurchasePhase::Failed => "failed",
        };
        f.write_str(label)
    }
}
