//! Token Snapshot
//!
//! Immutable point-in-time view of token metadata and account balances.
//! Produced only by the state reader, consumed read-only by presentation.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::units::{reformat_fixed, ETHER_DECIMALS};

/// Decimals assumed before a token has been read
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Fractional digits shown for token amounts
pub const DISPLAY_DECIMALS: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenSnapshot {
    /// Account the balances belong to
    pub account: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    /// Whole-unit total supply
    pub total_supply: String,
    /// Whole-unit token balance of `account`
    pub user_balance: String,
    /// Whole-unit native currency balance of `account`
    pub native_balance: String,
    /// Block every field was read at
    pub block_number: u64,
    /// Monotonic per-reader sequence, higher is fresher
    pub sequence: u64,
    pub fetched_at: DateTime<Utc>,
}

impl TokenSnapshot {
    /// Placeholder shown before the first successful read.
    pub fn empty(account: Address) -> Self {
        Self {
            account,
            name: String::new(),
            symbol: String::new(),
            decimals: DEFAULT_TOKEN_DECIMALS,
            total_supply: "0".to_string(),
            user_balance: "0".to_string(),
            native_balance: "0".to_string(),
            block_number: 0,
            sequence: 0,
            fetched_at: Utc::now(),
        }
    }

    /// Metadata has been read (name and symbol are known)
    pub fn is_loaded(&self) -> bool {
        !self.name.is_empty() && !self.symbol.is_empty()
    }

    pub fn is_newer_than(&self, other: &TokenSnapshot) -> bool {
        self.sequence > other.sequence
    }

    pub fn display_balance(&self) -> String {
        reformat_fixed(&self.user_balance, self.decimals, DISPLAY_DECIMALS)
    }

    pub fn display_total_supply(&self) -> String {
        reformat_fixed(&self.total_supply, self.decimals, DISPLAY_DECIMALS)
    }

    pub fn display_native_balance(&self) -> String {
        reformat_fixed(&self.native_balance, ETHER_DECIMALS, 4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded() -> TokenSnapshot {
        TokenSnapshot {
            name: "9StarGold".to_string(),
            symbol: "9SG".to_string(),
            total_supply: "1234.5".to_string(),
            user_balance: "1.0".to_string(),
            native_balance: "0.987654321".to_string(),
            block_number: 42,
            sequence: 3,
            ..TokenSnapshot::empty(Address::ZERO)
        }
    }

    #[test]
    fn test_empty_snapshot_defaults() {
        let snapshot = TokenSnapshot::empty(Address::ZERO);
        assert_eq!(snapshot.decimals, 18);
        assert_eq!(snapshot.user_balance, "0");
        assert!(!snapshot.is_loaded());
    }

    #[test]
    fn test_display_formatting() {
        let snapshot = loaded();
        assert!(snapshot.is_loaded());
        assert_eq!(snapshot.display_balance(), "1.000000");
        assert_eq!(snapshot.display_total_supply(), "1234.500000");
        assert_eq!(snapshot.display_native_balance(), "0.9876");
    }

    #[test]
    fn test_freshness_ordering() {
        let older = loaded();
        let newer = TokenSnapshot { sequence: 4, ..loaded() };
        assert!(newer.is_newer_than(&older));
        assert!(!older.is_newer_than(&newer));
    }
}
