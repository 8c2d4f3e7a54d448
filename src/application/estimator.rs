//! Max-Amount Estimator
//!
//! Largest native amount worth offering as a purchase: balance minus a static
//! fee reserve. The reserve is a conservative buffer, not a fee estimate, so
//! a purchase at the returned amount can still fail if fees spike.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::reader::{ReaderError, TokenStateReader};
use crate::domain::{format_fixed, parse_units, ETHER_DECIMALS};

/// Native currency kept back for the purchase transaction's own fee
pub const DEFAULT_FEE_RESERVE: Decimal = dec!(0.01);

/// Fractional digits of the returned amount
pub const MAX_AMOUNT_PLACES: usize = 4;

#[derive(Clone)]
pub struct MaxAmountEstimator {
    reader: Arc<TokenStateReader>,
}

impl MaxAmountEstimator {
    pub fn new(reader: Arc<TokenStateReader>) -> Self {
        Self { reader }
    }

    /// Balance of `account` minus `fee_reserve`, floored at zero, with exactly
    /// four decimals ("0.0400").
    ///
    /// Digits past the fourth are truncated, never rounded: 1.23456789 ETH
    /// with the default reserve gives "1.2245", not the `toFixed(4)`-style
    /// "1.2246". The result never exceeds the spendable balance.
    pub async fn max_amount(&self, account: Address, fee_reserve: Decimal) -> Result<String, ReaderError> {
        let balance = self.reader.native_balance_wei(account).await?;
        let max = max_spend(balance, fee_reserve);
        tracing::debug!("Max spend for {}: {} (reserve {})", account, max, fee_reserve);
        Ok(max)
    }
}

/// Pure part of the estimate, in wei to stay exact. Truncates to
/// [`MAX_AMOUNT_PLACES`].
pub fn max_spend(balance_wei: U256, fee_reserve: Decimal) -> String {
    let spendable = balance_wei.saturating_sub(reserve_wei(fee_reserve));
    format_fixed(spendable, ETHER_DECIMALS, MAX_AMOUNT_PLACES)
}

fn reserve_wei(fee_reserve: Decimal) -> U256 {
    if fee_reserve <= Decimal::ZERO {
        return U256::ZERO;
    }
    let reserve = fee_reserve.round_dp(ETHER_DECIMALS as u32).normalize();
    // A reserve too large to represent leaves nothing spendable
    parse_units(&reserve.to_string(), ETHER_DECIMALS).unwrap_or(U256::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ChainClient;
    use crate::ports::chain::MockChainReader;
    use crate::ports::mocks::MockWallet;
    use std::str::FromStr;

    fn ether(s: &str) -> U256 {
        parse_units(s, ETHER_DECIMALS).unwrap()
    }

    #[test]
    fn test_max_spend_subtracts_reserve() {
        assert_eq!(max_spend(ether("0.05"), dec!(0.01)), "0.0400");
        assert_eq!(max_spend(ether("1.23456789"), dec!(0.01)), "1.2245");
    }

    #[test]
    fn test_max_spend_clamps_at_zero() {
        assert_eq!(max_spend(ether("0.005"), dec!(0.01)), "0.0000");
        assert_eq!(max_spend(U256::ZERO, DEFAULT_FEE_RESERVE), "0.0000");
    }

    #[test]
    fn test_max_spend_reserve_edge_cases() {
        assert_eq!(max_spend(ether("0.05"), Decimal::ZERO), "0.0500");
        assert_eq!(max_spend(ether("0.05"), dec!(-1)), "0.0500");
        assert_eq!(max_spend(ether("5"), Decimal::from_str("0.0000000000000000001").unwrap()), "5.0000");
    }

    #[tokio::test]
    async fn test_max_amount_reads_only_native_balance() {
        let account = Address::repeat_byte(0x33);
        let mut chain = MockChainReader::new();
        chain
            .expect_native_balance()
            .times(1)
            .returning(|_, _| Ok(parse_units("0.05", 18).unwrap()));

        let wallet = MockWallet::new().with_reader(Arc::new(chain));
        wallet.connect(account);
        let reader = Arc::new(TokenStateReader::new(ChainClient::new(Arc::new(wallet))));
        let estimator = MaxAmountEstimator::new(reader);

        let max = estimator.max_amount(account, DEFAULT_FEE_RESERVE).await.unwrap();
        assert_eq!(max, "0.0400");
    }

    #[tokio::test]
    async fn test_max_amount_propagates_query_failure() {
        let mut chain = MockChainReader::new();
        chain
            .expect_native_balance()
            .returning(|_, _| Err(crate::ports::ChainError::Transport("timeout".into())));

        let account = Address::repeat_byte(0x34);
        let wallet = MockWallet::new().with_reader(Arc::new(chain));
        wallet.connect(account);
        let reader = Arc::new(TokenStateReader::new(ChainClient::new(Arc::new(wallet))));
        let estimator = MaxAmountEstimator::new(reader);

        let result = estimator.max_amount(account, DEFAULT_FEE_RESERVE).await;
        assert!(matches!(result, Err(ReaderError::QueryFailed { query: "getBalance", .. })));
    }
}
