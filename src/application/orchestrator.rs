//! Purchase Orchestrator
//!
//! Drives one purchase attempt through
//! `Idle -> Validating -> Submitting -> AwaitingConfirmation -> Refreshing -> Settled`,
//! with `Failed` reachable from the first three active states. Each state
//! carries exactly the data the next step needs, so a refresh before
//! settlement cannot be expressed.
//!
//! Transaction success and the follow-up read are separate failure domains:
//! a settled purchase whose refresh failed is still a successful result.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};

use super::chain_client::ChainClient;
use super::estimator::{MaxAmountEstimator, DEFAULT_FEE_RESERVE};
use super::reader::{ReaderError, TokenStateReader};
use crate::domain::{
    parse_address, parse_native_amount, InvalidPurchase, MintSource, MintSplit, PurchasePhase,
    PurchaseRequest, TokenSnapshot, ValidatedPurchase, DEFAULT_PROFIT_BPS, DEFAULT_TOKEN_DECIMALS,
};
use crate::ports::{ChainError, ChainWriter, Settlement, TransactionReceipt, TxHash};

#[derive(Debug, Error, Clone)]
pub enum PurchaseError {
    /// Local precondition violated, nothing was sent
    #[error("invalid input: {0}")]
    InvalidInput(#[from] InvalidPurchase),

    /// No session or signer when one was required, nothing was sent
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    #[error("chain reader unavailable")]
    ReaderUnavailable,

    #[error("query failed: {0}")]
    QueryFailed(String),

    /// The signer or node refused the transaction, nothing was sent
    #[error("transaction submission failed: {0}")]
    SubmissionFailed(String),

    /// The send errored after it may have reached the node, so the
    /// transaction may have been broadcast without a hash coming back
    #[error("transaction submission outcome unknown: {0}")]
    SubmissionUnknown(String),

    /// Sent and mined with failure status, or the wait errored
    #[error("transaction {tx_hash} failed to settle: {reason}")]
    SettlementFailed { tx_hash: TxHash, reason: String },

    /// Sent but not confirmed; it may still settle later
    #[error("transaction {tx_hash} is unconfirmed: {reason}")]
    Unconfirmed { tx_hash: TxHash, reason: String },

    #[error("a purchase is already in progress")]
    AlreadyInProgress,
}

impl PurchaseError {
    /// The caller can fix the input or wait and immediately retry
    pub fn is_local(&self) -> bool {
        matches!(self, PurchaseError::InvalidInput(_) | PurchaseError::AlreadyInProgress)
    }

    /// A transaction was broadcast, so funds may have moved
    pub fn funds_moved(&self) -> bool {
        matches!(
            self,
            PurchaseError::SubmissionUnknown(_)
                | PurchaseError::SettlementFailed { .. }
                | PurchaseError::Unconfirmed { .. }
        )
    }

    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            PurchaseError::SettlementFailed { tx_hash, .. }
            | PurchaseError::Unconfirmed { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

impl From<ReaderError> for PurchaseError {
    fn from(err: ReaderError) -> Self {
        match err {
            ReaderError::ReaderUnavailable => PurchaseError::ReaderUnavailable,
            ReaderError::NotConnected(account) => {
                PurchaseError::WalletUnavailable(format!("{account} is not connected"))
            }
            other => PurchaseError::QueryFailed(other.to_string()),
        }
    }
}

/// Post-settlement snapshot read failed. The purchase itself succeeded.
#[derive(Debug, Error, Clone)]
#[error("purchase settled but refreshing balances failed: {0}")]
pub struct RefreshFailed(#[from] pub ReaderError);

#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    Refreshed(TokenSnapshot),
    Failed(RefreshFailed),
}

/// A settled purchase
#[derive(Debug, Clone)]
pub struct PurchaseResult {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub user_tokens_minted: String,
    pub profit_tokens_minted: String,
    pub mint_source: MintSource,
    /// Phases traversed, in order
    pub trail: Vec<PurchasePhase>,
    pub refresh: RefreshOutcome,
}

impl PurchaseResult {
    pub fn snapshot(&self) -> Option<&TokenSnapshot> {
        match &self.refresh {
            RefreshOutcome::Refreshed(snapshot) => Some(snapshot),
            RefreshOutcome::Failed(_) => None,
        }
    }

    pub fn refresh_warning(&self) -> Option<&RefreshFailed> {
        match &self.refresh {
            RefreshOutcome::Refreshed(_) => None,
            RefreshOutcome::Failed(warning) => Some(warning),
        }
    }
}

/// Expected mint amounts for a request, without touching the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintPreview {
    pub native_amount: String,
    pub profit_recipient: Option<Address>,
    pub user_tokens: String,
    pub profit_tokens: String,
    pub total_tokens: String,
}

/// One state per step of an attempt
#[derive(Debug)]
pub enum PurchaseState {
    Idle,
    Validating(PurchaseRequest),
    Submitting(ValidatedPurchase),
    AwaitingConfirmation {
        purchase: ValidatedPurchase,
        tx_hash: TxHash,
    },
    Refreshing {
        purchase: ValidatedPurchase,
        receipt: TransactionReceipt,
    },
    Settled(PurchaseResult),
    Failed(PurchaseError),
}

impl PurchaseState {
    pub fn phase(&self) -> PurchasePhase {
        match self {
            PurchaseState::Idle => PurchasePhase::Idle,
            PurchaseState::Validating(_) => PurchasePhase::Validating,
            PurchaseState::Submitting(_) => PurchasePhase::Submitting,
            PurchaseState::AwaitingConfirmation { .. } => PurchasePhase::AwaitingConfirmation,
            PurchaseState::Refreshing { .. } => PurchasePhase::Refreshing,
            PurchaseState::Settled(_) => PurchasePhase::Settled,
            PurchaseState::Failed(_) => PurchasePhase::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase().is_terminal()
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Profit share the contract mints, in basis points
    pub profit_bps: u32,
    /// Give up waiting for a receipt after this long; `None` waits forever
    pub confirmation_timeout: Option<Duration>,
    /// Native currency kept back by `max_amount`
    pub fee_reserve: Decimal,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            profit_bps: DEFAULT_PROFIT_BPS,
            confirmation_timeout: Some(Duration::from_secs(300)),
            fee_reserve: DEFAULT_FEE_RESERVE,
        }
    }
}

/// State and capabilities of a single attempt
struct Attempt {
    client: ChainClient,
    reader: Arc<TokenStateReader>,
    config: OrchestratorConfig,
    phase_tx: Arc<watch::Sender<PurchasePhase>>,
    writer: Option<Arc<dyn ChainWriter>>,
    trail: Vec<PurchasePhase>,
}

impl Attempt {
    fn enter(&mut self, state: &PurchaseState) {
        let phase = state.phase();
        self.trail.push(phase);
        self.phase_tx.send_replace(phase);
        match state {
            PurchaseState::Failed(e) => tracing::warn!("Purchase failed: {}", e),
            _ => tracing::info!("Purchase phase: {}", phase),
        }
    }

    /// Run until a terminal state or, with `stop_after_submit`, until the
    /// transaction has been handed to the chain.
    async fn drive(&mut self, mut state: PurchaseState, stop_after_submit: bool) -> PurchaseState {
        loop {
            if state.is_terminal() {
                return state;
            }
            if stop_after_submit && matches!(state, PurchaseState::AwaitingConfirmation { .. }) {
                return state;
            }
            state = self.step(state).await;
            self.enter(&state);
        }
    }

    async fn step(&mut self, state: PurchaseState) -> PurchaseState {
        match state {
            PurchaseState::Idle => PurchaseState::Idle,
            PurchaseState::Validating(request) => match request.validate() {
                Ok(purchase) => PurchaseState::Submitting(purchase),
                Err(e) => PurchaseState::Failed(e.into()),
            },
            PurchaseState::Submitting(purchase) => self.submit(purchase).await,
            PurchaseState::AwaitingConfirmation { purchase, tx_hash } => {
                self.await_settlement(purchase, tx_hash).await
            }
            PurchaseState::Refreshing { purchase, receipt } => self.refresh(purchase, receipt).await,
            terminal => terminal,
        }
    }

    async fn submit(&mut self, purchase: ValidatedPurchase) -> PurchaseState {
        let Some(writer) = self.client.writer().await else {
            return PurchaseState::Failed(PurchaseError::WalletUnavailable(
                "no connected signer".to_string(),
            ));
        };

        tracing::info!(
            "Submitting buyGold: {} ETH from {} (profit to {})",
            purchase.native_amount,
            writer.sender(),
            purchase.profit_recipient
        );

        // Exactly one send; a value-bearing call is never retried here
        match writer.buy_gold(purchase.profit_recipient, purchase.value_wei).await {
            Ok(tx_hash) => {
                tracing::info!("Transaction sent: {}", tx_hash);
                self.writer = Some(writer);
                PurchaseState::AwaitingConfirmation { purchase, tx_hash }
            }
            Err(e @ (ChainError::Rejected(_) | ChainError::Node { .. })) => {
                PurchaseState::Failed(PurchaseError::SubmissionFailed(e.to_string()))
            }
            Err(e) => {
                tracing::error!("Send outcome unknown, transaction may have been broadcast: {}", e);
                PurchaseState::Failed(PurchaseError::SubmissionUnknown(e.to_string()))
            }
        }
    }

    async fn await_settlement(&mut self, purchase: ValidatedPurchase, tx_hash: TxHash) -> PurchaseState {
        let Some(writer) = self.writer.clone() else {
            return PurchaseState::Failed(PurchaseError::Unconfirmed {
                tx_hash,
                reason: "signer lost before confirmation".to_string(),
            });
        };

        let wait = writer.wait_for_settlement(tx_hash);
        let outcome = match self.config.confirmation_timeout {
            Some(limit) => match tokio::time::timeout(limit, wait).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    return PurchaseState::Failed(PurchaseError::Unconfirmed {
                        tx_hash,
                        reason: format!("no receipt after {limit:?}"),
                    })
                }
            },
            None => wait.await,
        };

        match outcome {
            Ok(Settlement::Confirmed(receipt)) => {
                tracing::info!("Transaction {} confirmed in block {}", tx_hash, receipt.block_number);
                PurchaseState::Refreshing { purchase, receipt }
            }
            Ok(Settlement::Reverted(receipt)) => {
                tracing::error!("Transaction {} reverted in block {}", tx_hash, receipt.block_number);
                PurchaseState::Failed(PurchaseError::SettlementFailed {
                    tx_hash,
                    reason: format!("reverted in block {}", receipt.block_number),
                })
            }
            Err(ChainError::Dropped(_)) => PurchaseState::Failed(PurchaseError::Unconfirmed {
                tx_hash,
                reason: "dropped or replaced before mining".to_string(),
            }),
            Err(e) => {
                tracing::error!("Waiting for {} failed: {}", tx_hash, e);
                PurchaseState::Failed(PurchaseError::SettlementFailed {
                    tx_hash,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn refresh(&mut self, purchase: ValidatedPurchase, receipt: TransactionReceipt) -> PurchaseState {
        let expected = MintSplit::expected(purchase.value_wei, self.config.profit_bps);
        let (minted, mint_source) = match receipt.minted {
            Some(reported) => {
                if reported != expected {
                    tracing::warn!(
                        "Minted amounts differ from documented split: expected {:?}, event reported {:?}",
                        expected,
                        reported
                    );
                }
                (reported, MintSource::Event)
            }
            None => (expected, MintSource::Computed),
        };

        let refresh = match self.writer.as_ref().map(|w| w.sender()) {
            Some(account) => match self.reader.load_snapshot(account).await {
                Ok(snapshot) => RefreshOutcome::Refreshed(snapshot),
                Err(e) => {
                    tracing::warn!("Purchase {} settled but refresh failed: {}", receipt.tx_hash, e);
                    RefreshOutcome::Failed(RefreshFailed(e))
                }
            },
            None => RefreshOutcome::Failed(RefreshFailed(ReaderError::ReaderUnavailable)),
        };

        let decimals = match &refresh {
            RefreshOutcome::Refreshed(snapshot) => snapshot.decimals,
            RefreshOutcome::Failed(_) => DEFAULT_TOKEN_DECIMALS,
        };

        let mut trail = self.trail.clone();
        trail.push(PurchasePhase::Settled);

        PurchaseState::Settled(PurchaseResult {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            user_tokens_minted: minted.user_display(decimals),
            profit_tokens_minted: minted.profit_display(decimals),
            mint_source,
            trail,
            refresh,
        })
    }
}

fn finish(state: PurchaseState) -> Result<PurchaseResult, PurchaseError> {
    match state {
        PurchaseState::Settled(result) => Ok(result),
        PurchaseState::Failed(e) => Err(e),
        other => Err(PurchaseError::QueryFailed(format!(
            "attempt stopped in non-terminal phase {}",
            other.phase()
        ))),
    }
}

/// Entry point for purchases and the max-amount helper
#[derive(Clone)]
pub struct PurchaseOrchestrator {
    client: ChainClient,
    reader: Arc<TokenStateReader>,
    estimator: MaxAmountEstimator,
    config: OrchestratorConfig,
    in_flight: Arc<Mutex<()>>,
    phase_tx: Arc<watch::Sender<PurchasePhase>>,
}

impl PurchaseOrchestrator {
    pub fn new(reader: Arc<TokenStateReader>, config: OrchestratorConfig) -> Self {
        let (phase_tx, _) = watch::channel(PurchasePhase::Idle);
        Self {
            client: reader.client().clone(),
            estimator: MaxAmountEstimator::new(reader.clone()),
            reader,
            config,
            in_flight: Arc::new(Mutex::new(())),
            phase_tx: Arc::new(phase_tx),
        }
    }

    pub fn reader(&self) -> &Arc<TokenStateReader> {
        &self.reader
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Phase of the current (or last) attempt
    pub fn subscribe_phase(&self) -> watch::Receiver<PurchasePhase> {
        self.phase_tx.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.try_lock().is_err()
    }

    /// Buy tokens with `request.native_amount` ETH, routing the profit share
    /// to `request.profit_recipient`.
    ///
    /// Only one attempt runs at a time; a second concurrent call gets
    /// `AlreadyInProgress`. Dropping the returned future before submission
    /// abandons the attempt. Once the transaction is sent, settlement and the
    /// refresh finish on a background task even if the caller goes away.
    pub async fn buy(&self, request: PurchaseRequest) -> Result<PurchaseResult, PurchaseError> {
        let guard = self
            .in_flight
            .clone()
            .try_lock_owned()
            .map_err(|_| PurchaseError::AlreadyInProgress)?;

        let mut attempt = Attempt {
            client: self.client.clone(),
            reader: self.reader.clone(),
            config: self.config.clone(),
            phase_tx: self.phase_tx.clone(),
            writer: None,
            trail: Vec::new(),
        };

        let idle = PurchaseState::Idle;
        attempt.enter(&idle);
        let validating = PurchaseState::Validating(request);
        attempt.enter(&validating);

        let state = attempt.drive(validating, true).await;
        let tx_hash = match &state {
            PurchaseState::AwaitingConfirmation { tx_hash, .. } => *tx_hash,
            _ => return finish(state),
        };

        let settle = tokio::spawn(settle_in_background(attempt, state, guard));
        match settle.await {
            Ok(state) => finish(state),
            Err(e) => Err(PurchaseError::Unconfirmed {
                tx_hash,
                reason: format!("settlement task aborted: {e}"),
            }),
        }
    }

    /// Expected mint split for `native_amount`, no network access. The
    /// recipient is optional here but validated when given.
    pub fn preview(&self, native_amount: &str, profit_recipient: Option<&str>) -> Result<MintPreview, PurchaseError> {
        let (amount, value_wei) = parse_native_amount(native_amount)?;
        let profit_recipient = profit_recipient
            .map(|r| parse_address(r.trim()).map_err(InvalidPurchase::from))
            .transpose()?;
        let split = MintSplit::expected(value_wei, self.config.profit_bps);

        Ok(MintPreview {
            native_amount: amount.to_string(),
            profit_recipient,
            user_tokens: split.user_display(DEFAULT_TOKEN_DECIMALS),
            profit_tokens: split.profit_display(DEFAULT_TOKEN_DECIMALS),
            total_tokens: split.total_display(DEFAULT_TOKEN_DECIMALS),
        })
    }

    /// Largest safe spend for the connected account; `None` uses the
    /// configured reserve.
    pub async fn max_amount(&self, fee_reserve: Option<Decimal>) -> Result<String, PurchaseError> {
        let account = self.connected_account()?;
        let reserve = fee_reserve.unwrap_or(self.config.fee_reserve);
        Ok(self.estimator.max_amount(account, reserve).await?)
    }

    /// Fresh snapshot for the connected account
    pub async fn refresh(&self) -> Result<TokenSnapshot, PurchaseError> {
        let account = self.connected_account()?;
        Ok(self.reader.load_snapshot(account).await?)
    }

    fn connected_account(&self) -> Result<Address, PurchaseError> {
        self.client
            .session()
            .active_account()
            .ok_or_else(|| PurchaseError::WalletUnavailable("wallet not connected".to_string()))
    }
}

async fn settle_in_background(
    mut attempt: Attempt,
    state: PurchaseState,
    _guard: OwnedMutexGuard<()>,
) -> PurchaseState {
    attempt.drive(state, false).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::mocks::{MockChain, MockWallet, ReadKind, SettlementBehavior};
    use crate::ports::WalletProvider;
    use alloy_primitives::U256;
    use rust_decimal_macros::dec;

    const RECIPIENT: &str = "0x000000000000000000000000000000000000dEaD";

    fn buyer() -> Address {
        Address::repeat_byte(0xb0)
    }

    fn ether(n: u64) -> U256 {
        U256::from(n) * U256::from(1_000_000_000_000_000_000u128)
    }

    fn orchestrator_for(chain: Arc<MockChain>, config: OrchestratorConfig) -> (Arc<MockWallet>, PurchaseOrchestrator) {
        let wallet = Arc::new(MockWallet::with_chain(chain));
        let provider: Arc<dyn WalletProvider> = wallet.clone();
        let reader = Arc::new(TokenStateReader::new(ChainClient::new(provider)));
        (wallet, PurchaseOrchestrator::new(reader, config))
    }

    fn setup(behavior: SettlementBehavior) -> (Arc<MockChain>, Arc<MockWallet>, PurchaseOrchestrator) {
        let chain = Arc::new(MockChain::new(buyer(), ether(10)).with_settlement(behavior));
        let (wallet, orchestrator) = orchestrator_for(chain.clone(), OrchestratorConfig::default());
        (chain, wallet, orchestrator)
    }

    #[tokio::test]
    async fn test_zero_amount_is_rejected_without_writes() {
        let (chain, wallet, orchestrator) = setup(SettlementBehavior::Confirm);

        let err = orchestrator.buy(PurchaseRequest::new("0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::InvalidInput(InvalidPurchase::NonPositiveAmount)));
        assert!(err.is_local());
        assert_eq!(chain.write_calls(), 0);
        assert_eq!(chain.total_reads(), 0);
        assert_eq!(wallet.signer_calls(), 0);
    }

    #[tokio::test]
    async fn test_invalid_recipient_is_rejected_without_writes() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);

        let err = orchestrator.buy(PurchaseRequest::new("1.0", "0xnotanaddress")).await.unwrap_err();

        assert!(matches!(err, PurchaseError::InvalidInput(InvalidPurchase::InvalidRecipient(_))));
        assert_eq!(chain.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_successful_purchase_walks_every_phase() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);

        let result = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap();

        assert_eq!(
            result.trail,
            vec![
                PurchasePhase::Idle,
                PurchasePhase::Validating,
                PurchasePhase::Submitting,
                PurchasePhase::AwaitingConfirmation,
                PurchasePhase::Refreshing,
                PurchasePhase::Settled,
            ]
        );
        assert_eq!(result.user_tokens_minted, "1.000000");
        assert_eq!(result.profit_tokens_minted, "0.010000");
        assert_eq!(result.mint_source, MintSource::Event);
        assert_eq!(chain.write_calls(), 1);
        assert_eq!(chain.read_count(ReadKind::Name), 1);

        let snapshot = result.snapshot().expect("refreshed snapshot");
        assert_eq!(snapshot.user_balance, "1.0");
        assert_eq!(snapshot.native_balance, "9.0");
        assert_eq!(*orchestrator.subscribe_phase().borrow(), PurchasePhase::Settled);
    }

    #[tokio::test]
    async fn test_submission_carries_value_and_recipient() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);

        orchestrator.buy(PurchaseRequest::new("0.25", RECIPIENT)).await.unwrap();

        let recipient = parse_address(RECIPIENT).unwrap();
        assert_eq!(
            chain.purchases(),
            vec![(recipient, U256::from(250_000_000_000_000_000u128))]
        );
    }

    #[tokio::test]
    async fn test_missing_event_falls_back_to_computed_split() {
        let (_chain, _wallet, orchestrator) = setup(SettlementBehavior::ConfirmWithoutEvent);

        let result = orchestrator.buy(PurchaseRequest::new("2", RECIPIENT)).await.unwrap();

        assert_eq!(result.mint_source, MintSource::Computed);
        assert_eq!(result.user_tokens_minted, "2.000000");
        assert_eq!(result.profit_tokens_minted, "0.020000");
    }

    #[tokio::test]
    async fn test_revert_fails_without_refresh() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Revert);

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::SettlementFailed { .. }));
        assert!(err.funds_moved());
        assert_eq!(chain.total_reads(), 0);
        assert_eq!(*orchestrator.subscribe_phase().borrow(), PurchasePhase::Failed);
    }

    #[tokio::test]
    async fn test_wait_error_is_settlement_failure() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::WaitError);

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::SettlementFailed { .. }));
        assert_eq!(chain.total_reads(), 0);
    }

    #[tokio::test]
    async fn test_dropped_transaction_is_unconfirmed() {
        let (_chain, _wallet, orchestrator) = setup(SettlementBehavior::Drop);

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::Unconfirmed { .. }));
        assert!(err.tx_hash().is_some());
    }

    #[tokio::test]
    async fn test_timeout_is_unconfirmed_not_failed() {
        let chain = Arc::new(MockChain::new(buyer(), ether(10)).with_settlement(SettlementBehavior::Hang));
        let config = OrchestratorConfig {
            confirmation_timeout: Some(Duration::from_millis(50)),
            ..OrchestratorConfig::default()
        };
        let (_wallet, orchestrator) = orchestrator_for(chain.clone(), config);

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::Unconfirmed { .. }));
        assert_eq!(chain.total_reads(), 0);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_refresh_failure_still_settles() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);
        chain.fail_reads_after_purchase();

        let result = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap();

        assert_eq!(result.trail.last(), Some(&PurchasePhase::Settled));
        assert!(result.snapshot().is_none());
        assert!(result.refresh_warning().is_some());
        assert_eq!(result.user_tokens_minted, "1.000000");
    }

    #[tokio::test]
    async fn test_disconnected_wallet_is_unavailable() {
        let (chain, wallet, orchestrator) = setup(SettlementBehavior::Confirm);
        wallet.disconnect();

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::WalletUnavailable(_)));
        assert!(!err.funds_moved());
        assert_eq!(chain.write_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_send_is_submission_failure() {
        let chain = Arc::new(
            MockChain::new(buyer(), ether(10))
                .with_submission_error(ChainError::Rejected("user denied transaction".into())),
        );
        let (_wallet, orchestrator) = orchestrator_for(chain.clone(), OrchestratorConfig::default());

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::SubmissionFailed(_)));
        assert!(!err.funds_moved());
        assert_eq!(chain.write_calls(), 1);
        assert_eq!(chain.wait_calls(), 0);
    }

    #[tokio::test]
    async fn test_lost_send_response_reports_possible_broadcast() {
        let chain = Arc::new(
            MockChain::new(buyer(), ether(10))
                .with_submission_error(ChainError::Transport("Request timed out".into())),
        );
        let (_wallet, orchestrator) = orchestrator_for(chain.clone(), OrchestratorConfig::default());

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::SubmissionUnknown(_)));
        assert!(err.funds_moved());
        assert!(!err.is_local());
        assert!(err.tx_hash().is_none());
        assert_eq!(chain.wait_calls(), 0);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_undecodable_send_response_reports_possible_broadcast() {
        let chain = Arc::new(
            MockChain::new(buyer(), ether(10))
                .with_submission_error(ChainError::Decode("invalid tx hash".into())),
        );
        let (_wallet, orchestrator) = orchestrator_for(chain, OrchestratorConfig::default());

        let err = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await.unwrap_err();

        assert!(matches!(err, PurchaseError::SubmissionUnknown(_)));
        assert!(err.funds_moved());
    }

    #[tokio::test]
    async fn test_concurrent_attempt_is_rejected() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);
        chain.hold_settlement();

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await })
        };

        let mut phase = orchestrator.subscribe_phase();
        phase
            .wait_for(|p| *p == PurchasePhase::AwaitingConfirmation)
            .await
            .unwrap();

        let second = orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await;
        assert!(matches!(second, Err(PurchaseError::AlreadyInProgress)));

        chain.release_settlement();
        assert!(first.await.unwrap().is_ok());
        assert_eq!(chain.write_calls(), 1);
        assert!(!orchestrator.is_busy());
    }

    #[tokio::test]
    async fn test_settlement_survives_dropped_caller() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);
        chain.hold_settlement();

        let caller = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.buy(PurchaseRequest::new("1.0", RECIPIENT)).await })
        };
        let mut phase = orchestrator.subscribe_phase();
        phase
            .wait_for(|p| *p == PurchasePhase::AwaitingConfirmation)
            .await
            .unwrap();
        caller.abort();
        let _ = caller.await;

        assert!(orchestrator.is_busy());
        chain.release_settlement();
        phase.wait_for(|p| *p == PurchasePhase::Settled).await.unwrap();
        assert_eq!(chain.read_count(ReadKind::Name), 1);
    }

    #[tokio::test]
    async fn test_preview_matches_documented_split() {
        let (chain, _wallet, orchestrator) = setup(SettlementBehavior::Confirm);

        let preview = orchestrator.preview("0.5", None).unwrap();

        assert_eq!(preview.user_tokens, "0.500000");
        assert_eq!(preview.profit_tokens, "0.005000");
        assert_eq!(preview.total_tokens, "0.505000");
        assert!(preview.profit_recipient.is_none());
        assert_eq!(chain.total_reads(), 0);

        let with_recipient = orchestrator.preview("1", Some(RECIPIENT)).unwrap();
        assert!(with_recipient.profit_recipient.is_some());
        assert!(matches!(
            orchestrator.preview("1", Some("0x123")),
            Err(PurchaseError::InvalidInput(InvalidPurchase::InvalidRecipient(_)))
        ));
        assert!(matches!(
            orchestrator.preview("0", None),
            Err(PurchaseError::InvalidInput(InvalidPurchase::NonPositiveAmount))
        ));
    }

    #[tokio::test]
    async fn test_max_amount_uses_configured_reserve() {
        let chain = Arc::new(MockChain::new(buyer(), U256::from(50_000_000_000_000_000u128)));
        let (wallet, orchestrator) = orchestrator_for(chain, OrchestratorConfig::default());

        assert_eq!(orchestrator.max_amount(None).await.unwrap(), "0.0400");
        assert_eq!(orchestrator.max_amount(Some(dec!(0.06))).await.unwrap(), "0.0000");

        wallet.disconnect();
        assert!(matches!(
            orchestrator.max_amount(None).await,
            Err(PurchaseError::WalletUnavailable(_))
        ));
    }
}
