//! Recording test doubles for the chain and wallet ports.
//!
//! `MockChain` keeps a tiny in-memory ledger so a refresh after a purchase
//! observes the minted balances, counts every call, and lets tests inject
//! read failures and settlement outcomes.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use tokio::sync::{watch, Notify};

use super::chain::{
    BlockTag, ChainError, ChainReader, ChainWriter, Settlement, TransactionReceipt, TxHash,
};
use super::wallet::{Session, WalletProvider};
use crate::domain::{MintSplit, DEFAULT_PROFIT_BPS};

/// One logical read on [`ChainReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadKind {
    BlockNumber,
    Name,
    Symbol,
    Decimals,
    TotalSupply,
    TokenBalance,
    NativeBalance,
}

impl ReadKind {
    pub const ALL: [ReadKind; 7] = [
        ReadKind::BlockNumber,
        ReadKind::Name,
        ReadKind::Symbol,
        ReadKind::Decimals,
        ReadKind::TotalSupply,
        ReadKind::TokenBalance,
        ReadKind::NativeBalance,
    ];
}

/// What `wait_for_settlement` reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementBehavior {
    /// Mined, receipt carries the purchase event
    Confirm,
    /// Mined, receipt has no decodable event
    ConfirmWithoutEvent,
    /// Mined with status 0
    Revert,
    /// The wait itself errors
    WaitError,
    /// The node lost the transaction
    Drop,
    /// Never resolves
    Hang,
}

#[derive(Debug)]
struct Ledger {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: U256,
    tokens: HashMap<Address, U256>,
    native: HashMap<Address, U256>,
    block: u64,
    pending: Vec<(TxHash, Address, U256)>,
}

/// In-memory chain implementing both reader and writer ports
#[derive(Debug)]
pub struct MockChain {
    sender: Address,
    profit_bps: u32,
    ledger: Mutex<Ledger>,
    failing_reads: Mutex<HashSet<ReadKind>>,
    fail_reads_after_purchase: AtomicBool,
    submission_error: Mutex<Option<ChainError>>,
    settlement: Mutex<SettlementBehavior>,
    read_calls: Mutex<HashMap<ReadKind, usize>>,
    purchases: Mutex<Vec<(Address, U256)>>,
    wait_calls: AtomicUsize,
    hold_settlement: AtomicBool,
    settlement_release: Notify,
    hold_reads: AtomicBool,
    reads_release: Notify,
}

impl MockChain {
    /// A 9StarGold-like token with `sender` holding `native_balance` wei
    pub fn new(sender: Address, native_balance: U256) -> Self {
        let mut native = HashMap::new();
        native.insert(sender, native_balance);

        Self {
            sender,
            profit_bps: DEFAULT_PROFIT_BPS,
            ledger: Mutex::new(Ledger {
                name: "9StarGold".to_string(),
                symbol: "9SG".to_string(),
                decimals: 18,
                total_supply: U256::ZERO,
                tokens: HashMap::new(),
                native,
                block: 100,
                pending: Vec::new(),
            }),
            failing_reads: Mutex::new(HashSet::new()),
            fail_reads_after_purchase: AtomicBool::new(false),
            submission_error: Mutex::new(None),
            settlement: Mutex::new(SettlementBehavior::Confirm),
            read_calls: Mutex::new(HashMap::new()),
            purchases: Mutex::new(Vec::new()),
            wait_calls: AtomicUsize::new(0),
            hold_settlement: AtomicBool::new(false),
            settlement_release: Notify::new(),
            hold_reads: AtomicBool::new(false),
            reads_release: Notify::new(),
        }
    }

    /// Builder: how settlement waits resolve
    pub fn with_settlement(self, behavior: SettlementBehavior) -> Self {
        *self.settlement.lock().unwrap() = behavior;
        self
    }

    /// Builder: seed a token balance
    pub fn with_token_balance(self, owner: Address, amount: U256) -> Self {
        {
            let mut ledger = self.ledger.lock().unwrap();
            ledger.tokens.insert(owner, amount);
            ledger.total_supply += amount;
        }
        self
    }

    /// Builder: the next `buy_gold` fails with `err`
    pub fn with_submission_error(self, err: ChainError) -> Self {
        *self.submission_error.lock().unwrap() = Some(err);
        self
    }

    pub fn sender_address(&self) -> Address {
        self.sender
    }

    pub fn fail_read(&self, kind: ReadKind) {
        self.failing_reads.lock().unwrap().insert(kind);
    }

    pub fn clear_read_failures(&self) {
        self.failing_reads.lock().unwrap().clear();
    }

    /// Every read fails once a purchase has settled
    pub fn fail_reads_after_purchase(&self) {
        self.fail_reads_after_purchase.store(true, Ordering::SeqCst);
    }

    /// Settlement waits block until [`MockChain::release_settlement`]
    pub fn hold_settlement(&self) {
        self.hold_settlement.store(true, Ordering::SeqCst);
    }

    pub fn release_settlement(&self) {
        self.hold_settlement.store(false, Ordering::SeqCst);
        self.settlement_release.notify_one();
    }

    /// `block_number` blocks until [`MockChain::release_reads`]
    pub fn hold_reads(&self) {
        self.hold_reads.store(true, Ordering::SeqCst);
    }

    pub fn release_reads(&self) {
        self.hold_reads.store(false, Ordering::SeqCst);
        self.reads_release.notify_one();
    }

    pub fn read_count(&self, kind: ReadKind) -> usize {
        self.read_calls.lock().unwrap().get(&kind).copied().unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.read_calls.lock().unwrap().values().sum()
    }

    /// Every `buy_gold` call as `(profit_recipient, value)`
    pub fn purchases(&self) -> Vec<(Address, U256)> {
        self.purchases.lock().unwrap().clone()
    }

    pub fn write_calls(&self) -> usize {
        self.purchases.lock().unwrap().len()
    }

    pub fn wait_calls(&self) -> usize {
        self.wait_calls.load(Ordering::SeqCst)
    }

    fn record(&self, kind: ReadKind) -> Result<(), ChainError> {
        *self.read_calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        if self.failing_reads.lock().unwrap().contains(&kind) {
            return Err(ChainError::Transport(format!("simulated {kind:?} failure")));
        }
        Ok(())
    }

    fn receipt(&self, tx_hash: TxHash, minted: Option<MintSplit>) -> TransactionReceipt {
        TransactionReceipt {
            tx_hash,
            block_number: self.ledger.lock().unwrap().block,
            gas_used: 54_321,
            minted,
        }
    }

    fn apply_pending(&self, tx_hash: TxHash) -> Option<MintSplit> {
        let mut ledger = self.ledger.lock().unwrap();
        let index = ledger.pending.iter().position(|(hash, _, _)| *hash == tx_hash)?;
        let (_, recipient, value) = ledger.pending.remove(index);
        let split = MintSplit::expected(value, self.profit_bps);

        *ledger.tokens.entry(self.sender).or_insert(U256::ZERO) += split.user_tokens;
        *ledger.tokens.entry(recipient).or_insert(U256::ZERO) += split.profit_tokens;
        ledger.total_supply += split.total();
        let native = ledger.native.entry(self.sender).or_insert(U256::ZERO);
        *native = native.saturating_sub(value);
        ledger.block += 1;

        if self.fail_reads_after_purchase.load(Ordering::SeqCst) {
            self.failing_reads.lock().unwrap().extend(ReadKind::ALL);
        }
        Some(split)
    }
}

#[async_trait]
impl ChainReader for MockChain {
    async fn block_number(&self) -> Result<u64, ChainError> {
        if self.hold_reads.load(Ordering::SeqCst) {
            self.reads_release.notified().await;
        }
        self.record(ReadKind::BlockNumber)?;
        Ok(self.ledger.lock().unwrap().block)
    }

    async fn token_name(&self, _at: BlockTag) -> Result<String, ChainError> {
        self.record(ReadKind::Name)?;
        Ok(self.ledger.lock().unwrap().name.clone())
    }

    async fn token_symbol(&self, _at: BlockTag) -> Result<String, ChainError> {
        self.record(ReadKind::Symbol)?;
        Ok(self.ledger.lock().unwrap().symbol.clone())
    }

    async fn token_decimals(&self, _at: BlockTag) -> Result<u8, ChainError> {
        self.record(ReadKind::Decimals)?;
        Ok(self.ledger.lock().unwrap().decimals)
    }

    async fn total_supply(&self, _at: BlockTag) -> Result<U256, ChainError> {
        self.record(ReadKind::TotalSupply)?;
        Ok(self.ledger.lock().unwrap().total_supply)
    }

    async fn token_balance(&self, owner: Address, _at: BlockTag) -> Result<U256, ChainError> {
        self.record(ReadKind::TokenBalance)?;
        Ok(self.ledger.lock().unwrap().tokens.get(&owner).copied().unwrap_or(U256::ZERO))
    }

    async fn native_balance(&self, owner: Address, _at: BlockTag) -> Result<U256, ChainError> {
        self.record(ReadKind::NativeBalance)?;
        Ok(self.ledger.lock().unwrap().native.get(&owner).copied().unwrap_or(U256::ZERO))
    }
}

#[async_trait]
impl ChainWriter for MockChain {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn buy_gold(&self, profit_recipient: Address, value: U256) -> Result<TxHash, ChainError> {
        let mut purchases = self.purchases.lock().unwrap();
        purchases.push((profit_recipient, value));

        if let Some(err) = self.submission_error.lock().unwrap().take() {
            return Err(err);
        }

        let tx_hash = TxHash::with_last_byte(purchases.len() as u8);
        self.ledger
            .lock()
            .unwrap()
            .pending
            .push((tx_hash, profit_recipient, value));
        Ok(tx_hash)
    }

    async fn wait_for_settlement(&self, tx_hash: TxHash) -> Result<Settlement, ChainError> {
        self.wait_calls.fetch_add(1, Ordering::SeqCst);
        if self.hold_settlement.load(Ordering::SeqCst) {
            self.settlement_release.notified().await;
        }

        let behavior = *self.settlement.lock().unwrap();
        match behavior {
            SettlementBehavior::Confirm => {
                let minted = self.apply_pending(tx_hash);
                Ok(Settlement::Confirmed(self.receipt(tx_hash, minted)))
            }
            SettlementBehavior::ConfirmWithoutEvent => {
                self.apply_pending(tx_hash);
                Ok(Settlement::Confirmed(self.receipt(tx_hash, None)))
            }
            SettlementBehavior::Revert => Ok(Settlement::Reverted(self.receipt(tx_hash, None))),
            SettlementBehavior::WaitError => {
                Err(ChainError::Transport("connection reset while polling receipt".into()))
            }
            SettlementBehavior::Drop => Err(ChainError::Dropped(tx_hash)),
            SettlementBehavior::Hang => std::future::pending().await,
        }
    }
}

/// Wallet provider double with a controllable session
pub struct MockWallet {
    session: watch::Sender<Session>,
    reader: Option<Arc<dyn ChainReader>>,
    writer: Option<Arc<dyn ChainWriter>>,
    signer_calls: AtomicUsize,
    reject_signer: AtomicBool,
}

impl MockWallet {
    /// Disconnected, with no read or write capability
    pub fn new() -> Self {
        let (session, _) = watch::channel(Session::disconnected());
        Self {
            session,
            reader: None,
            writer: None,
            signer_calls: AtomicUsize::new(0),
            reject_signer: AtomicBool::new(false),
        }
    }

    /// Connected as the chain's sender, reading and writing through `chain`
    pub fn with_chain(chain: Arc<MockChain>) -> Self {
        let wallet = Self::new()
            .with_reader(chain.clone())
            .with_writer(chain.clone());
        wallet.connect(chain.sender_address());
        wallet
    }

    pub fn with_reader(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.reader = Some(reader);
        self
    }

    pub fn with_writer(mut self, writer: Arc<dyn ChainWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn connect(&self, account: Address) {
        self.session.send_replace(Session::connected(account));
    }

    pub fn disconnect(&self) {
        self.session.send_replace(Session::disconnected());
    }

    /// Make the signer prompt refuse
    pub fn reject_signer(&self, reject: bool) {
        self.reject_signer.store(reject, Ordering::SeqCst);
    }

    /// Number of times a signer was requested
    pub fn signer_calls(&self) -> usize {
        self.signer_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockWallet {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WalletProvider for MockWallet {
    fn session(&self) -> Session {
        self.session.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Session> {
        self.session.subscribe()
    }

    fn reader(&self) -> Option<Arc<dyn ChainReader>> {
        self.reader.clone()
    }

    async fn signer(&self) -> Result<Arc<dyn ChainWriter>, ChainError> {
        self.signer_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject_signer.load(Ordering::SeqCst) {
            return Err(ChainError::Rejected("user denied account authorization".into()));
        }
        if self.session().active_account().is_none() {
            return Err(ChainError::Rejected("wallet not connected".into()));
        }
        self.writer
            .clone()
            .ok_or_else(|| ChainError::Rejected("no signer available".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> Address {
        Address::repeat_byte(0xaa)
    }

    #[tokio::test]
    async fn test_mock_chain_records_reads() {
        let chain = MockChain::new(sender(), U256::from(5u64));

        assert_eq!(chain.native_balance(sender(), BlockTag::Latest).await.unwrap(), U256::from(5u64));
        assert_eq!(chain.read_count(ReadKind::NativeBalance), 1);

        chain.fail_read(ReadKind::Name);
        assert!(chain.token_name(BlockTag::Latest).await.is_err());
        assert_eq!(chain.read_count(ReadKind::Name), 1);
    }

    #[tokio::test]
    async fn test_mock_chain_applies_purchase_on_confirm() {
        let chain = MockChain::new(sender(), U256::from(1_000u64));
        let recipient = Address::repeat_byte(0xbb);

        let hash = chain.buy_gold(recipient, U256::from(1_000u64)).await.unwrap();
        let settlement = chain.wait_for_settlement(hash).await.unwrap();

        match settlement {
            Settlement::Confirmed(receipt) => {
                let minted = receipt.minted.unwrap();
                assert_eq!(minted.user_tokens, U256::from(1_000u64));
                assert_eq!(minted.profit_tokens, U256::from(10u64));
            }
            other => panic!("unexpected settlement {other:?}"),
        }
        assert_eq!(
            chain.token_balance(recipient, BlockTag::Latest).await.unwrap(),
            U256::from(10u64)
        );
        assert_eq!(chain.write_calls(), 1);
    }

    #[tokio::test]
    async fn test_mock_wallet_signer_gating() {
        let chain = Arc::new(MockChain::new(sender(), U256::ZERO));
        let wallet = MockWallet::with_chain(chain);

        assert!(wallet.signer().await.is_ok());

        wallet.disconnect();
        assert!(wallet.signer().await.is_err());
        assert_eq!(wallet.signer_calls(), 2);
    }
}
