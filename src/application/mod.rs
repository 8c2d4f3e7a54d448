//! Application Layer - purchase orchestration and state sync

pub mod chain_client;
pub mod reader;
pub mod estimator;
pub mod orchestrator;

pub use chain_client::ChainClient;
pub use reader::{ReaderError, TokenStateReader};
pub use estimator::{max_spend, MaxAmountEstimator, DEFAULT_FEE_RESERVE, MAX_AMOUNT_PLACES};
pub use orchestrator::{
    MintPreview, OrchestratorConfig, PurchaseError, PurchaseOrchestrator, PurchaseResult,
    PurchaseState, RefreshFailed, RefreshOutcome,
};
