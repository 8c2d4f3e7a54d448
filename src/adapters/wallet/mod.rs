pub mod session;

pub use session::{RpcWallet, WalletError};
