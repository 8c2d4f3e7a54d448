//! goldmint - purchase orchestration for the 9StarGold token
//!
//! Turns a "buy tokens with ETH" intent into an ordered sequence of chain
//! reads and writes and recovers a consistent view of token and account
//! state afterwards.
//!
//! # Modules
//!
//! - `domain`: Core types (addresses, units, snapshots, purchase requests)
//! - `ports`: Trait abstractions (ChainReader, ChainWriter, WalletProvider)
//! - `adapters`: External implementations (JSON-RPC, wallet session, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: Reader, estimator and purchase orchestrator

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
