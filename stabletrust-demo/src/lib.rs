//! # stabletrust-demo
//!
//! Walks two seed-phrase accounts through confidential balances on an
//! EVM chain:
//!
//! 1. derive sender and receiver from one BIP-39 phrase
//! 2. adapt the raw keys into provider-bound ethers signers
//! 3. onboard both accounts with the confidential-balance contract
//! 4. deposit, transfer confidentially, and withdraw, reporting the
//!    balances around every step
//!
//! The confidential-transfer backend sits behind [`ConfidentialClient`];
//! [`SandboxClient`] keeps the contract's ledger in process.

pub mod adapter;
pub mod amount;
pub mod client;
pub mod config;
mod error;
pub mod lifecycle;
pub mod onboarding;
pub mod report;
pub mod sandbox;
pub mod wallet;

pub use adapter::{adapt_wallet, AdaptedWallet};
pub use amount::Amount;
pub use client::{
    BalanceSnapshot, ClientConfig, ConfidentialAccountKeys, ConfidentialClient, TokenMetadata,
    TxResult,
};
pub use config::DemoConfig;
pub use error::{Error, Result};
pub use lifecycle::{
    Lifecycle, LifecycleOptions, LifecyclePlan, LifecycleReport, RunState, Stage,
};
pub use onboarding::enable_confidentiality;
pub use report::{CapturedReporter, ConsoleReporter, Reporter};
pub use sandbox::{Operation, Receipt, SandboxClient};
pub use wallet::{KeyPair, Wallet, WalletManager};
