//! Error types for the confidential onboarding workflow.

use ethers::types::{Address, H256};
use thiserror::Error;

use crate::amount::Amount;
use crate::lifecycle::Stage;

/// Result type alias for workflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while deriving, adapting, onboarding or moving funds
#[derive(Debug, Error)]
pub enum Error {
    /// Raw key bytes could not be turned into a signing wallet
    #[error("Invalid key format: {0}")]
    InvalidKeyFormat(String),

    /// Seed phrase or derivation path rejected by the wallet subsystem
    #[error("Wallet derivation failed: {0}")]
    WalletDerivation(String),

    /// Registration with the confidential-balance contract failed
    #[error("Failed to enable confidentiality for {address:?}: {source}")]
    Onboarding {
        address: Address,
        #[source]
        source: Box<Error>,
    },

    /// Provider or transport failure
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transaction was mined but reverted
    #[error("Transaction {hash:?} reverted: {reason}")]
    TransactionReverted { hash: H256, reason: String },

    /// Not enough balance to cover the requested amount
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: Amount, available: Amount },

    /// Account has not been onboarded to the confidential-balance contract
    #[error("Account {0:?} is not registered for confidential transfers")]
    NotRegistered(Address),

    /// Supplied key does not decrypt the confidential balance
    #[error("Confidential balance of {0:?} cannot be decrypted with the supplied key")]
    Decryption(Address),

    /// Token not known to the confidential-transfer client
    #[error("Unknown token: {0:?}")]
    UnknownToken(Address),

    /// Invalid amount format
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount has more fractional digits than the precision allows
    #[error("Amount has too many decimal places (max {decimals}): {amount}")]
    TooManyDecimalPlaces { amount: String, decimals: u8 },

    /// Two amounts with different fixed-point precision were combined
    #[error("Precision mismatch: expected {expected} decimals, got {actual}")]
    PrecisionMismatch { expected: u8, actual: u8 },

    /// Configuration value missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Lifecycle stage transition out of order
    #[error("Invalid lifecycle transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },
}

impl Error {
    /// Coarse error kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidKeyFormat(_) => "KeyConversionError",
            Error::WalletDerivation(_) => "WalletDerivationError",
            Error::Onboarding { .. } => "OnboardingError",
            Error::Rpc(_) => "RpcError",
            Error::TransactionReverted { .. } => "TransactionRevertedError",
            Error::InsufficientFunds { .. } => "InsufficientFundsError",
            Error::NotRegistered(_) => "NotRegisteredError",
            Error::Decryption(_) => "DecryptionError",
            Error::UnknownToken(_) => "UnknownTokenError",
            Error::InvalidAmount(_)
            | Error::TooManyDecimalPlaces { .. }
            | Error::PrecisionMismatch { .. } => "AmountError",
            Error::Config(_) => "ConfigError",
            Error::InvalidTransition { .. } => "LifecycleError",
        }
    }
}

impl From<ethers::signers::WalletError> for Error {
    fn from(e: ethers::signers::WalletError) -> Self {
        Error::WalletDerivation(e.to_string())
    }
}

impl From<ethers::providers::ProviderError> for Error {
    fn from(e: ethers::providers::ProviderError) -> Self {
        Error::Rpc(e.to_string())
    }
}
