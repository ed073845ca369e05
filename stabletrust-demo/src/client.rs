//! Confidential-transfer client seam.

use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, H256},
};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::adapter::AdaptedWallet;
use crate::amount::{Amount, MAX_DECIMALS};
use crate::{Error, Result};

/// Connection parameters of a confidential-transfer client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub rpc_url: String,
    pub contract_address: Address,
    pub chain_id: u64,
    /// Transaction page prefix for backends whose transactions land on chain
    pub explorer_url: String,
}

/// Precision metadata of a token with a confidential balance layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub address: Address,
    /// Decimals of the plain ERC-20 balance
    pub public_decimals: u8,
    /// Decimals of the encrypted balance
    pub confidential_decimals: u8,
}

impl TokenMetadata {
    /// Reject precisions an [`Amount`] cannot scale or that invert the
    /// public/confidential relationship.
    pub fn validate(&self) -> Result<()> {
        if self.public_decimals > MAX_DECIMALS {
            return Err(Error::InvalidAmount(format!(
                "public precision {} of {:?} exceeds {}",
                self.public_decimals, self.address, MAX_DECIMALS
            )));
        }
        if self.confidential_decimals > self.public_decimals {
            return Err(Error::InvalidAmount(format!(
                "confidential precision {} of {:?} exceeds public precision {}",
                self.confidential_decimals, self.address, self.public_decimals
            )));
        }
        Ok(())
    }
}

/// Decryption keypair for one account's confidential balance.
///
/// The client does not persist it; callers keep it for later balance reads.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct ConfidentialAccountKeys {
    pub private_key: [u8; 32],
    #[zeroize(skip)]
    pub public_key: [u8; 32],
}

impl std::fmt::Debug for ConfidentialAccountKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfidentialAccountKeys")
            .field("public_key", &hex::encode(self.public_key))
            .finish_non_exhaustive()
    }
}

/// A point-in-time balance read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSnapshot {
    pub amount: Amount,
}

/// Outcome of a confirmed transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResult {
    pub hash: H256,
}

impl TxResult {
    /// Block explorer link, e.g. `https://testnet.stablescan.xyz/tx/0x…`.
    pub fn explorer_url(&self, prefix: &str) -> String {
        format!("{}{:?}", prefix, self.hash)
    }
}

/// Operations the workflow needs from a confidential-transfer backend.
///
/// Every transaction method resolves only after on-chain confirmation.
#[async_trait]
pub trait ConfidentialClient: Send + Sync {
    /// Explorer prefix for this backend's transaction hashes, or `None`
    /// when the hashes do not exist on any public chain.
    fn explorer_base(&self) -> Option<&str>;

    /// Precision metadata for `token`.
    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata>;

    /// Register the wallet's public key if needed and return its keys.
    async fn ensure_account<M>(&self, wallet: &AdaptedWallet<M>) -> Result<ConfidentialAccountKeys>
    where
        M: Middleware + 'static;

    /// Decrypt the confidential balance of `owner`.
    async fn confidential_balance(
        &self,
        owner: Address,
        private_key: &[u8; 32],
        token: Address,
    ) -> Result<BalanceSnapshot>;

    /// Plain token balance of `owner`.
    async fn public_balance(&self, owner: Address, token: Address) -> Result<BalanceSnapshot>;

    /// Move `amount` of the caller's public balance into its confidential balance.
    async fn confidential_deposit<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static;

    /// Move `amount` of confidential balance to `to`.
    async fn confidential_transfer<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        to: Address,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static;

    /// Move `amount` of confidential balance back to the caller's public balance.
    async fn withdraw<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explorer_url() {
        let tx = TxResult {
            hash: H256::repeat_byte(0xab),
        };
        let url = tx.explorer_url("https://testnet.stablescan.xyz/tx/");
        assert_eq!(
            url,
            format!("https://testnet.stablescan.xyz/tx/0x{}", "ab".repeat(32))
        );
    }

    #[test]
    fn test_keys_debug_hides_private_key() {
        let keys = ConfidentialAccountKeys {
            private_key: [0x11; 32],
            public_key: [0x22; 32],
        };
        let rendered = format!("{:?}", keys);
        assert!(rendered.contains(&"22".repeat(32)));
        assert!(!rendered.contains(&"11".repeat(32)));
    }

    #[test]
    fn test_token_precision_bounds() {
        let token = |public_decimals, confidential_decimals| TokenMetadata {
            address: Address::repeat_byte(0x78),
            public_decimals,
            confidential_decimals,
        };

        assert!(token(6, 2).validate().is_ok());
        assert!(token(MAX_DECIMALS, 2).validate().is_ok());
        assert_eq!(token(78, 2).validate().unwrap_err().kind(), "AmountError");
        assert!(token(2, 6).validate().is_err());
    }
}
