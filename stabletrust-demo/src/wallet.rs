//! Seed-phrase wallet derivation for EVM accounts.
//!
//! Accounts follow the BIP-44 Ethereum path `m/44'/60'/0'/0/{index}`, so the
//! same phrase and index always produce the same address and key pair.

use ethers::{
    providers::Middleware,
    signers::{
        coins_bip39::{English, Mnemonic},
        LocalWallet, MnemonicBuilder, Signer,
    },
    types::Address,
};
use rand::Rng;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::amount::{Amount, NATIVE_DECIMALS};
use crate::{Error, Result};

/// Derivation path prefix; the account index is appended.
pub const DERIVATION_PATH_PREFIX: &str = "m/44'/60'/0'/0/";

/// Word count used when no seed phrase is supplied.
pub const GENERATED_PHRASE_WORDS: usize = 12;

/// Raw secp256k1 key material of a derived account
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    private_key: [u8; 32],
    /// SEC1 uncompressed public key (65 bytes)
    #[zeroize(skip)]
    public_key: Vec<u8>,
}

impl KeyPair {
    pub fn private_key(&self) -> &[u8; 32] {
        &self.private_key
    }

    pub fn public_key(&self) -> &[u8] {
        &self.public_key
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &hex::encode(&self.public_key))
            .finish_non_exhaustive()
    }
}

/// An account derived from the seed phrase
#[derive(Debug, Clone)]
pub struct Wallet {
    index: u32,
    address: Address,
    key_pair: KeyPair,
}

impl Wallet {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Native gas-token balance as reported by the RPC provider.
    pub async fn native_balance<M: Middleware>(&self, provider: &M) -> Result<Amount> {
        let balance = provider
            .get_balance(self.address, None)
            .await
            .map_err(|e| Error::Rpc(e.to_string()))?;
        Ok(Amount::new(balance, NATIVE_DECIMALS))
    }

    #[cfg(test)]
    pub(crate) fn with_private_key(mut self, private_key: [u8; 32]) -> Self {
        self.key_pair.private_key = private_key;
        self
    }
}

/// Derives EVM accounts from a BIP-39 seed phrase
pub struct WalletManager {
    phrase: Zeroizing<String>,
}

impl WalletManager {
    /// Register a seed phrase; fails if it is not a valid English BIP-39 mnemonic.
    pub fn new(seed_phrase: impl Into<String>) -> Result<Self> {
        let phrase = Zeroizing::new(seed_phrase.into().trim().to_string());
        Mnemonic::<English>::new_from_phrase(phrase.as_str())
            .map_err(|e| Error::WalletDerivation(format!("Invalid seed phrase: {}", e)))?;
        Ok(Self { phrase })
    }

    /// Create a manager around a freshly generated phrase.
    pub fn random<R: Rng>(rng: &mut R) -> Result<Self> {
        let mnemonic = Mnemonic::<English>::new_with_count(rng, GENERATED_PHRASE_WORDS)
            .map_err(|e| Error::WalletDerivation(e.to_string()))?;
        Ok(Self {
            phrase: Zeroizing::new(mnemonic.to_phrase()),
        })
    }

    pub fn seed_phrase(&self) -> &str {
        &self.phrase
    }

    /// Derive the account at `index`.
    pub fn account(&self, index: u32) -> Result<Wallet> {
        let signer: LocalWallet = MnemonicBuilder::<English>::default()
            .phrase(self.phrase.as_str())
            .index(index)?
            .build()?;

        let signing_key = signer.signer();
        let mut private_key = [0u8; 32];
        private_key.copy_from_slice(&signing_key.to_bytes());
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        debug!(
            "Derived account {}{} -> {:?}",
            DERIVATION_PATH_PREFIX,
            index,
            signer.address()
        );

        Ok(Wallet {
            index,
            address: signer.address(),
            key_pair: KeyPair {
                private_key,
                public_key,
            },
        })
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the phrase
        f.debug_struct("WalletManager").finish_non_exhaustive()
    }
}
