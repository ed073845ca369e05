//! Bridge from derived wallets to signing clients.
//!
//! The wallet subsystem hands out raw key bytes; the confidential-transfer
//! client wants an ethers signer bound to a provider. This is the only place
//! the two representations meet.

use std::sync::Arc;

use ethers::{
    middleware::SignerMiddleware,
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::Address,
};
use zeroize::Zeroizing;

use crate::wallet::Wallet;
use crate::{Error, Result};

/// A derived wallet re-expressed as a provider-bound signer
pub struct AdaptedWallet<M> {
    client: Arc<SignerMiddleware<M, LocalWallet>>,
}

impl<M: Middleware> AdaptedWallet<M> {
    pub fn address(&self) -> Address {
        self.client.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.client.signer().chain_id()
    }

    pub fn signer(&self) -> &LocalWallet {
        self.client.signer()
    }

    pub fn client(&self) -> Arc<SignerMiddleware<M, LocalWallet>> {
        Arc::clone(&self.client)
    }

    /// Recover the raw private key held by the signer.
    pub fn private_key_bytes(&self) -> Zeroizing<[u8; 32]> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        bytes.copy_from_slice(&self.client.signer().signer().to_bytes());
        bytes
    }
}

impl<M: Middleware> std::fmt::Debug for AdaptedWallet<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptedWallet")
            .field("address", &self.client.signer().address())
            .finish_non_exhaustive()
    }
}

/// Wrap `wallet` for use with a confidential-transfer client.
///
/// The key bytes are hex-encoded and re-parsed; the resulting signer must
/// resolve to the wallet's own address or the conversion is rejected.
pub fn adapt_wallet<M>(wallet: &Wallet, provider: &M, chain_id: u64) -> Result<AdaptedWallet<M>>
where
    M: Middleware + Clone,
{
    let key_hex = Zeroizing::new(hex::encode(wallet.key_pair().private_key()));
    let signer = key_hex
        .parse::<LocalWallet>()
        .map_err(|e| Error::InvalidKeyFormat(e.to_string()))?
        .with_chain_id(chain_id);

    if signer.address() != wallet.address() {
        return Err(Error::InvalidKeyFormat(format!(
            "key for account {} resolves to {:?}, expected {:?}",
            wallet.index(),
            signer.address(),
            wallet.address()
        )));
    }

    Ok(AdaptedWallet {
        client: Arc::new(SignerMiddleware::new(provider.clone(), signer)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::WalletManager;
    use ethers::providers::Provider;
    use pretty_assertions::assert_eq;

    const TEST_PHRASE: &str = "test test test test test test test test test test test junk";

    #[test]
    fn test_adaptation_preserves_key_material() {
        let (provider, _mock) = Provider::mocked();
        let wallet = WalletManager::new(TEST_PHRASE).unwrap().account(0).unwrap();

        let adapted = adapt_wallet(&wallet, &provider, 2201).unwrap();

        assert_eq!(*adapted.private_key_bytes(), *wallet.key_pair().private_key());
        assert_eq!(adapted.address(), wallet.address());
        assert_eq!(adapted.chain_id(), 2201);
    }

    #[test]
    fn test_each_account_adapts_to_its_own_address() {
        let (provider, _mock) = Provider::mocked();
        let manager = WalletManager::new(TEST_PHRASE).unwrap();

        for index in 0..4 {
            let wallet = manager.account(index).unwrap();
            let adapted = adapt_wallet(&wallet, &provider, 1).unwrap();
            assert_eq!(adapted.address(), wallet.address());
        }
    }

    #[test]
    fn test_zero_key_is_rejected() {
        let (provider, _mock) = Provider::mocked();
        let wallet = WalletManager::new(TEST_PHRASE)
            .unwrap()
            .account(0)
            .unwrap()
            .with_private_key([0u8; 32]);

        let err = adapt_wallet(&wallet, &provider, 2201).unwrap_err();
        assert_eq!(err.kind(), "KeyConversionError");
    }

    #[test]
    fn test_foreign_key_is_rejected() {
        let (provider, _mock) = Provider::mocked();
        let manager = WalletManager::new(TEST_PHRASE).unwrap();
        let other_key = *manager.account(1).unwrap().key_pair().private_key();
        let wallet = manager.account(0).unwrap().with_private_key(other_key);

        let err = adapt_wallet(&wallet, &provider, 2201).unwrap_err();
        assert!(matches!(err, Error::InvalidKeyFormat(_)));
    }

    #[test]
    fn test_debug_shows_address_only() {
        let (provider, _mock) = Provider::mocked();
        let wallet = WalletManager::new(TEST_PHRASE).unwrap().account(0).unwrap();
        let adapted = adapt_wallet(&wallet, &provider, 2201).unwrap();

        let rendered = format!("{:?}", adapted);
        assert!(rendered.contains("AdaptedWallet"));
        assert!(!rendered.contains(&hex::encode(wallet.key_pair().private_key())));
    }
}
