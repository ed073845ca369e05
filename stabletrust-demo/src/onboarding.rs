//! Onboarding of wallets into the confidential-balance scheme.

use ethers::providers::Middleware;
use tracing::info;

use crate::adapter::AdaptedWallet;
use crate::client::{ConfidentialAccountKeys, ConfidentialClient};
use crate::{Error, Result};

/// Ensure `wallet` is registered with the confidential-balance contract.
///
/// Safe to call for an already registered account; the returned keys are
/// authoritative either way. Nothing is cached here and failures are not
/// retried.
pub async fn enable_confidentiality<C, M>(
    wallet: &AdaptedWallet<M>,
    client: &C,
) -> Result<ConfidentialAccountKeys>
where
    C: ConfidentialClient,
    M: Middleware + 'static,
{
    let address = wallet.address();
    info!("Enabling confidentiality for {:?}...", address);

    client
        .ensure_account(wallet)
        .await
        .map_err(|source| Error::Onboarding {
            address,
            source: Box::new(source),
        })
}
