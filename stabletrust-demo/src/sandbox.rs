//! In-process confidential-transfer backend.
//!
//! `SandboxClient` keeps the ledger the stabletrust contract would keep:
//! a registry of account public keys, per-token public balances and
//! per-token confidential balances that only the registered key can read.
//! Transactions confirm immediately and get a deterministic hash.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    signers::Signer,
    types::{Address, H256, U256},
    utils::keccak256,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::adapter::AdaptedWallet;
use crate::amount::Amount;
use crate::client::{
    BalanceSnapshot, ClientConfig, ConfidentialAccountKeys, ConfidentialClient, TokenMetadata,
    TxResult,
};
use crate::{Error, Result};

/// Message an account signs to derive its confidential keys.
pub const KEY_DERIVATION_MESSAGE: &str = "stabletrust: derive confidential account key";

/// Contract operations that produce a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Register,
    Deposit,
    Transfer,
    Withdraw,
}

impl Operation {
    fn tag(self) -> u8 {
        match self {
            Operation::Register => 0,
            Operation::Deposit => 1,
            Operation::Transfer => 2,
            Operation::Withdraw => 3,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Register => write!(f, "register"),
            Operation::Deposit => write!(f, "deposit"),
            Operation::Transfer => write!(f, "transfer"),
            Operation::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// A confirmed sandbox transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub hash: H256,
    pub operation: Operation,
    pub from: Address,
}

#[derive(Default)]
struct Ledger {
    /// account -> registered confidential public key
    registry: HashMap<Address, [u8; 32]>,
    /// (account, token) -> public base units
    public: HashMap<(Address, Address), U256>,
    /// (account, token) -> confidential base units
    confidential: HashMap<(Address, Address), U256>,
    receipts: Vec<Receipt>,
    nonce: u64,
    revert_next: Option<Operation>,
}

impl Ledger {
    fn ensure_registered(&self, account: Address) -> Result<()> {
        if self.registry.contains_key(&account) {
            Ok(())
        } else {
            Err(Error::NotRegistered(account))
        }
    }

    fn next_hash(&mut self, contract: Address, operation: Operation, from: Address) -> H256 {
        let mut preimage = Vec::with_capacity(20 + 1 + 20 + 8);
        preimage.extend_from_slice(contract.as_bytes());
        preimage.push(operation.tag());
        preimage.extend_from_slice(from.as_bytes());
        preimage.extend_from_slice(&self.nonce.to_be_bytes());
        self.nonce += 1;
        H256::from(keccak256(preimage))
    }

    /// Fails with `TransactionReverted` if a revert was scheduled for `operation`.
    fn check_revert(&mut self, contract: Address, operation: Operation, from: Address) -> Result<()> {
        if self.revert_next == Some(operation) {
            self.revert_next = None;
            let hash = self.next_hash(contract, operation, from);
            return Err(Error::TransactionReverted {
                hash,
                reason: format!("{} reverted by sandbox", operation),
            });
        }
        Ok(())
    }

    fn confirm(&mut self, contract: Address, operation: Operation, from: Address) -> TxResult {
        let hash = self.next_hash(contract, operation, from);
        self.receipts.push(Receipt {
            hash,
            operation,
            from,
        });
        TxResult { hash }
    }
}

/// In-memory stand-in for the stabletrust contract and its client.
pub struct SandboxClient {
    config: ClientConfig,
    tokens: HashMap<Address, TokenMetadata>,
    ledger: Mutex<Ledger>,
}

impl SandboxClient {
    pub fn new(config: ClientConfig) -> Self {
        info!(
            "Sandbox confidential client for contract {:?} on chain {}",
            config.contract_address, config.chain_id
        );
        Self {
            config,
            tokens: HashMap::new(),
            ledger: Mutex::new(Ledger::default()),
        }
    }

    /// Make `token` available for confidential operations.
    pub fn with_token(mut self, metadata: TokenMetadata) -> Result<Self> {
        metadata.validate()?;
        self.tokens.insert(metadata.address, metadata);
        Ok(self)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credit `amount` of public balance to `owner`.
    pub async fn mint(&self, owner: Address, token: Address, amount: Amount) -> Result<()> {
        let metadata = self.metadata(token)?;
        let amount = expect_precision(amount, metadata.public_decimals)?;

        let mut ledger = self.ledger.lock().await;
        let balance = ledger.public.entry((owner, token)).or_default();
        *balance = balance
            .checked_add(amount.raw())
            .ok_or_else(|| Error::InvalidAmount("Balance overflow".to_string()))?;
        debug!("Minted {} of {:?} to {:?}", amount, token, owner);
        Ok(())
    }

    /// Make the next `operation` revert after being mined.
    pub async fn revert_next(&self, operation: Operation) {
        self.ledger.lock().await.revert_next = Some(operation);
    }

    pub async fn is_registered(&self, account: Address) -> bool {
        self.ledger.lock().await.registry.contains_key(&account)
    }

    /// Confirmed transactions, oldest first.
    pub async fn receipts(&self) -> Vec<Receipt> {
        self.ledger.lock().await.receipts.clone()
    }

    fn metadata(&self, token: Address) -> Result<TokenMetadata> {
        self.tokens
            .get(&token)
            .copied()
            .ok_or(Error::UnknownToken(token))
    }

    fn ensure_chain<M: Middleware>(&self, wallet: &AdaptedWallet<M>) -> Result<()> {
        if wallet.chain_id() != self.config.chain_id {
            return Err(Error::Rpc(format!(
                "wallet signs for chain {} but client is bound to chain {}",
                wallet.chain_id(),
                self.config.chain_id
            )));
        }
        Ok(())
    }

    async fn derive_keys<M: Middleware>(
        &self,
        wallet: &AdaptedWallet<M>,
    ) -> Result<ConfidentialAccountKeys> {
        let signature = wallet
            .signer()
            .sign_message(KEY_DERIVATION_MESSAGE)
            .await
            .map_err(|e| Error::InvalidKeyFormat(e.to_string()))?;

        let mut seed = signature.to_vec();
        seed.extend_from_slice(self.config.contract_address.as_bytes());
        let private_key = keccak256(&seed);
        let public_key = keccak256(private_key);

        Ok(ConfidentialAccountKeys {
            private_key,
            public_key,
        })
    }
}

fn expect_precision(amount: Amount, decimals: u8) -> Result<Amount> {
    if amount.decimals() != decimals {
        return Err(Error::PrecisionMismatch {
            expected: decimals,
            actual: amount.decimals(),
        });
    }
    Ok(amount)
}

fn balance_of(balances: &HashMap<(Address, Address), U256>, key: (Address, Address)) -> U256 {
    balances.get(&key).copied().unwrap_or_default()
}

// Both helpers only compute; callers write every changed balance after all
// of them succeeded.
fn debited(current: U256, amount: Amount) -> Result<U256> {
    let available = Amount::new(current, amount.decimals());
    let remaining = available
        .checked_sub(&amount)?
        .ok_or(Error::InsufficientFunds {
            required: amount,
            available,
        })?;
    Ok(remaining.raw())
}

fn credited(current: U256, amount: Amount) -> Result<U256> {
    current
        .checked_add(amount.raw())
        .ok_or_else(|| Error::InvalidAmount("Balance overflow".to_string()))
}

#[async_trait]
impl ConfidentialClient for SandboxClient {
    /// Sandbox hashes never reach a chain, so there is nothing to link to.
    fn explorer_base(&self) -> Option<&str> {
        None
    }

    async fn token_metadata(&self, token: Address) -> Result<TokenMetadata> {
        self.metadata(token)
    }

    async fn ensure_account<M>(&self, wallet: &AdaptedWallet<M>) -> Result<ConfidentialAccountKeys>
    where
        M: Middleware + 'static,
    {
        self.ensure_chain(wallet)?;
        let keys = self.derive_keys(wallet).await?;
        let account = wallet.address();

        let mut ledger = self.ledger.lock().await;
        if ledger.registry.contains_key(&account) {
            debug!("{:?} already registered", account);
            return Ok(keys);
        }

        ledger.check_revert(self.config.contract_address, Operation::Register, account)?;
        ledger.registry.insert(account, keys.public_key);
        let tx = ledger.confirm(self.config.contract_address, Operation::Register, account);
        info!("Registered {:?} in tx {:?}", account, tx.hash);
        Ok(keys)
    }

    async fn confidential_balance(
        &self,
        owner: Address,
        private_key: &[u8; 32],
        token: Address,
    ) -> Result<BalanceSnapshot> {
        let metadata = self.metadata(token)?;
        let ledger = self.ledger.lock().await;

        let registered = ledger
            .registry
            .get(&owner)
            .ok_or(Error::NotRegistered(owner))?;
        if keccak256(private_key) != *registered {
            return Err(Error::Decryption(owner));
        }

        let raw = ledger
            .confidential
            .get(&(owner, token))
            .copied()
            .unwrap_or_default();
        Ok(BalanceSnapshot {
            amount: Amount::new(raw, metadata.confidential_decimals),
        })
    }

    async fn public_balance(&self, owner: Address, token: Address) -> Result<BalanceSnapshot> {
        let metadata = self.metadata(token)?;
        let ledger = self.ledger.lock().await;
        let raw = ledger.public.get(&(owner, token)).copied().unwrap_or_default();
        Ok(BalanceSnapshot {
            amount: Amount::new(raw, metadata.public_decimals),
        })
    }

    async fn confidential_deposit<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static,
    {
        self.ensure_chain(wallet)?;
        let metadata = self.metadata(token)?;
        let amount = expect_precision(amount, metadata.confidential_decimals)?;
        let public_amount = amount.rescale(metadata.public_decimals)?;
        let account = wallet.address();

        let mut ledger = self.ledger.lock().await;
        ledger.ensure_registered(account)?;
        ledger.check_revert(self.config.contract_address, Operation::Deposit, account)?;

        let key = (account, token);
        let public_after = debited(balance_of(&ledger.public, key), public_amount)?;
        let confidential_after = credited(balance_of(&ledger.confidential, key), amount)?;
        ledger.public.insert(key, public_after);
        ledger.confidential.insert(key, confidential_after);
        Ok(ledger.confirm(self.config.contract_address, Operation::Deposit, account))
    }

    async fn confidential_transfer<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        to: Address,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static,
    {
        self.ensure_chain(wallet)?;
        let metadata = self.metadata(token)?;
        let amount = expect_precision(amount, metadata.confidential_decimals)?;
        let account = wallet.address();

        let mut ledger = self.ledger.lock().await;
        ledger.ensure_registered(account)?;
        ledger.ensure_registered(to)?;
        ledger.check_revert(self.config.contract_address, Operation::Transfer, account)?;

        let sender_after = debited(balance_of(&ledger.confidential, (account, token)), amount)?;
        let receiver_before = if to == account {
            sender_after
        } else {
            balance_of(&ledger.confidential, (to, token))
        };
        let receiver_after = credited(receiver_before, amount)?;
        ledger.confidential.insert((account, token), sender_after);
        ledger.confidential.insert((to, token), receiver_after);
        Ok(ledger.confirm(self.config.contract_address, Operation::Transfer, account))
    }

    async fn withdraw<M>(
        &self,
        wallet: &AdaptedWallet<M>,
        token: Address,
        amount: Amount,
    ) -> Result<TxResult>
    where
        M: Middleware + 'static,
    {
        self.ensure_chain(wallet)?;
        let metadata = self.metadata(token)?;
        let amount = expect_precision(amount, metadata.confidential_decimals)?;
        let public_amount = amount.rescale(metadata.public_decimals)?;
        let account = wallet.address();

        let mut ledger = self.ledger.lock().await;
        ledger.ensure_registered(account)?;
        ledger.check_revert(self.config.contract_address, Operation::Withdraw, account)?;

        let key = (account, token);
        let confidential_after = debited(balance_of(&ledger.confidential, key), amount)?;
        let public_after = credited(balance_of(&ledger.public, key), public_amount)?;
        ledger.confidential.insert(key, confidential_after);
        ledger.public.insert(key, public_after);
        Ok(ledger.confirm(self.config.contract_address, Operation::Withdraw, account))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::adapt_wallet;
    use crate::wallet::WalletManager;
    use ethers::providers::{MockProvider, Provider};
    use pretty_assertions::assert_eq;

    const TEST_PHRASE: &str = "test test test test test test test test test test test junk";
    const CHAIN_ID: u64 = 2201;

    fn token() -> Address {
        Address::repeat_byte(0x78)
    }

    fn sandbox() -> SandboxClient {
        SandboxClient::new(ClientConfig {
            rpc_url: "http://localhost:8545".to_string(),
            contract_address: Address::repeat_byte(0x29),
            chain_id: CHAIN_ID,
            explorer_url: "https://explorer.invalid/tx/".to_string(),
        })
        .with_token(TokenMetadata {
            address: token(),
            public_decimals: 6,
            confidential_decimals: 2,
        })
        .unwrap()
    }

    fn wallets() -> (AdaptedWallet<Provider<MockProvider>>, AdaptedWallet<Provider<MockProvider>>) {
        let (provider, _mock) = Provider::mocked();
        let manager = WalletManager::new(TEST_PHRASE).unwrap();
        let sender = adapt_wallet(&manager.account(0).unwrap(), &provider, CHAIN_ID).unwrap();
        let receiver = adapt_wallet(&manager.account(1).unwrap(), &provider, CHAIN_ID).unwrap();
        (sender, receiver)
    }

    fn conf(text: &str) -> Amount {
        Amount::parse(text, 2).unwrap()
    }

    #[tokio::test]
    async fn test_registration_is_idempotent() {
        let client = sandbox();
        let (sender, _) = wallets();

        let first = client.ensure_account(&sender).await.unwrap();
        let second = client.ensure_account(&sender).await.unwrap();

        assert_eq!(first, second);
        let registrations = client
            .receipts()
            .await
            .into_iter()
            .filter(|r| r.operation == Operation::Register)
            .count();
        assert_eq!(registrations, 1);
    }

    #[tokio::test]
    async fn test_deposit_moves_public_into_confidential() {
        let client = sandbox();
        let (sender, _) = wallets();
        let keys = client.ensure_account(&sender).await.unwrap();
        client
            .mint(sender.address(), token(), Amount::parse("5", 6).unwrap())
            .await
            .unwrap();

        client
            .confidential_deposit(&sender, token(), conf("1"))
            .await
            .unwrap();

        let confidential = client
            .confidential_balance(sender.address(), &keys.private_key, token())
            .await
            .unwrap();
        let public = client.public_balance(sender.address(), token()).await.unwrap();
        assert_eq!(confidential.amount.to_string(), "1.00");
        assert_eq!(public.amount.to_string(), "4.000000");
    }

    #[tokio::test]
    async fn test_deposit_without_public_funds_fails() {
        let client = sandbox();
        let (sender, _) = wallets();
        client.ensure_account(&sender).await.unwrap();

        let err = client
            .confidential_deposit(&sender, token(), conf("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));
    }

    #[tokio::test]
    async fn test_deposit_rejects_public_precision_amount() {
        let client = sandbox();
        let (sender, _) = wallets();
        client.ensure_account(&sender).await.unwrap();

        let err = client
            .confidential_deposit(&sender, token(), Amount::new(100u64, 6))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::PrecisionMismatch {
                expected: 2,
                actual: 6
            }
        ));
    }

    #[tokio::test]
    async fn test_unregistered_accounts_are_rejected() {
        let client = sandbox();
        let (sender, receiver) = wallets();

        let err = client
            .confidential_balance(sender.address(), &[0u8; 32], token())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotRegistered(_)));

        client.ensure_account(&sender).await.unwrap();
        let err = client
            .confidential_transfer(&sender, receiver.address(), token(), conf("0.5"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotRegistered(addr) if addr == receiver.address()));
    }

    #[tokio::test]
    async fn test_wrong_key_cannot_decrypt() {
        let client = sandbox();
        let (sender, receiver) = wallets();
        client.ensure_account(&sender).await.unwrap();
        let receiver_keys = client.ensure_account(&receiver).await.unwrap();

        let err = client
            .confidential_balance(sender.address(), &receiver_keys.private_key, token())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[tokio::test]
    async fn test_transfer_overdraft_fails_and_leaves_balance() {
        let client = sandbox();
        let (sender, receiver) = wallets();
        let keys = client.ensure_account(&sender).await.unwrap();
        client.ensure_account(&receiver).await.unwrap();
        client
            .mint(sender.address(), token(), Amount::parse("1", 6).unwrap())
            .await
            .unwrap();
        client
            .confidential_deposit(&sender, token(), conf("1"))
            .await
            .unwrap();

        let err = client
            .confidential_transfer(&sender, receiver.address(), token(), conf("1.01"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "InsufficientFundsError");

        let balance = client
            .confidential_balance(sender.address(), &keys.private_key, token())
            .await
            .unwrap();
        assert_eq!(balance.amount, conf("1"));
    }

    #[tokio::test]
    async fn test_scheduled_revert_only_hits_once() {
        let client = sandbox();
        let (sender, _) = wallets();
        client.revert_next(Operation::Register).await;

        let err = client.ensure_account(&sender).await.unwrap_err();
        assert!(matches!(err, Error::TransactionReverted { .. }));
        assert!(!client.is_registered(sender.address()).await);

        client.ensure_account(&sender).await.unwrap();
        assert!(client.is_registered(sender.address()).await);
    }

    #[tokio::test]
    async fn test_chain_mismatch_is_rejected() {
        let client = sandbox();
        let (provider, _mock) = Provider::mocked();
        let wallet = WalletManager::new(TEST_PHRASE).unwrap().account(0).unwrap();
        let mainnet = adapt_wallet(&wallet, &provider, 1).unwrap();

        let err = client.ensure_account(&mainnet).await.unwrap_err();
        assert_eq!(err.kind(), "RpcError");
    }

    #[tokio::test]
    async fn test_tx_hashes_are_unique() {
        let client = sandbox();
        let (sender, receiver) = wallets();
        client.ensure_account(&sender).await.unwrap();
        client.ensure_account(&receiver).await.unwrap();

        let receipts = client.receipts().await;
        assert_eq!(receipts.len(), 2);
        assert_ne!(receipts[0].hash, receipts[1].hash);
        assert_eq!(receipts[1].from, receiver.address());
    }

    #[test]
    fn test_unscalable_token_is_rejected() {
        let err = sandbox()
            .with_token(TokenMetadata {
                address: Address::repeat_byte(0x99),
                public_decimals: 78,
                confidential_decimals: 2,
            })
            .err()
            .unwrap();
        assert_eq!(err.kind(), "AmountError");
        assert!(sandbox().explorer_base().is_none());
    }

    #[tokio::test]
    async fn test_overflowing_withdraw_changes_nothing() {
        let client = sandbox();
        let (sender, _) = wallets();
        let keys = client.ensure_account(&sender).await.unwrap();
        client
            .mint(sender.address(), token(), Amount::new(U256::MAX, 6))
            .await
            .unwrap();
        client
            .confidential_deposit(&sender, token(), conf("1"))
            .await
            .unwrap();
        client
            .mint(sender.address(), token(), Amount::new(1_000_000u64, 6))
            .await
            .unwrap();

        let err = client
            .withdraw(&sender, token(), conf("1"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount(_)));

        let confidential = client
            .confidential_balance(sender.address(), &keys.private_key, token())
            .await
            .unwrap();
        let public = client.public_balance(sender.address(), token()).await.unwrap();
        assert_eq!(confidential.amount, conf("1"));
        assert_eq!(public.amount.raw(), U256::MAX);
    }

    #[tokio::test]
    async fn test_self_transfer_keeps_balance() {
        let client = sandbox();
        let (sender, _) = wallets();
        let keys = client.ensure_account(&sender).await.unwrap();
        client
            .mint(sender.address(), token(), Amount::parse("1", 6).unwrap())
            .await
            .unwrap();
        client
            .confidential_deposit(&sender, token(), conf("1"))
            .await
            .unwrap();

        client
            .confidential_transfer(&sender, sender.address(), token(), conf("0.5"))
            .await
            .unwrap();

        let balance = client
            .confidential_balance(sender.address(), &keys.private_key, token())
            .await
            .unwrap();
        assert_eq!(balance.amount, conf("1"));
    }
}
