//! Deposit → transfer → withdraw walkthrough.
//!
//! Run state machine:
//!
//! ```text
//! Init → WalletsDerived → SenderOnboarded → ReceiverOnboarded
//!      → Deposited → Transferred → Withdrawn → Complete
//! ```
//!
//! Any step failure moves the run to `Failed`. Nothing is retried and
//! confirmed transactions are not rolled back.

use std::fmt;

use ethers::{providers::Middleware, types::Address};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapter::{adapt_wallet, AdaptedWallet};
use crate::amount::Amount;
use crate::client::{ConfidentialAccountKeys, ConfidentialClient, TokenMetadata, TxResult};
use crate::onboarding::enable_confidentiality;
use crate::report::Reporter;
use crate::wallet::WalletManager;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Init,
    WalletsDerived,
    SenderOnboarded,
    ReceiverOnboarded,
    Deposited,
    Transferred,
    Withdrawn,
    Complete,
    Failed,
}

impl Stage {
    /// The only stage reachable on success, if any.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Init => Some(Stage::WalletsDerived),
            Stage::WalletsDerived => Some(Stage::SenderOnboarded),
            Stage::SenderOnboarded => Some(Stage::ReceiverOnboarded),
            Stage::ReceiverOnboarded => Some(Stage::Deposited),
            Stage::Deposited => Some(Stage::Transferred),
            Stage::Transferred => Some(Stage::Withdrawn),
            Stage::Withdrawn => Some(Stage::Complete),
            Stage::Complete | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Init => "init",
            Stage::WalletsDerived => "wallets-derived",
            Stage::SenderOnboarded => "sender-onboarded",
            Stage::ReceiverOnboarded => "receiver-onboarded",
            Stage::Deposited => "deposited",
            Stage::Transferred => "transferred",
            Stage::Withdrawn => "withdrawn",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Why a run stopped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Last stage reached before the failing step
    pub at: Stage,
    pub kind: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunState {
    stage: Stage,
    failure: Option<Failure>,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            stage: Stage::Init,
            failure: None,
        }
    }
}

impl RunState {
    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.failure.as_ref()
    }

    /// Move to `to`, which must be the successor of the current stage.
    pub fn advance(&mut self, to: Stage) -> Result<()> {
        if self.stage.next() != Some(to) {
            return Err(Error::InvalidTransition {
                from: self.stage,
                to,
            });
        }
        self.stage = to;
        Ok(())
    }

    /// Record `error` and enter `Failed`.
    pub fn fail(&mut self, error: &Error) -> Result<()> {
        if self.stage.is_terminal() {
            return Err(Error::InvalidTransition {
                from: self.stage,
                to: Stage::Failed,
            });
        }
        self.failure = Some(Failure {
            at: self.stage,
            kind: error.kind(),
            reason: error.to_string(),
        });
        self.stage = Stage::Failed;
        Ok(())
    }
}

/// Token and decimal-string amounts for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePlan {
    pub token: Address,
    pub deposit: String,
    pub transfer: String,
    pub withdraw: String,
}

/// Wallet selection and chain binding for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleOptions {
    pub chain_id: u64,
    pub sender_index: u32,
    pub receiver_index: u32,
    /// Query native gas balances from the provider
    pub read_native_balances: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositReport {
    pub amount: Amount,
    pub confidential_before: Amount,
    pub confidential_after: Amount,
    pub public_before: Amount,
    pub public_after: Amount,
    pub tx: TxResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub amount: Amount,
    pub sender_confidential_after: Amount,
    pub receiver_confidential_before: Amount,
    pub receiver_confidential_after: Amount,
    pub tx: TxResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawReport {
    pub amount: Amount,
    pub public_before: Amount,
    pub public_after: Amount,
    pub confidential_before: Amount,
    pub confidential_after: Amount,
    pub tx: TxResult,
}

/// Every balance read and transaction of a completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LifecycleReport {
    pub sender: Address,
    pub receiver: Address,
    pub token: TokenMetadata,
    pub deposit: DepositReport,
    pub transfer: TransferReport,
    pub withdraw: WithdrawReport,
}

/// Drives one run against a confidential-transfer client.
pub struct Lifecycle<'a, C, M, R> {
    client: &'a C,
    provider: M,
    reporter: R,
    options: LifecycleOptions,
    state: RunState,
}

impl<'a, C, M, R> Lifecycle<'a, C, M, R>
where
    C: ConfidentialClient,
    M: Middleware + Clone + 'static,
    R: Reporter,
{
    pub fn new(client: &'a C, provider: M, reporter: R, options: LifecycleOptions) -> Self {
        Self {
            client,
            provider,
            reporter,
            options,
            state: RunState::default(),
        }
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    pub fn into_reporter(self) -> R {
        self.reporter
    }

    /// Execute the whole walkthrough once.
    pub async fn run(&mut self, manager: &WalletManager, plan: &LifecyclePlan) -> Result<LifecycleReport> {
        match self.execute(manager, plan).await {
            Ok(report) => Ok(report),
            Err(err) => {
                warn!("Run stopped at stage {}: {}", self.state.stage(), err);
                if let Err(transition) = self.state.fail(&err) {
                    warn!("Could not record failure: {}", transition);
                }
                Err(err)
            }
        }
    }

    async fn execute(&mut self, manager: &WalletManager, plan: &LifecyclePlan) -> Result<LifecycleReport> {
        if self.state.stage() != Stage::Init {
            return Err(Error::InvalidTransition {
                from: self.state.stage(),
                to: Stage::WalletsDerived,
            });
        }

        self.reporter.section("Account Details");
        let sender_wallet = manager.account(self.options.sender_index)?;
        let receiver_wallet = manager.account(self.options.receiver_index)?;

        for (label, wallet) in [("Sender", &sender_wallet), ("Receiver", &receiver_wallet)] {
            if self.options.read_native_balances {
                let balance = wallet.native_balance(&self.provider).await?;
                self.reporter.line(&format!(
                    "{}: {:?} | Balance: {} ETH",
                    label,
                    wallet.address(),
                    balance
                ));
            } else {
                self.reporter
                    .line(&format!("{}: {:?}", label, wallet.address()));
            }
        }

        let sender = adapt_wallet(&sender_wallet, &self.provider, self.options.chain_id)?;
        let receiver = adapt_wallet(&receiver_wallet, &self.provider, self.options.chain_id)?;
        self.state.advance(Stage::WalletsDerived)?;

        self.reporter.section("Initializing Confidential Layer");
        let token = self.client.token_metadata(plan.token).await?;
        let deposit = Amount::parse(&plan.deposit, token.confidential_decimals)?;
        let transfer = Amount::parse(&plan.transfer, token.confidential_decimals)?;
        let withdraw = Amount::parse(&plan.withdraw, token.confidential_decimals)?;

        let sender_keys = enable_confidentiality(&sender, self.client).await?;
        self.state.advance(Stage::SenderOnboarded)?;
        let receiver_keys = enable_confidentiality(&receiver, self.client).await?;
        self.state.advance(Stage::ReceiverOnboarded)?;
        self.reporter.line("✓ Confidential accounts enabled");

        let deposit = self.deposit(&sender, &sender_keys, &token, deposit).await?;
        self.state.advance(Stage::Deposited)?;

        let transfer = self
            .transfer(&sender, &sender_keys, &receiver, &receiver_keys, &token, transfer)
            .await?;
        self.state.advance(Stage::Transferred)?;

        let withdraw = self.withdraw(&receiver, &receiver_keys, &token, withdraw).await?;
        self.state.advance(Stage::Withdrawn)?;

        self.state.advance(Stage::Complete)?;
        self.reporter.line("\n=== Demo Complete ===");
        info!("Lifecycle complete for token {:?}", token.address);

        Ok(LifecycleReport {
            sender: sender.address(),
            receiver: receiver.address(),
            token,
            deposit,
            transfer,
            withdraw,
        })
    }

    async fn deposit(
        &mut self,
        sender: &AdaptedWallet<M>,
        keys: &ConfidentialAccountKeys,
        token: &TokenMetadata,
        amount: Amount,
    ) -> Result<DepositReport> {
        self.reporter.section("1. CONFIDENTIAL DEPOSIT");
        self.reporter.line(&format!(
            "Depositing {} tokens into confidential balance...",
            amount
        ));

        let confidential_before = self.confidential(sender.address(), keys, token).await?;
        let public_before = self.public(sender.address(), token).await?;
        self.reporter
            .balance("Pre-Deposit Confidential Balance(Sender)", &confidential_before);
        self.reporter
            .balance("Pre-Deposit Public Balance(Sender)", &public_before);

        let tx = self
            .client
            .confidential_deposit(sender, token.address, amount)
            .await?;
        self.reporter.transaction(&tx, self.client.explorer_base());

        let confidential_after = self.confidential(sender.address(), keys, token).await?;
        let public_after = self.public(sender.address(), token).await?;
        self.reporter
            .balance("Post-Deposit Confidential Balance(Sender)", &confidential_after);
        self.reporter
            .balance("Post-Deposit Public Balance(Sender)", &public_after);

        Ok(DepositReport {
            amount,
            confidential_before,
            confidential_after,
            public_before,
            public_after,
            tx,
        })
    }

    async fn transfer(
        &mut self,
        sender: &AdaptedWallet<M>,
        sender_keys: &ConfidentialAccountKeys,
        receiver: &AdaptedWallet<M>,
        receiver_keys: &ConfidentialAccountKeys,
        token: &TokenMetadata,
        amount: Amount,
    ) -> Result<TransferReport> {
        self.reporter.section("2. CONFIDENTIAL TRANSFER");
        self.reporter.line(&format!(
            "Transferring {} tokens confidentially to recipient...",
            amount
        ));

        let receiver_confidential_before = self
            .confidential(receiver.address(), receiver_keys, token)
            .await?;

        let tx = self
            .client
            .confidential_transfer(sender, receiver.address(), token.address, amount)
            .await?;
        self.reporter.line(
            "Status: Confidential Transfer is completed. Transfer amount is hidden on-chain.",
        );
        self.reporter.transaction(&tx, self.client.explorer_base());

        let sender_confidential_after = self
            .confidential(sender.address(), sender_keys, token)
            .await?;
        let receiver_confidential_after = self
            .confidential(receiver.address(), receiver_keys, token)
            .await?;
        self.reporter.balance(
            "Post-Transfer Confidential Balance(Sender)",
            &sender_confidential_after,
        );
        self.reporter.balance(
            "Post-Transfer Confidential Balance(Recipient)",
            &receiver_confidential_after,
        );

        Ok(TransferReport {
            amount,
            sender_confidential_after,
            receiver_confidential_before,
            receiver_confidential_after,
            tx,
        })
    }

    async fn withdraw(
        &mut self,
        receiver: &AdaptedWallet<M>,
        keys: &ConfidentialAccountKeys,
        token: &TokenMetadata,
        amount: Amount,
    ) -> Result<WithdrawReport> {
        self.reporter.section("3. WITHDRAW");
        self.reporter.line(&format!(
            "Withdrawing {} tokens to public balance...",
            amount
        ));

        let public_before = self.public(receiver.address(), token).await?;
        let confidential_before = self.confidential(receiver.address(), keys, token).await?;
        self.reporter
            .balance("Pre-Withdraw Public Balance(Recipient)", &public_before);

        let tx = self.client.withdraw(receiver, token.address, amount).await?;
        self.reporter.transaction(&tx, self.client.explorer_base());

        let public_after = self.public(receiver.address(), token).await?;
        let confidential_after = self.confidential(receiver.address(), keys, token).await?;
        self.reporter
            .balance("Post-Withdraw Public Balance(Recipient)", &public_after);
        self.reporter.balance(
            "Post-Withdraw Confidential Balance(Recipient)",
            &confidential_after,
        );

        Ok(WithdrawReport {
            amount,
            public_before,
            public_after,
            confidential_before,
            confidential_after,
            tx,
        })
    }

    async fn confidential(
        &self,
        owner: Address,
        keys: &ConfidentialAccountKeys,
        token: &TokenMetadata,
    ) -> Result<Amount> {
        let snapshot = self
            .client
            .confidential_balance(owner, &keys.private_key, token.address)
            .await?;
        Ok(snapshot.amount)
    }

    async fn public(&self, owner: Address, token: &TokenMetadata) -> Result<Amount> {
        Ok(self.client.public_balance(owner, token.address).await?.amount)
    }
}
