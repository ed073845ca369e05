//! Demo configuration.

use std::env;
use std::fmt;
use std::str::FromStr;

use ethers::types::Address;

use crate::client::{ClientConfig, TokenMetadata};
use crate::lifecycle::{LifecycleOptions, LifecyclePlan};
use crate::{Error, Result};

/// Stable testnet JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://rpc.testnet.stable.xyz";
/// Stable testnet chain id.
pub const DEFAULT_CHAIN_ID: u64 = 2201;
/// Transaction page prefix on the Stable testnet explorer.
pub const DEFAULT_EXPLORER_URL: &str = "https://testnet.stablescan.xyz/tx/";
/// stabletrust confidential-balance contract.
pub const STABLETRUST_CONTRACT_ADDRESS: &str = "0x29E4fd434758b1677c10854Fa81C2fc496D76E62";
/// USDT0 token on the Stable testnet.
pub const USDT0_CONTRACT_ADDRESS: &str = "0x78Cf24370174180738C5B8E352B6D14c83a6c9A9";
pub const USDT0_PUBLIC_DECIMALS: u8 = 6;
pub const USDT0_CONFIDENTIAL_DECIMALS: u8 = 2;

/// Demo configuration.
#[derive(Clone)]
pub struct DemoConfig {
    /// BIP-39 phrase; a random one is generated when absent.
    pub seed_phrase: Option<String>,
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    /// Chain id the wallets sign for.
    pub chain_id: u64,
    /// Confidential-balance contract.
    pub contract_address: Address,
    /// Token moved through the lifecycle.
    pub token_address: Address,
    pub token_public_decimals: u8,
    pub token_confidential_decimals: u8,
    /// Prefix joined with a transaction hash to build an explorer link.
    pub explorer_url: String,
    pub sender_index: u32,
    pub receiver_index: u32,
    /// Decimal strings at confidential precision.
    pub deposit_amount: String,
    pub transfer_amount: String,
    pub withdraw_amount: String,
}

impl DemoConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let seed_phrase = value("SEED_PHRASE");
        let rpc_url = value("RPC_URL").unwrap_or_else(|| DEFAULT_RPC_URL.to_string());
        let explorer_url =
            value("EXPLORER_URL").unwrap_or_else(|| DEFAULT_EXPLORER_URL.to_string());

        let chain_id = parse_or("CHAIN_ID", value("CHAIN_ID"), DEFAULT_CHAIN_ID)?;
        let contract_address = parse_or(
            "STABLETRUST_CONTRACT_ADDRESS",
            value("STABLETRUST_CONTRACT_ADDRESS"),
            parse_address(STABLETRUST_CONTRACT_ADDRESS)?,
        )?;
        let token_address = parse_or(
            "TOKEN_ADDRESS",
            value("TOKEN_ADDRESS"),
            parse_address(USDT0_CONTRACT_ADDRESS)?,
        )?;
        let token_public_decimals = parse_or(
            "TOKEN_PUBLIC_DECIMALS",
            value("TOKEN_PUBLIC_DECIMALS"),
            USDT0_PUBLIC_DECIMALS,
        )?;
        let token_confidential_decimals = parse_or(
            "TOKEN_CONFIDENTIAL_DECIMALS",
            value("TOKEN_CONFIDENTIAL_DECIMALS"),
            USDT0_CONFIDENTIAL_DECIMALS,
        )?;

        let sender_index = parse_or("SENDER_INDEX", value("SENDER_INDEX"), 0u32)?;
        let receiver_index = parse_or("RECEIVER_INDEX", value("RECEIVER_INDEX"), 1u32)?;
        if sender_index == receiver_index {
            return Err(Error::Config(format!(
                "SENDER_INDEX and RECEIVER_INDEX must differ (both {})",
                sender_index
            )));
        }
        TokenMetadata {
            address: token_address,
            public_decimals: token_public_decimals,
            confidential_decimals: token_confidential_decimals,
        }
        .validate()
        .map_err(|e| Error::Config(format!("Token precision: {}", e)))?;

        Ok(Self {
            seed_phrase,
            rpc_url,
            chain_id,
            contract_address,
            token_address,
            token_public_decimals,
            token_confidential_decimals,
            explorer_url,
            sender_index,
            receiver_index,
            deposit_amount: value("DEPOSIT_AMOUNT").unwrap_or_else(|| "1".to_string()),
            transfer_amount: value("TRANSFER_AMOUNT").unwrap_or_else(|| "0.5".to_string()),
            withdraw_amount: value("WITHDRAW_AMOUNT").unwrap_or_else(|| "0.5".to_string()),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            rpc_url: self.rpc_url.clone(),
            contract_address: self.contract_address,
            chain_id: self.chain_id,
            explorer_url: self.explorer_url.clone(),
        }
    }

    pub fn token_metadata(&self) -> TokenMetadata {
        TokenMetadata {
            address: self.token_address,
            public_decimals: self.token_public_decimals,
            confidential_decimals: self.token_confidential_decimals,
        }
    }

    pub fn plan(&self) -> LifecyclePlan {
        LifecyclePlan {
            token: self.token_address,
            deposit: self.deposit_amount.clone(),
            transfer: self.transfer_amount.clone(),
            withdraw: self.withdraw_amount.clone(),
        }
    }

    pub fn lifecycle_options(&self, read_native_balances: bool) -> LifecycleOptions {
        LifecycleOptions {
            chain_id: self.chain_id,
            sender_index: self.sender_index,
            receiver_index: self.receiver_index,
            read_native_balances,
        }
    }
}

impl fmt::Debug for DemoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DemoConfig")
            .field("seed_phrase", &self.seed_phrase.as_ref().map(|_| "<redacted>"))
            .field("rpc_url", &self.rpc_url)
            .field("chain_id", &self.chain_id)
            .field("contract_address", &self.contract_address)
            .field("token_address", &self.token_address)
            .field("token_public_decimals", &self.token_public_decimals)
            .field("token_confidential_decimals", &self.token_confidential_decimals)
            .field("explorer_url", &self.explorer_url)
            .field("sender_index", &self.sender_index)
            .field("receiver_index", &self.receiver_index)
            .field("deposit_amount", &self.deposit_amount)
            .field("transfer_amount", &self.transfer_amount)
            .field("withdraw_amount", &self.withdraw_amount)
            .finish()
    }
}

fn parse_address(text: &str) -> Result<Address> {
    text.parse::<Address>()
        .map_err(|e| Error::Config(format!("Invalid address {}: {}", text, e)))
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{} is invalid ({}): {}", key, raw, e))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_target_stable_testnet() {
        let config = DemoConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.seed_phrase, None);
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(config.chain_id, 2201);
        assert_eq!(
            config.contract_address,
            STABLETRUST_CONTRACT_ADDRESS.parse::<Address>().unwrap()
        );
        assert_eq!(config.token_metadata().public_decimals, 6);
        assert_eq!(config.token_metadata().confidential_decimals, 2);

        let plan = config.plan();
        assert_eq!(plan.deposit, "1");
        assert_eq!(plan.transfer, "0.5");
        assert_eq!(plan.withdraw, "0.5");
    }

    #[test]
    fn test_overrides() {
        let config = DemoConfig::from_lookup(lookup(&[
            ("SEED_PHRASE", "test test test test test test test test test test test junk"),
            ("CHAIN_ID", "31337"),
            ("SENDER_INDEX", "2"),
            ("RECEIVER_INDEX", "5"),
            ("DEPOSIT_AMOUNT", "3.25"),
            ("TOKEN_CONFIDENTIAL_DECIMALS", "4"),
        ]))
        .unwrap();

        assert!(config.seed_phrase.is_some());
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.client_config().chain_id, 31337);
        assert_eq!(config.deposit_amount, "3.25");
        assert_eq!(config.token_confidential_decimals, 4);

        let options = config.lifecycle_options(true);
        assert_eq!(options.sender_index, 2);
        assert_eq!(options.receiver_index, 5);
        assert!(options.read_native_balances);
    }

    #[test]
    fn test_blank_values_fall_back_to_defaults() {
        let config = DemoConfig::from_lookup(lookup(&[("SEED_PHRASE", "  "), ("RPC_URL", "")]))
            .unwrap();
        assert_eq!(config.seed_phrase, None);
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = DemoConfig::from_lookup(lookup(&[("CHAIN_ID", "stable")])).unwrap_err();
        assert!(err.to_string().contains("CHAIN_ID"));

        let err = DemoConfig::from_lookup(lookup(&[("TOKEN_ADDRESS", "0x1234")])).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");

        let err = DemoConfig::from_lookup(lookup(&[("RECEIVER_INDEX", "0")])).unwrap_err();
        assert!(err.to_string().contains("must differ"));

        let err = DemoConfig::from_lookup(lookup(&[("TOKEN_CONFIDENTIAL_DECIMALS", "8")]))
            .unwrap_err();
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn test_public_precision_limit() {
        let config = DemoConfig::from_lookup(lookup(&[("TOKEN_PUBLIC_DECIMALS", "77")])).unwrap();
        assert_eq!(config.token_metadata().public_decimals, 77);

        let err = DemoConfig::from_lookup(lookup(&[("TOKEN_PUBLIC_DECIMALS", "78")])).unwrap_err();
        assert_eq!(err.kind(), "ConfigError");
        assert!(err.to_string().contains("78"));
    }

    #[test]
    fn test_debug_hides_seed_phrase() {
        let config = DemoConfig::from_lookup(lookup(&[(
            "SEED_PHRASE",
            "test test test test test test test test test test test junk",
        )]))
        .unwrap();

        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("junk"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("rpc_url"));
    }
}
