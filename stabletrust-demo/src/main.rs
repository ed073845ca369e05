//! stabletrust-demo
//!
//! Command-line entry point for the confidential deposit/transfer/withdraw
//! walkthrough.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ethers::providers::{Http, Provider};
use tracing::{error, info, warn};

use stabletrust_demo::{
    Amount, ConsoleReporter, DemoConfig, Lifecycle, SandboxClient, WalletManager,
};

const DEFAULT_FUND: &str = "10";

#[derive(Parser)]
#[command(
    name = "stabletrust-demo",
    about = "Confidential transfers with seed-phrase wallets on the Stable testnet"
)]
struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the deposit → transfer → withdraw walkthrough (default).
    Run(RunArgs),
    /// Print the addresses derived from the seed phrase.
    Accounts {
        /// Number of accounts to derive, starting at index 0.
        #[arg(long, default_value_t = 2)]
        count: u32,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Public token balance credited to the sender before the walkthrough.
    #[arg(long, env = "FUND_AMOUNT", default_value = DEFAULT_FUND)]
    fund: String,
    /// Do not query native gas balances from the RPC endpoint.
    #[arg(long)]
    skip_native_balances: bool,
    /// Print the final report as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let outcome = match cli.command {
        Some(Commands::Accounts { count }) => list_accounts(count),
        Some(Commands::Run(args)) => run(args).await,
        None => run(RunArgs {
            fund: std::env::var("FUND_AMOUNT").unwrap_or_else(|_| DEFAULT_FUND.to_string()),
            ..RunArgs::default()
        })
        .await,
    };

    if let Err(err) = outcome {
        error!("Error running demo: {}", err);
        error!("Full error: {:?}", err);
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stabletrust_demo=info".into());

    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn wallet_manager(config: &DemoConfig) -> Result<WalletManager> {
    match &config.seed_phrase {
        Some(phrase) => WalletManager::new(phrase.as_str()).context("Invalid SEED_PHRASE"),
        None => {
            warn!("SEED_PHRASE not set; generating a throwaway phrase for this run");
            WalletManager::random(&mut rand::thread_rng())
                .context("Failed to generate seed phrase")
        }
    }
}

fn list_accounts(count: u32) -> Result<()> {
    let config = DemoConfig::from_env()?;
    let manager = wallet_manager(&config)?;

    for index in 0..count {
        let wallet = manager.account(index)?;
        println!("{:>3}  {:?}", index, wallet.address());
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<()> {
    println!("Starting stabletrust confidential demo...");
    println!("Confidential backend: simulated in-process ledger; no transaction is broadcast");

    let config = DemoConfig::from_env()?;
    if args.skip_native_balances {
        info!("Native balances skipped; RPC {} is not contacted", config.rpc_url);
    } else {
        info!("Native balances from RPC {}", config.rpc_url);
    }
    info!("Simulating contract {:?}", config.contract_address);
    info!("Token: {:?}", config.token_address);

    let manager = wallet_manager(&config)?;

    let provider = Provider::<Http>::try_from(config.rpc_url.as_str())
        .context("Failed to create HTTP provider")?;

    let client = SandboxClient::new(config.client_config()).with_token(config.token_metadata())?;
    let sender = manager.account(config.sender_index)?;
    let funding = Amount::parse(&args.fund, config.token_public_decimals)?;
    client
        .mint(sender.address(), config.token_address, funding)
        .await?;
    info!("Funded sender {:?} with {} public tokens", sender.address(), funding);

    let mut lifecycle = Lifecycle::new(
        &client,
        provider,
        ConsoleReporter,
        config.lifecycle_options(!args.skip_native_balances),
    );
    let report = lifecycle.run(&manager, &config.plan()).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}
