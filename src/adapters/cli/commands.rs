//! CLI Command Handlers

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use crate::adapters::rpc::{JsonRpcClient, RpcConfig};
use crate::adapters::wallet::RpcWallet;
use crate::application::{
    ChainClient, OrchestratorConfig, PurchaseError, PurchaseOrchestrator, PurchaseResult,
    TokenStateReader,
};
use crate::config::{load_config, Config};
use crate::domain::{checksum, shorten_address_default, PurchaseRequest};

/// goldmint - buy 9StarGold tokens with ETH
#[derive(Parser, Debug)]
#[command(
    name = "goldmint",
    version = env!("CARGO_PKG_VERSION"),
    about = "Buy 9StarGold tokens with ETH and inspect token state",
    long_about = "goldmint sends buyGold purchases to the 9StarGold contract, waits for \
                  settlement, and reports the refreshed token and account balances."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/sepolia.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show token metadata and balances for the connected account
    Info,

    /// Show the connected account's ETH balance
    Balance,

    /// Largest amount worth offering after the fee reserve
    Max(MaxCmd),

    /// Expected mint split for an amount, without touching the chain
    Preview(PreviewCmd),

    /// Buy tokens
    Buy(BuyCmd),
}

#[derive(Parser, Debug)]
pub struct MaxCmd {
    /// ETH to keep back for fees (defaults to the configured reserve)
    #[arg(long, value_name = "ETH")]
    pub reserve: Option<Decimal>,
}

#[derive(Parser, Debug)]
pub struct PreviewCmd {
    /// ETH to spend
    #[arg(value_name = "AMOUNT")]
    pub amount: String,

    /// Profit wallet, validated when given
    #[arg(long, value_name = "ADDRESS")]
    pub profit_wallet: Option<String>,
}

#[derive(Parser, Debug)]
pub struct BuyCmd {
    /// ETH to spend
    #[arg(value_name = "AMOUNT")]
    pub amount: String,

    /// Address receiving the 1% profit mint
    #[arg(long, value_name = "ADDRESS")]
    pub profit_wallet: String,

    /// Confirm purchase without prompting
    #[arg(short = 'y', long)]
    pub yes: bool,
}

/// Execute the CLI command
pub async fn execute(app: CliApp) -> Result<()> {
    check_config_path(&app.config)?;
    let config = load_config(&app.config)
        .with_context(|| format!("Failed to load configuration from {}", app.config.display()))?;
    init_logging(app.verbose, app.debug, &config.logging.level)?;
    tracing::debug!("Config: {}", app.config.display());

    match app.command {
        Command::Info => info_command(&config).await,
        Command::Balance => balance_command(&config).await,
        Command::Max(cmd) => max_command(&config, cmd).await,
        Command::Preview(cmd) => preview_command(&config, cmd),
        Command::Buy(cmd) => buy_command(&config, cmd).await,
    }
}

/// Initialize logging system. Flags win over the configured level, and
/// `RUST_LOG` wins over both.
fn init_logging(verbose: bool, debug: bool, configured: &str) -> Result<()> {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        configured
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wire the wallet, reader and orchestrator for `config`
fn build(config: &Config) -> Result<(Arc<RpcWallet>, PurchaseOrchestrator)> {
    let client = JsonRpcClient::with_config(RpcConfig::from(config))
        .context("Failed to create RPC client")?;
    let contract = config.contract()?;
    let account = config.account()?;

    let wallet = Arc::new(
        RpcWallet::new(client, contract, config.chain.chain_id, account)
            .with_poll_interval(config.receipt_poll_interval()),
    );
    let reader = Arc::new(TokenStateReader::new(ChainClient::new(wallet.clone())));
    let orchestrator = PurchaseOrchestrator::new(reader, OrchestratorConfig::from(config));

    Ok((wallet, orchestrator))
}

async fn connect(config: &Config) -> Result<PurchaseOrchestrator> {
    let (wallet, orchestrator) = build(config)?;
    wallet
        .connect()
        .await
        .with_context(|| format!("Failed to connect wallet via {}", config.chain.get_rpc_url()))?;
    Ok(orchestrator)
}

async fn info_command(config: &Config) -> Result<()> {
    let orchestrator = connect(config).await?;
    let snapshot = orchestrator
        .refresh()
        .await
        .context("Failed to load token information")?;

    let account = checksum(&snapshot.account);
    println!("Token:        {} ({})", snapshot.name, snapshot.symbol);
    println!("Contract:     {}", config.chain.contract_address);
    println!("Decimals:     {}", snapshot.decimals);
    println!("Total supply: {} {}", snapshot.display_total_supply(), snapshot.symbol);
    println!("Account:      {}", shorten_address_default(&account));
    println!("Balance:      {} {}", snapshot.display_balance(), snapshot.symbol);
    println!("ETH balance:  {} ETH", snapshot.display_native_balance());
    println!("Block:        {}", snapshot.block_number);

    Ok(())
}

async fn balance_command(config: &Config) -> Result<()> {
    let orchestrator = connect(config).await?;
    let account = orchestrator
        .reader()
        .client()
        .session()
        .active_account()
        .context("Wallet not connected")?;
    let balance = orchestrator
        .reader()
        .native_balance(account)
        .await
        .context("Failed to read ETH balance")?;

    println!("{}: {} ETH", shorten_address_default(&checksum(&account)), balance);
    Ok(())
}

async fn max_command(config: &Config, cmd: MaxCmd) -> Result<()> {
    let orchestrator = connect(config).await?;
    let max = orchestrator
        .max_amount(cmd.reserve)
        .await
        .context("Failed to compute max amount")?;

    println!("{}", max);
    Ok(())
}

fn preview_command(config: &Config, cmd: PreviewCmd) -> Result<()> {
    let (_wallet, orchestrator) = build(config)?;
    let preview = orchestrator.preview(&cmd.amount, cmd.profit_wallet.as_deref())?;

    println!("Spend:         {} ETH", preview.native_amount);
    println!("You receive:   {} 9SG", preview.user_tokens);
    println!("Profit wallet: {} 9SG", preview.profit_tokens);
    println!("Total minted:  {} 9SG", preview.total_tokens);
    if let Some(recipient) = preview.profit_recipient {
        println!("Profit to:     {}", shorten_address_default(&checksum(&recipient)));
    }
    Ok(())
}

async fn buy_command(config: &Config, cmd: BuyCmd) -> Result<()> {
    let orchestrator = connect(config).await?;
    let preview = orchestrator.preview(&cmd.amount, Some(&cmd.profit_wallet))?;

    println!(
        "Buying with {} ETH: {} 9SG to you, {} 9SG to {}",
        preview.native_amount,
        preview.user_tokens,
        preview.profit_tokens,
        shorten_address_default(&cmd.profit_wallet)
    );

    if !cmd.yes && !confirm("Send transaction?")? {
        println!("Aborted");
        return Ok(());
    }

    let mut phases = orchestrator.subscribe_phase();
    let progress = tokio::spawn(async move {
        while phases.changed().await.is_ok() {
            let phase = *phases.borrow_and_update();
            println!("  {}", phase);
            if phase.is_terminal() {
                break;
            }
        }
    });

    let outcome = orchestrator
        .buy(PurchaseRequest::new(cmd.amount, cmd.profit_wallet))
        .await;
    progress.abort();

    match outcome {
        Ok(result) => {
            print_result(&result);
            Ok(())
        }
        Err(e @ PurchaseError::Unconfirmed { .. }) => {
            if let Some(hash) = e.tx_hash() {
                println!("Transaction {} was sent but is not confirmed yet.", hash);
                println!("Check it on a block explorer before buying again.");
            }
            Err(e.into())
        }
        Err(e @ PurchaseError::SubmissionUnknown(_)) => {
            println!("The node did not acknowledge the transaction, but it may have been sent.");
            println!("Check the account's recent transactions before buying again.");
            Err(e.into())
        }
        Err(e) => Err(anyhow::Error::new(e).context("Purchase failed")),
    }
}

fn print_result(result: &PurchaseResult) {
    println!("Purchase settled in block {}", result.block_number);
    println!("  tx:            {}", result.tx_hash);
    println!("  you received:  {} 9SG", result.user_tokens_minted);
    println!("  profit minted: {} 9SG", result.profit_tokens_minted);

    match (result.snapshot(), result.refresh_warning()) {
        (Some(snapshot), _) => {
            println!("  new balance:   {} {}", snapshot.display_balance(), snapshot.symbol);
            println!("  ETH balance:   {} ETH", snapshot.display_native_balance());
        }
        (None, Some(warning)) => {
            tracing::warn!("{}", warning);
            println!("  (balances could not be refreshed; run `goldmint info`)");
        }
        (None, None) => {}
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Reject a config path that does not exist with a hint
pub fn check_config_path(path: &Path) -> Result<()> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
    if !Path::new(&expanded).exists() {
        bail!(
            "Config file not found: {}\n\n\
             Copy config/sepolia.toml and set rpc_url and contract_address,\n\
             or pass --config <FILE>.",
            expanded
        );
    }
    Ok(())
}
