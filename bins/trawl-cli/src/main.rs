//! trawl: command-line front end for seedtrawl.
//!
//! Derives addresses from a phrase, inspects balances and history through
//! the configured Esplora endpoints, and runs the concurrent scanner.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use trawl_core::constants::DEFAULT_EXPLORER_TX_URL;
use trawl_core::{AddressOracle, DerivationEngine, Transaction, format_btc};
use trawl_net::{EndpointPool, EsploraClient};
use trawl_scanner::{ScanConfig, Scanner};

/// Pause between successive queries of `derive --check`.
const CHECK_PAUSE: Duration = Duration::from_secs(1);

/// Multi-scheme Bitcoin address derivation and balance scanning.
#[derive(Parser)]
#[command(name = "trawl")]
#[command(version, about = "Derive, inspect and scan BIP-39 wallets.")]
struct Cli {
    /// Configuration file (TOML, JSON or YAML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Esplora API base URL. Repeat to give several; replaces configured endpoints.
    #[arg(long = "endpoint", global = true)]
    endpoints: Vec<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log format (text or json).
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Derive addresses from a seed phrase under every wallet scheme.
    Derive(DeriveArgs),
    /// Show the balance of an address.
    Balance(AddressArgs),
    /// Show recent transactions of an address.
    History(HistoryArgs),
    /// Probe the configured endpoints and list them by latency.
    Endpoints,
    /// Scan random seed phrases for used addresses.
    Scan(ScanArgs),
}

#[derive(Args)]
struct DeriveArgs {
    /// BIP-39 phrase (quote it).
    phrase: String,

    /// Optional BIP-39 passphrase.
    #[arg(long, default_value = "")]
    passphrase: String,

    /// Addresses to derive per scheme.
    #[arg(short, long, default_value = "1")]
    count: u32,

    /// Query each derived address and report the used ones.
    #[arg(long)]
    check: bool,
}

#[derive(Args)]
struct AddressArgs {
    address: String,
}

#[derive(Args)]
struct HistoryArgs {
    address: String,

    /// Maximum number of transactions to show.
    #[arg(short, long, default_value = "5")]
    limit: usize,
}

#[derive(Args)]
struct ScanArgs {
    /// Number of concurrent workers (1 for single mode).
    #[arg(short, long)]
    instances: Option<usize>,

    /// Directory for the CSV scan log.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Skip the endpoint health probe before scanning.
    #[arg(long)]
    no_probe: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    let mut config = ScanConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if !cli.endpoints.is_empty() {
        config.endpoints = cli.endpoints.clone();
    }

    match cli.command {
        Commands::Derive(args) => derive(&config, args).await,
        Commands::Balance(args) => balance(&config, args).await,
        Commands::History(args) => history(&config, args).await,
        Commands::Endpoints => endpoints(&config).await,
        Commands::Scan(args) => scan(config, args).await,
    }
}

fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

fn build_client(config: &ScanConfig) -> Result<EsploraClient> {
    config.validate().context("invalid configuration")?;
    let pool = EndpointPool::with_settings(
        config.endpoints.iter().cloned(),
        config.probe_timeout(),
        trawl_core::constants::FAILURE_THRESHOLD,
    )
    .context("failed to build endpoint pool")?;
    EsploraClient::with_timeout(Arc::new(pool), config.request_timeout())
        .context("failed to build HTTP client")
}

async fn derive(config: &ScanConfig, args: DeriveArgs) -> Result<()> {
    let network = config.bitcoin_network().context("invalid network")?;
    let engine = DerivationEngine::new(network);
    let book = engine
        .validate_and_derive(&args.phrase, &args.passphrase, args.count)
        .context("derivation failed")?;

    for (scheme, addresses) in &book {
        println!("{}", scheme.label());
        for derived in addresses {
            println!("  {:<22} {}", derived.path.to_string(), derived.address);
        }
    }

    if !args.check {
        return Ok(());
    }

    let client = build_client(config)?;
    let mut used = Vec::new();
    let mut first = true;
    for derived in book.values().flatten() {
        if !first {
            tokio::time::sleep(CHECK_PAUSE).await;
        }
        first = false;
        match client.check_balance(&derived.address).await {
            Ok((summary, snapshot)) => {
                if snapshot.is_active() {
                    used.push((derived.clone(), summary, snapshot.tx_count));
                }
            }
            Err(e) => warn!(address = %derived.address, error = %e, "balance check failed"),
        }
    }

    println!();
    if used.is_empty() {
        println!("No used addresses found.");
    } else {
        println!("Used addresses:");
        for (derived, summary, tx_count) in used {
            println!(
                "  {} {} {} BTC, {} tx",
                derived.scheme.label(),
                derived.address,
                summary.total_btc(),
                tx_count
            );
            println!("    {}", config.explorer_url(&derived.address));
        }
    }
    Ok(())
}

async fn balance(config: &ScanConfig, args: AddressArgs) -> Result<()> {
    let client = build_client(config)?;
    let (summary, snapshot) = client
        .check_balance(&args.address)
        .await
        .with_context(|| format!("failed to fetch balance of {}", args.address))?;

    println!("Address:      {}", snapshot.address);
    println!("Confirmed:    {} BTC ({} sats)", summary.confirmed_btc(), summary.confirmed_sats);
    println!("Unconfirmed:  {} BTC ({} sats)", summary.unconfirmed_btc(), summary.unconfirmed_sats);
    println!("Total:        {} BTC ({} sats)", summary.total_btc(), summary.total_sats);
    println!("Transactions: {}", snapshot.tx_count);
    println!("Explorer:     {}", config.explorer_url(&snapshot.address));
    Ok(())
}

async fn history(config: &ScanConfig, args: HistoryArgs) -> Result<()> {
    let client = build_client(config)?;
    let txs = client
        .fetch_history(&args.address, args.limit)
        .await
        .with_context(|| format!("failed to fetch history of {}", args.address))?;

    if txs.is_empty() {
        println!("No transactions for {}", args.address);
        return Ok(());
    }
    for (i, tx) in txs.iter().enumerate() {
        print_transaction(i + 1, tx);
    }
    Ok(())
}

fn print_transaction(n: usize, tx: &Transaction) {
    println!("#{n} {}", tx.txid);
    if tx.is_confirmed() {
        let height = tx.status.block_height.map(|h| h.to_string()).unwrap_or_else(|| "?".into());
        let time = tx
            .status
            .block_time
            .and_then(|t| DateTime::from_timestamp(t, 0))
            .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "?".into());
        println!("   confirmed in block {height} at {time}");
    } else {
        println!("   pending");
    }
    println!(
        "   in {} BTC, out {} BTC, fee {} BTC",
        format_btc(tx.total_input() as i64),
        format_btc(tx.total_output() as i64),
        format_btc(tx.fee as i64)
    );
    println!("   size {} bytes, weight {} WU", tx.size, tx.weight);
    println!("   {}", DEFAULT_EXPLORER_TX_URL.replace("{txid}", &tx.txid));
}

async fn endpoints(config: &ScanConfig) -> Result<()> {
    let client = build_client(config)?;
    let results = client.pool().refresh().await;
    for r in &results {
        let mark = if r.healthy { "✓" } else { "✗" };
        println!("{mark} {:<40} {:>6} ms", r.host, r.latency.as_millis());
    }
    let healthy = results.iter().filter(|r| r.healthy).count();
    println!("{healthy}/{} endpoints healthy", results.len());
    if healthy == 0 {
        bail!("no endpoint is reachable");
    }
    Ok(())
}

async fn scan(mut config: ScanConfig, args: ScanArgs) -> Result<()> {
    if let Some(n) = args.instances {
        config.instances = n;
    }
    if let Some(dir) = args.log_dir {
        config.log_dir = dir;
    }
    if args.no_probe {
        config.refresh_on_start = false;
    }
    let instances = config.instances;
    let scanner = Scanner::from_config(config).context("invalid scan configuration")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        warn!("received SIGINT, shutting down...");
        let _ = shutdown_tx.send(true);
    });

    let handle = scanner.start(instances, shutdown_rx).await.context("failed to start scan")?;
    info!(log = %handle.log_path().display(), "discoveries are written to the scan log");
    let outcome = handle.join().await;

    println!();
    println!("Addresses checked: {}", outcome.stats.wallets_checked);
    println!("Active wallets:    {}", outcome.stats.active_wallets_found);
    println!("Elapsed:           {}s", outcome.stats.elapsed.as_secs());
    println!("Scan log:          {}", outcome.log_path.display());
    Ok(())
}
