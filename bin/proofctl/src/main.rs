//! proofctl: scan wallets, mint income proofs and verify them from the shell.
//!
//! Every command prints a JSON report to stdout. Failures print the
//! user-facing notification to stderr and exit non-zero.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use neuraproof_chain::{ChainFeed, provider};
use neuraproof_core::{
    AppError, AppResult, ConnectedWallet, IncomeProfile, Issuer, JurisdictionTable, MemoryFeed,
    Notification, ProofRegistry, QueryKind, Resolver, Session, Settings, Transaction,
    TransactionFeed, aggregate, fetch_with_policy, telemetry,
};
use neuraproof_storage::{self as storage, PgRegistry};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "proofctl", version, about = "NeuraProof income proof tool", long_about = None)]
struct Cli {
    /// Read transactions from a JSON file instead of scanning the chain
    #[arg(long, global = true)]
    from_json: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a wallet's payment history and print its income profile
    Scan {
        /// Wallet address
        wallet: String,
    },
    /// Scan a wallet and issue an income proof for it
    Mint {
        /// Wallet address
        wallet: String,

        /// Jurisdiction code of the holder (e.g. US, SG)
        #[arg(long, short)]
        jurisdiction: String,

        /// Chain id the wallet is connected to (defaults to CHAIN_ID)
        #[arg(long)]
        network: Option<u64>,
    },
    /// Look up a proof by token id, fingerprint or wallet
    Verify {
        /// One of: tokenId, hash, wallet
        kind: String,

        /// Value to look up
        value: String,
    },
    /// List every proof issued to a wallet
    History {
        /// Wallet address
        wallet: String,
    },
    /// Mark a proof invalid
    Revoke {
        /// Token id of the proof
        token_id: u64,

        /// Reason recorded in the audit trail
        #[arg(long)]
        reason: String,
    },
}

/// JSON document printed for every successful command.
#[derive(Serialize)]
struct Report<T: Serialize> {
    notification: Notification,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistorySummary<T: Serialize> {
    wallet: String,
    count: usize,
    latest_mint: Option<String>,
    proofs: Vec<T>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    telemetry::init();
    let cli = Cli::parse();
    let settings = Settings::from_env()?;

    if let Err(e) = run(cli, &settings).await {
        let notification = Notification::from_error(&e);
        eprintln!("{}: {}", notification.title(), notification.message());
        return Err(e.into());
    }
    Ok(())
}

async fn run(cli: Cli, settings: &Settings) -> AppResult<()> {
    match cli.command {
        Command::Scan { wallet } => {
            let feed = open_feed(cli.from_json.as_deref(), settings).await?;
            let profile = scan(feed.as_ref(), &wallet, settings).await?;
            print_report(Notification::scan_complete(&profile), &profile)
        }
        Command::Mint {
            wallet,
            jurisdiction,
            network,
        } => {
            let issuer = Issuer::new(open_registry(settings).await?, JurisdictionTable::standard())
                .with_network(settings.chain_id)
                .with_token_uri_base(settings.token_uri_base.clone());
            // Blocked jurisdictions fail before any RPC traffic.
            issuer.jurisdictions().check(&jurisdiction)?;

            let feed = open_feed(cli.from_json.as_deref(), settings).await?;
            let profile = scan(feed.as_ref(), &wallet, settings).await?;
            let connected = ConnectedWallet::new(wallet.trim(), network.unwrap_or(settings.chain_id));
            let session = Session {
                wallet: &connected,
                jurisdiction: &jurisdiction,
            };
            let record = issuer.issue(&profile, &session).await?;
            print_report(Notification::proof_minted(&record), &record)
        }
        Command::Verify { kind, value } => {
            let kind: QueryKind = kind.parse()?;
            let resolver = Resolver::new(open_registry(settings).await?);
            let result = resolver.verify(kind, &value).await?;
            print_report(Notification::verification(&result), &result)
        }
        Command::History { wallet } => {
            let resolver = Resolver::new(open_registry(settings).await?);
            let proofs = resolver.verify_wallet_history(&wallet).await?;
            let latest_mint = proofs
                .last()
                .and_then(|p| p.record.as_ref())
                .map(|r| r.verification_timestamp.to_rfc3339());
            let notification = Notification::Info {
                title: "Proof History".into(),
                message: format!("{} proofs issued to this wallet", proofs.len()),
            };
            let summary = HistorySummary {
                wallet,
                count: proofs.len(),
                latest_mint,
                proofs,
            };
            print_report(notification, &summary)
        }
        Command::Revoke { token_id, reason } => {
            let registry = open_registry(settings).await?;
            let record = registry.revoke(token_id, &reason).await?;
            let notification = Notification::Warning {
                title: "Proof Revoked".into(),
                message: format!("Income proof #{token_id} is no longer valid"),
            };
            print_report(notification, &record)
        }
    }
}

async fn scan(
    feed: &dyn TransactionFeed,
    wallet: &str,
    settings: &Settings,
) -> AppResult<IncomeProfile> {
    let transactions = fetch_with_policy(feed, wallet.trim(), &settings.feed_policy()).await?;
    Ok(aggregate(&transactions))
}

async fn open_feed(
    from_json: Option<&Path>,
    settings: &Settings,
) -> AppResult<Box<dyn TransactionFeed>> {
    if let Some(path) = from_json {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("{}: {e}", path.display())))?;
        let transactions = parse_transactions(&raw)?;
        tracing::info!(path = %path.display(), count = transactions.len(), "Loaded transactions from file");
        return Ok(Box::new(MemoryFeed::new(transactions)));
    }

    let provider = provider::create_provider(&settings.rpc_url)
        .map_err(|e| AppError::Config(format!("RPC_URL `{}`: {e}", settings.rpc_url)))?;
    let feed = ChainFeed::new(provider, settings)?;
    if let Err(e) = feed.check_chain(settings.chain_id).await {
        tracing::warn!(error = %e, "Could not confirm RPC chain id");
    }
    Ok(Box::new(feed))
}

async fn open_registry(settings: &Settings) -> AppResult<Arc<dyn ProofRegistry>> {
    let pool = storage::connect(&settings.database_url)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    storage::migrate(&pool)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(Arc::new(PgRegistry::new(pool)))
}

/// Parse a JSON array of transactions, applying the same checks as
/// [`Transaction::new`].
fn parse_transactions(raw: &str) -> AppResult<Vec<Transaction>> {
    let parsed: Vec<Transaction> =
        serde_json::from_str(raw).map_err(|e| AppError::Decode(e.to_string()))?;
    parsed
        .into_iter()
        .map(|tx| {
            Transaction::new(tx.id, tx.from, tx.to, tx.amount, tx.timestamp, tx.memo, tx.tx_hash)
        })
        .collect()
}

fn print_report<T: Serialize>(notification: Notification, data: &T) -> AppResult<()> {
    let report = Report { notification, data };
    let out = serde_json::to_string_pretty(&report).map_err(|e| AppError::Decode(e.to_string()))?;
    println!("{out}");
    Ok(())
}
