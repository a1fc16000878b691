use anyhow::{Context, Result};
use clap::{command, Parser, ValueEnum};
use lending_history::application::history::TransactionHistory;
use lending_history::domain::models::{TokenCatalog, TokenRef};
use lending_history::infrastructure::ledger_client::LedgerClient;
use lending_history::infrastructure::solana_client::SolanaLedger;
use lending_history::service;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::broadcast;

/// Default deployed lending program.
const LENDING_PROGRAM_ID: &str = "EZqPMxDtbaQbCGMaxvXS6vGKzMTJvt7p8xCPaBT6155G";

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Cluster {
    MainnetBeta,
    Devnet,
    Testnet,
}

impl Cluster {
    fn url(self) -> &'static str {
        match self {
            Cluster::MainnetBeta => "https://api.mainnet-beta.solana.com",
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about,
    long_about = "Lending transaction history service with REST API"
)]
struct HistoryProgram {
    /// Account whose lending activity is aggregated
    #[arg(short, long)]
    account: String,

    /// Cluster to query
    #[arg(short, long, value_enum, default_value_t = Cluster::Devnet)]
    cluster: Cluster,

    /// Explicit RPC endpoint, overriding the cluster default
    #[arg(short, long)]
    rpc_endpoint: Option<String>,

    /// Lending program id
    #[arg(short, long, default_value = LENDING_PROGRAM_ID)]
    program_id: String,

    /// JSON file with token metadata (array of {mint, symbol, name, logoURI, decimals})
    #[arg(short, long)]
    token_catalog: Option<PathBuf>,

    /// Number of retries for rate-limited ledger calls
    #[arg(short, long, default_value_t = 3)]
    num_retries: usize,

    /// Listen port REST API
    #[arg(short, long, default_value_t = 3000)]
    listen_port: u16,
}

fn load_catalog(path: Option<&PathBuf>) -> Result<TokenCatalog> {
    let Some(path) = path else {
        return Ok(TokenCatalog::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading token catalog {}", path.display()))?;
    let tokens: Vec<TokenRef> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing token catalog {}", path.display()))?;
    Ok(tokens.into_iter().collect())
}

/// Background enrichment: periodically refresh the summary page and drip-feed
/// detail resolution until shutdown.
async fn run_enrichment<C>(
    history: Arc<TransactionHistory<C>>,
    shutdown: broadcast::Sender<()>,
) where
    C: LedgerClient + Send + Sync + 'static,
{
    let mut shutdown_rx = shutdown.subscribe();
    let cancel = history.cancel_token();
    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                cancel.cancel();
                tracing::info!("Received shutdown signal, stopping enrichment");
                break;
            }
            _ = async {
                if let Err(e) = history.fetch_summaries().await {
                    tracing::error!("summary refresh failed: {e}");
                }
                history.resolve_pending_details().await;
                tokio::time::sleep(Duration::from_secs(60)).await;
            } => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let args = HistoryProgram::parse();
    let endpoint = args
        .rpc_endpoint
        .clone()
        .unwrap_or_else(|| args.cluster.url().to_string());
    let catalog = load_catalog(args.token_catalog.as_ref())?;

    let history = Arc::new(
        TransactionHistory::builder()
            .client(SolanaLedger::from_url(&endpoint))
            .account(args.account.clone())
            .program_id(args.program_id.clone())
            .catalog(catalog)
            .max_retries(args.num_retries)
            .build(),
    );

    let (shutdown_sender, _) = broadcast::channel(1);

    let enrichment_handle = tokio::spawn(run_enrichment(
        history.clone(),
        shutdown_sender.clone(),
    ));

    let server_handle = tokio::spawn(service::api::start_server(
        shutdown_sender.clone(),
        history.clone(),
        args.listen_port,
    ));

    tokio::select! {
        _ = signal::ctrl_c() => {
            tracing::warn!("Received Ctrl+C, shutting down...");
        }
    }

    let _ = shutdown_sender.send(());

    let _ = tokio::join!(enrichment_handle, server_handle);

    // Explicit teardown sweep; nothing runs on a background timer.
    history.cleanup();

    tracing::info!("Shutdown complete");
    Ok(())
}
