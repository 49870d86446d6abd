//! Genesis relay command line tools.
//!
//! `sync-genesis-header` bootstraps the destination chain's header-sync
//! contract from the source chain; `get-poly-config` and
//! `get-poly-consensus` print the destination chain's consensus state;
//! `new-wallet` creates a signer key file for `--pwallets`.

mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use relay_core::{
    BootstrapResult, BootstrapSubmitter, ConsensusInspector, GenesisSync, RelayError, WaitPolicy,
};
use relay_dest::{DestinationClient, JsonRpcDestinationClient};
use relay_source::JsonRpcSourceReader;
use relay_types::{ChainId, ConsensusConfig};
use relay_wallet::{KeyFile, SignerConfig};
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::settings::RelayConfig;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Genesis header relay tools", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (JSON or TOML), defaults to ./config.json
    #[arg(long, value_name = "PATH", global = true)]
    conf: Option<PathBuf>,

    /// Tool to run, for scripts that select it by name
    #[arg(long, value_enum)]
    tool: Option<Tool>,

    #[command(flatten)]
    signers: SignerArgs,

    /// Source chain id to bootstrap
    #[arg(long, default_value_t = 333, global = true)]
    chainid: u64,

    #[command(flatten)]
    timing: TimingArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit the source chain's genesis header to the destination chain
    SyncGenesisHeader,
    /// Print the destination chain's consensus configuration
    GetPolyConfig,
    /// Print the destination chain's governance view and peer pool
    GetPolyConsensus,
    /// Create a password sealed signer key file
    NewWallet(NewWalletArgs),
}

#[derive(Args)]
struct NewWalletArgs {
    /// Where to write the key file
    #[arg(long, value_name = "PATH")]
    path: PathBuf,

    /// Password sealing the key
    #[arg(long)]
    password: String,

    /// Optional label stored with the key
    #[arg(long)]
    label: Option<String>,

    /// Replace an existing file at the path
    #[arg(long)]
    overwrite: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Tool {
    #[value(name = "sync_genesis_header", alias = "sync-genesis-header")]
    SyncGenesisHeader,
    #[value(name = "get_poly_config", alias = "get-poly-config")]
    GetPolyConfig,
    #[value(name = "get_poly_consensus", alias = "get-poly-consensus")]
    GetPolyConsensus,
}

impl Cli {
    /// Relay tool picked by subcommand, or by `--tool` when none was given.
    fn selected_tool(&self) -> Option<Tool> {
        match &self.command {
            Some(Commands::SyncGenesisHeader) => Some(Tool::SyncGenesisHeader),
            Some(Commands::GetPolyConfig) => Some(Tool::GetPolyConfig),
            Some(Commands::GetPolyConsensus) => Some(Tool::GetPolyConsensus),
            Some(Commands::NewWallet(_)) => None,
            None => self.tool,
        }
    }
}

#[derive(Args)]
struct SignerArgs {
    /// Comma separated wallet files of the destination chain signers
    #[arg(long, default_value = "", global = true)]
    pwallets: String,

    /// Comma separated wallet passwords, one per wallet
    #[arg(long, default_value = "", global = true, hide_default_value = true)]
    ppwds: String,
}

/// Expected consensus timing, compared against the on-chain values.
#[derive(Args)]
struct TimingArgs {
    #[arg(long, default_value_t = 5000, global = true)]
    blk_msg_delay: u32,

    #[arg(long, default_value_t = 5000, global = true)]
    hash_msg_delay: u32,

    #[arg(long, default_value_t = 10, global = true)]
    peer_handshake_timeout: u32,

    #[arg(long, default_value_t = 10000, global = true)]
    max_blk_change_view: u32,
}

impl TimingArgs {
    fn expected(&self) -> ConsensusConfig {
        ConsensusConfig {
            block_msg_delay: self.blk_msg_delay,
            hash_msg_delay: self.hash_msg_delay,
            peer_handshake_timeout: self.peer_handshake_timeout,
            max_block_change_view: self.max_blk_change_view,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Some(Commands::NewWallet(args)) = &cli.command {
        return new_wallet(args);
    }
    let tool = cli
        .selected_tool()
        .context("no tool selected: pass a subcommand or --tool")?;

    let config = RelayConfig::load(cli.conf.as_deref())?;
    init_logging(&config)?;
    info!(
        ?tool,
        config = ?config.config_path,
        source = %config.source_rpc_url,
        dest = %config.dest_rpc_url,
        "starting relay tool"
    );

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling");
            let _ = cancel_tx.send(true);
        }
    });

    match tool {
        Tool::SyncGenesisHeader => sync_genesis_header(&cli, &config, cancel_rx).await,
        Tool::GetPolyConfig => get_poly_config(&cli, &config).await,
        Tool::GetPolyConsensus => get_poly_consensus(&config).await,
    }
}

fn init_logging(config: &RelayConfig) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }

    Ok(())
}

fn destination(config: &RelayConfig) -> Result<Arc<dyn DestinationClient>> {
    let client = JsonRpcDestinationClient::new(
        config.dest_rpc_url.clone(),
        config.request_timeout,
        config.confirmation,
    )
    .context("failed to build destination chain client")?;
    Ok(Arc::new(client))
}

async fn sync_genesis_header(
    cli: &Cli,
    config: &RelayConfig,
    mut cancel: watch::Receiver<bool>,
) -> Result<()> {
    let signer_config = SignerConfig::from_lists(&cli.signers.pwallets, &cli.signers.ppwds);
    let signers = relay_wallet::resolve(&signer_config)?;

    let reader = JsonRpcSourceReader::new(config.source_rpc_url.clone(), config.request_timeout)
        .context("failed to build source chain client")?;
    let submitter = BootstrapSubmitter::new(destination(config)?)
        .with_contract(config.header_sync_contract)
        .with_confirm_attempts(config.confirm_attempts);
    let flow = GenesisSync::new(
        Arc::new(reader),
        submitter,
        config.source_chain_id,
        WaitPolicy {
            interval: config.poll_interval,
            deadline: config.wait_deadline,
        },
    );

    let chain_id = ChainId(cli.chainid);
    match flow.run(chain_id, &signers, &mut cancel).await? {
        BootstrapResult::Confirmed(tx_hash) => {
            info!(%chain_id, %tx_hash, "genesis header synchronized");
        }
        BootstrapResult::AlreadyInitialized => {
            info!(%chain_id, "genesis header was already synchronized");
        }
        BootstrapResult::Failed(err) => {
            return Err(RelayError::Submission(err)).context("genesis header sync failed");
        }
    }
    Ok(())
}

async fn get_poly_config(cli: &Cli, config: &RelayConfig) -> Result<()> {
    let inspector =
        ConsensusInspector::new(destination(config)?).with_contract(config.node_manager_contract);
    let on_chain = inspector.read_config().await?;

    for (field, expected, actual) in config_differences(&cli.timing.expected(), &on_chain) {
        warn!(field, expected, actual, "on-chain consensus config differs");
    }
    println!("{}", serde_json::to_string_pretty(&on_chain)?);
    Ok(())
}

async fn get_poly_consensus(config: &RelayConfig) -> Result<()> {
    let inspector =
        ConsensusInspector::new(destination(config)?).with_contract(config.node_manager_contract);
    let (view, peers) = inspector.read_peer_pool().await?;

    println!("governance view: {} (height {})", view.view, view.height);
    println!("[ index, address, pubk, status ]");
    for peer in &peers {
        println!(
            "[ {}, {}, {}, {} ]",
            peer.index, peer.address, peer.peer_pubkey, peer.status as u8
        );
    }
    Ok(())
}

fn new_wallet(args: &NewWalletArgs) -> Result<()> {
    let (keyfile, _) =
        KeyFile::generate(&args.password, args.label.clone()).context("failed to seal new key")?;
    keyfile
        .save(&args.path, args.overwrite)
        .with_context(|| format!("failed to write {}", args.path.display()))?;
    println!("address: {}", keyfile.address);
    println!("public key: {}", keyfile.public_key);
    println!("key file: {}", args.path.display());
    Ok(())
}

fn config_differences(
    expected: &ConsensusConfig,
    actual: &ConsensusConfig,
) -> Vec<(&'static str, u32, u32)> {
    [
        ("block_msg_delay", expected.block_msg_delay, actual.block_msg_delay),
        ("hash_msg_delay", expected.hash_msg_delay, actual.hash_msg_delay),
        (
            "peer_handshake_timeout",
            expected.peer_handshake_timeout,
            actual.peer_handshake_timeout,
        ),
        (
            "max_block_change_view",
            expected.max_block_change_view,
            actual.max_block_change_view,
        ),
    ]
    .into_iter()
    .filter(|(_, expected, actual)| expected != actual)
    .collect()
}
