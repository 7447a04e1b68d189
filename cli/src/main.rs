// cli/src/main.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use bitcoin::{PublicKey, ScriptBuf};
use blocktools_core::script::{classify_output, count_block_sigops, count_transaction_sigops, TxoutType};
use blocktools_core::{
    decode_height, BlockBuilder, BlockTemplate, CoinbaseBuilder, NetworkParams, Transaction,
    WitnessNonce,
};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info, Level};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Assemble and inspect test blocks", long_about = None)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,

    /// Network whose parameters are used (mainnet, testnet4, signet, regtest)
    #[clap(long, global = true, env = "BLOCKTOOLS_NETWORK", default_value = "regtest")]
    network: String,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Assembles a block from a getblocktemplate JSON file and prints a summary.
    CreateBlock(CreateBlockArgs),
    /// Decodes the BIP-34 height from a hex-encoded coinbase scriptSig.
    DecodeHeight {
        /// Hex-encoded coinbase scriptSig
        script_hex: String,
    },
    /// Counts the legacy sigops of a hex-encoded transaction.
    Sigops {
        /// Hex-encoded transaction
        tx_hex: String,
        /// Charge every multisig opcode the maximum key count
        #[clap(long)]
        legacy: bool,
    },
}

#[derive(clap::Args, Debug)]
struct CreateBlockArgs {
    /// Path to the getblocktemplate JSON
    #[clap(long)]
    template: PathBuf,

    /// Hex-encoded transaction to include after the coinbase (repeatable)
    #[clap(long = "tx")]
    txs: Vec<String>,

    /// Hex-encoded public key paid by the coinbase (P2PK); OP_TRUE otherwise
    #[clap(long)]
    pubkey: Option<String>,

    /// Hex-encoded script of an extra zero-value coinbase output
    #[clap(long)]
    extra_output_script: Option<String>,

    /// Embed a BIP-141 witness commitment in the coinbase
    #[clap(long)]
    witness_commitment: bool,

    /// 32-byte hex witness nonce used with --witness-commitment
    #[clap(long)]
    nonce: Option<String>,

    /// Block time; the template's curtime or now + offset when absent
    #[clap(long)]
    time: Option<u32>,

    /// Block version; the template's version or the network default when absent
    #[clap(long)]
    version: Option<i32>,
}

#[derive(Serialize, Debug)]
struct BlockSummary {
    hash: String,
    merkle_root: String,
    height: u32,
    transactions: usize,
    weight: u64,
    sigops: u32,
    legacy_sigops: u32,
    coinbase_outputs: Vec<TxoutType>,
    hex: String,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(Level::INFO.to_string())),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let params = NetworkParams::for_network(&cli.network)
        .with_context(|| format!("Unsupported network {}", cli.network))?;
    debug!(network = params.name, "loaded network parameters");

    match cli.command {
        Commands::CreateBlock(args) => {
            let summary = create_block_command(&args, &params)?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::DecodeHeight { script_hex } => {
            println!("{}", decode_height_command(&script_hex)?);
        }
        Commands::Sigops { tx_hex, legacy } => {
            println!("{}", sigops_command(&tx_hex, !legacy)?);
        }
    }

    Ok(())
}

fn load_template(path: &Path) -> Result<BlockTemplate> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    BlockTemplate::from_json(&json)
        .with_context(|| format!("Failed to parse template {}", path.display()))
}

fn parse_nonce(nonce_hex: &str) -> Result<WitnessNonce> {
    let bytes = hex::decode(nonce_hex).context("Nonce is not valid hex")?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("Nonce must be 32 bytes, got {}", b.len()))?;
    Ok(WitnessNonce(bytes))
}

fn create_block_command(args: &CreateBlockArgs, params: &NetworkParams) -> Result<BlockSummary> {
    let template = load_template(&args.template)?;

    let mut coinbase = CoinbaseBuilder::new(template.height);
    if let Some(pubkey_hex) = &args.pubkey {
        let pubkey = pubkey_hex
            .parse::<PublicKey>()
            .with_context(|| format!("Invalid public key {pubkey_hex}"))?;
        coinbase = coinbase.pubkey(pubkey);
    }
    if let Some(script_hex) = &args.extra_output_script {
        let script = hex::decode(script_hex).context("Extra output script is not valid hex")?;
        coinbase = coinbase.extra_output_script(ScriptBuf::from_bytes(script));
    }

    let mut builder = BlockBuilder::new(params)
        .coinbase(coinbase.build(params).context("Failed to build coinbase")?)
        .template(template)
        .transactions(args.txs.iter().map(String::as_str));
    if let Some(time) = args.time {
        builder = builder.time(time);
    }
    if let Some(version) = args.version {
        builder = builder.version(version);
    }
    let mut block = builder.build().context("Failed to assemble block")?;

    if args.witness_commitment {
        let nonce = match &args.nonce {
            Some(nonce_hex) => parse_nonce(nonce_hex)?,
            None => WitnessNonce::default(),
        };
        block
            .add_witness_commitment(nonce)
            .context("Failed to add witness commitment")?;
    }

    let coinbase_outputs = block
        .coinbase()
        .map(|coinbase| {
            coinbase
                .outputs
                .iter()
                .map(|output| classify_output(&output.script_pubkey))
                .collect()
        })
        .unwrap_or_default();

    let summary = BlockSummary {
        hash: block.block_hash().to_string(),
        merkle_root: block.header.merkle_root.to_string(),
        height: block.height,
        transactions: block.transactions.len(),
        weight: block.weight(),
        sigops: count_block_sigops(&block, true),
        legacy_sigops: count_block_sigops(&block, false),
        coinbase_outputs,
        hex: block.to_hex(),
    };
    info!(
        hash = %summary.hash,
        height = summary.height,
        weight = summary.weight,
        "created block"
    );
    Ok(summary)
}

fn decode_height_command(script_hex: &str) -> Result<u32> {
    let script = hex::decode(script_hex).context("Script is not valid hex")?;
    Ok(decode_height(&ScriptBuf::from_bytes(script))?)
}

fn sigops_command(tx_hex: &str, accurate: bool) -> Result<u32> {
    let tx = Transaction::from_hex(tx_hex).context("Failed to parse transaction")?;
    Ok(count_transaction_sigops(&tx, accurate))
}
