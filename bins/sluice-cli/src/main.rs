//! sluice: command-line front end for the Sluice ledger.
//!
//! Generates keys, signs batch files, and commits a batch of transactions
//! against a UTXO pool snapshot with either the greedy or the max-fee
//! policy.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde_json::json;
use tracing::info;

use sluice_core::config::SelectorConfig;
use sluice_core::constants::COIN;
use sluice_core::crypto::{KeyPair, PublicKey, sign_transaction_input};
use sluice_core::handler::GreedyCommitter;
use sluice_core::selector::MaxFeeSelector;
use sluice_core::snapshot;
use sluice_core::types::{Hash256, OutPoint, Transaction, TxOutput};
use sluice_core::utxo_pool::UtxoPool;

/// Sluice command-line interface.
#[derive(Parser)]
#[command(name = "sluice")]
#[command(version, about = "Batch validation and fee-maximizing commit over a UTXO set")]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a fresh Ed25519 key pair.
    Keygen,
    /// Run the built-in double-spend and conflict scenarios under both policies.
    Demo,
    /// Sign every input of every transaction in a batch file.
    Sign(SignArgs),
    /// Commit a batch against a pool snapshot.
    Commit(CommitArgs),
}

#[derive(Args)]
struct SignArgs {
    /// Batch file (JSON array of transactions).
    #[arg(short, long)]
    batch: PathBuf,

    /// Hex-encoded 32-byte secret key.
    #[arg(short, long)]
    secret: String,

    /// Where to write the signed batch (default: overwrite the input).
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct CommitArgs {
    /// Pool snapshot (JSON array of {outpoint, output} records).
    #[arg(short, long)]
    pool: PathBuf,

    /// Batch file (JSON array of transactions).
    #[arg(short, long)]
    batch: PathBuf,

    /// Commit policy.
    #[arg(long, value_enum, default_value_t = Policy::MaxFee)]
    policy: Policy,

    /// Search node budget for the max-fee policy; 0 searches exhaustively.
    #[arg(long)]
    max_nodes: Option<u64>,

    /// Write the resulting pool snapshot here.
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Policy {
    Greedy,
    MaxFee,
}

impl CommitArgs {
    fn selector_config(&self) -> SelectorConfig {
        match self.max_nodes {
            Some(0) => SelectorConfig::unbounded(),
            Some(n) => SelectorConfig::default().with_max_search_nodes(Some(n)),
            None => SelectorConfig::default(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, &cli.log_format);

    match cli.command {
        Commands::Keygen => keygen(),
        Commands::Demo => demo(),
        Commands::Sign(args) => sign_batch(args),
        Commands::Commit(args) => commit(args),
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
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_level(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn keygen() -> Result<()> {
    let kp = KeyPair::generate();
    let out = json!({
        "secret": hex::encode(kp.secret_bytes()),
        "public": kp.public_key().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn sign_batch(args: SignArgs) -> Result<()> {
    let kp = parse_secret(&args.secret)?;
    let mut batch = snapshot::load_batch(&args.batch)
        .with_context(|| format!("Failed to load batch: {}", args.batch.display()))?;

    for (n, tx) in batch.iter_mut().enumerate() {
        for i in 0..tx.num_inputs() {
            sign_transaction_input(tx, i, &kp)
                .with_context(|| format!("Failed to sign input {i} of transaction {n}"))?;
        }
        tx.finalize();
    }

    let out = args.out.as_deref().unwrap_or(&args.batch);
    snapshot::save_batch(out, &batch)
        .with_context(|| format!("Failed to write batch: {}", out.display()))?;
    info!(transactions = batch.len(), path = %out.display(), "batch signed");
    println!("Signed {} transaction(s) -> {}", batch.len(), out.display());
    Ok(())
}

fn commit(args: CommitArgs) -> Result<()> {
    let mut pool = snapshot::load_pool(&args.pool)
        .with_context(|| format!("Failed to load pool: {}", args.pool.display()))?;
    let batch = snapshot::load_batch(&args.batch)
        .with_context(|| format!("Failed to load batch: {}", args.batch.display()))?;

    let report = run_policy(args.policy, args.selector_config(), &mut pool, &batch);

    if let Some(out) = &args.out {
        snapshot::save_pool(out, &pool)
            .with_context(|| format!("Failed to write pool: {}", out.display()))?;
    }

    let accepted: Vec<String> = report
        .accepted
        .iter()
        .filter_map(Transaction::hash)
        .map(|h| h.to_string())
        .collect();
    let out = json!({
        "policy": policy_name(args.policy),
        "accepted": accepted,
        "total_fee": report.total_fee,
        "nodes_visited": report.nodes_visited,
        "exhausted": report.exhausted,
        "pool": snapshot::pool_records(&pool),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

/// Policy-independent view of a commit result.
struct Report {
    accepted: Vec<Transaction>,
    total_fee: i64,
    nodes_visited: Option<u64>,
    exhausted: bool,
}

fn run_policy(
    policy: Policy,
    config: SelectorConfig,
    pool: &mut UtxoPool,
    batch: &[Transaction],
) -> Report {
    match policy {
        Policy::Greedy => {
            let outcome = GreedyCommitter::new().commit(pool, batch);
            Report {
                accepted: outcome.accepted,
                total_fee: outcome.total_fee,
                nodes_visited: None,
                exhausted: false,
            }
        }
        Policy::MaxFee => {
            let selection = MaxFeeSelector::with_config(config).commit(pool, batch);
            Report {
                accepted: selection.accepted,
                total_fee: selection.total_fee,
                nodes_visited: Some(selection.nodes_visited),
                exhausted: selection.exhausted,
            }
        }
    }
}

fn demo() -> Result<()> {
    let alice = KeyPair::generate();
    let bob = KeyPair::generate().public_key();
    let seed_txid = Hash256::digest(b"sluice demo seed");

    println!("=== Double spend ===");
    let seed = OutPoint::new(seed_txid, 0);
    let base: UtxoPool = [(seed, TxOutput::new(10 * COIN, alice.public_key()))]
        .into_iter()
        .collect();
    let tx1 = signed(&alice, &[seed], &[(7 * COIN, bob.clone())])?;
    let tx2 = signed(&alice, &[seed], &[(9 * COIN, bob.clone())])?;
    println!("tx1 {} pays 7.0, fee 3.0", short(&tx1));
    println!("tx2 {} pays 9.0, fee 1.0", short(&tx2));
    run_both(&base, &[tx2, tx1]);

    println!();
    println!("=== One wide spend vs two narrow ones ===");
    let a = OutPoint::new(seed_txid, 1);
    let b = OutPoint::new(seed_txid, 2);
    let base: UtxoPool = [
        (a, TxOutput::new(10 * COIN, alice.public_key())),
        (b, TxOutput::new(10 * COIN, alice.public_key())),
    ]
    .into_iter()
    .collect();
    let wide = signed(&alice, &[a, b], &[(15 * COIN, bob.clone())])?;
    let left = signed(&alice, &[a], &[(7 * COIN, bob.clone())])?;
    let right = signed(&alice, &[b], &[(7 * COIN, bob)])?;
    println!("wide  {} spends both, fee 5.0", short(&wide));
    println!("left  {} fee 3.0", short(&left));
    println!("right {} fee 3.0", short(&right));
    run_both(&base, &[wide, left, right]);
    Ok(())
}

fn run_both(base: &UtxoPool, batch: &[Transaction]) {
    for policy in [Policy::Greedy, Policy::MaxFee] {
        let mut pool = base.clone();
        let report = run_policy(policy, SelectorConfig::default(), &mut pool, batch);
        let ids: Vec<String> = report.accepted.iter().map(short).collect();
        println!(
            "  {:<8} accepted [{}] total fee {}",
            policy_name(policy),
            ids.join(", "),
            format_coins(report.total_fee)
        );
    }
}

fn signed(kp: &KeyPair, from: &[OutPoint], outputs: &[(i64, PublicKey)]) -> Result<Transaction> {
    let mut tx = Transaction::new();
    for op in from {
        tx.add_input(op.txid, op.index);
    }
    for (value, owner) in outputs {
        tx.add_output(*value, owner.clone());
    }
    for i in 0..from.len() {
        sign_transaction_input(&mut tx, i, kp)?;
    }
    tx.finalize();
    Ok(tx)
}

fn parse_secret(input: &str) -> Result<KeyPair> {
    let bytes = hex::decode(input.trim()).context("Invalid hex secret")?;
    let Ok(secret) = <[u8; 32]>::try_from(bytes.as_slice()) else {
        bail!("Secret must be exactly 32 bytes (64 hex characters)");
    };
    Ok(KeyPair::from_secret_bytes(secret))
}

fn policy_name(policy: Policy) -> &'static str {
    match policy {
        Policy::Greedy => "greedy",
        Policy::MaxFee => "max-fee",
    }
}

/// First 8 hex chars of a transaction's hash.
fn short(tx: &Transaction) -> String {
    tx.hash()
        .map(|h| h.to_string()[..8].to_string())
        .unwrap_or_else(|| "unfinalized".to_string())
}

/// Format base units as whole coins with eight decimals.
fn format_coins(units: i64) -> String {
    let sign = if units < 0 { "-" } else { "" };
    let abs = units.unsigned_abs();
    let coin = COIN.unsigned_abs();
    format!("{sign}{}.{:08}", abs / coin, abs % coin)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_coins_pads_fraction() {
        assert_eq!(format_coins(3 * COIN), "3.00000000");
        assert_eq!(format_coins(COIN / 2), "0.50000000");
        assert_eq!(format_coins(-COIN - 1), "-1.00000001");
    }

    #[test]
    fn parse_secret_round_trips_keygen_output() {
        let kp = KeyPair::generate();
        let parsed = parse_secret(&hex::encode(kp.secret_bytes())).unwrap();
        assert_eq!(parsed.public_key(), kp.public_key());
        assert!(parse_secret("abcd").is_err());
        assert!(parse_secret("zz").is_err());
    }

    #[test]
    fn max_nodes_zero_means_unbounded() {
        let args = CommitArgs {
            pool: PathBuf::from("p.json"),
            batch: PathBuf::from("b.json"),
            policy: Policy::MaxFee,
            max_nodes: Some(0),
            out: None,
        };
        assert_eq!(args.selector_config(), SelectorConfig::unbounded());
    }

    #[test]
    fn sign_then_commit_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let kp = KeyPair::from_secret_bytes([9; 32]);
        let seed = OutPoint::new(Hash256([0xA0; 32]), 0);
        let pool: UtxoPool = [(seed, TxOutput::new(10 * COIN, kp.public_key()))]
            .into_iter()
            .collect();

        let mut unsigned = Transaction::new();
        unsigned.add_input(seed.txid, seed.index);
        unsigned.add_output(7 * COIN, kp.public_key());
        unsigned.finalize();

        let pool_path = dir.path().join("pool.json");
        let batch_path = dir.path().join("batch.json");
        let out_path = dir.path().join("after.json");
        snapshot::save_pool(&pool_path, &pool).unwrap();
        snapshot::save_batch(&batch_path, &[unsigned]).unwrap();

        sign_batch(SignArgs {
            batch: batch_path.clone(),
            secret: hex::encode([9u8; 32]),
            out: None,
        })
        .unwrap();

        commit(CommitArgs {
            pool: pool_path,
            batch: batch_path,
            policy: Policy::Greedy,
            max_nodes: None,
            out: Some(out_path.clone()),
        })
        .unwrap();

        let after = snapshot::load_pool(&out_path).unwrap();
        assert!(!after.contains(&seed));
        assert_eq!(after.len(), 1);
        assert_eq!(after.total_value(), Some(7 * COIN));
    }
}
