//! Iterated Prisoner's Dilemma tournament CLI
//!
//! Builds a run configuration from flags (optionally on top of a JSON config
//! file), runs the engine and prints the result to stdout. Logs go to stderr.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ipd_engine::{
    parse_payoffs, run_tournament, MediaConfig, StrategyRegistry, TournamentConfig,
    TournamentResult,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Full result as pretty JSON
    Json,
    /// Standings only, human readable
    Table,
}

#[derive(Parser, Debug)]
#[command(name = "ipd-arena")]
#[command(about = "Iterated Prisoner's Dilemma tournament", long_about = None)]
struct Args {
    /// Rounds per match if continuation is 0 [default: 150]
    #[arg(long)]
    rounds: Option<u32>,

    /// Continuation probability per round, 0 for fixed rounds [default: 0]
    #[arg(long)]
    continuation: Option<f64>,

    /// Probability that a move is flipped [default: 0]
    #[arg(long)]
    noise: Option<f64>,

    /// Independent tournament repetitions [default: 1]
    #[arg(long)]
    repeats: Option<u32>,

    /// Random seed (chosen and reported when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Payoffs as JSON, e.g. '{"T":5,"R":3,"P":1,"S":0}'
    #[arg(long)]
    payoffs: Option<String>,

    /// Comma separated strategy names to include
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Comma separated strategy names to exclude
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Media preset name (none, basic) or JSON media configuration
    #[arg(long)]
    media: Option<String>,

    /// JSON tournament configuration; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// List strategy names and exit
    #[arg(long)]
    labels: bool,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Verbose logging (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(args: &Args, registry: &StrategyRegistry) -> Result<TournamentConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            TournamentConfig::from_json(&text)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => TournamentConfig::default(),
    };

    if let Some(rounds) = args.rounds {
        config.rounds = rounds;
    }
    if let Some(continuation) = args.continuation {
        config.continuation = continuation;
    }
    if let Some(noise) = args.noise {
        config.noise = noise;
    }
    if let Some(repeats) = args.repeats {
        config.repeats = repeats;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if let Some(payoffs) = &args.payoffs {
        config.payoffs = parse_payoffs(payoffs)?;
    }
    if let Some(media) = &args.media {
        config.media = MediaConfig::resolve(media)?;
    }

    let only: Vec<String> = args
        .only
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();
    if !only.is_empty() || !args.exclude.is_empty() || config.strategies.is_empty() {
        let base = if only.is_empty() {
            config.strategies.clone()
        } else {
            only
        };
        config.strategies = registry.select(&base, &args.exclude)?;
    }

    Ok(config)
}

fn print_table(result: &TournamentResult) {
    let width = result
        .standings
        .iter()
        .map(|row| row.strategy.len())
        .max()
        .unwrap_or(8)
        .max(8);

    println!(
        "{:>4}  {:<width$}  {:>12}  {:>10}  {:>10}",
        "rank", "strategy", "total_score", "rounds", "avg/round"
    );
    for (i, row) in result.standings.iter().enumerate() {
        println!(
            "{:>4}  {:<width$}  {:>12}  {:>10}  {:>10.4}",
            i + 1,
            row.strategy,
            row.total_score,
            row.total_rounds,
            row.avg_per_round
        );
    }
    if let Some(seed) = result.seed() {
        println!("\nseed: {}", seed);
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let registry = StrategyRegistry::with_builtins();

    if args.labels {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(());
    }

    let config = build_config(&args, &registry)?;
    debug!(?config, "configuration resolved");

    let result = run_tournament(&config, &registry)?;
    info!(
        seed = result.seed().unwrap_or_default(),
        matches = result.matches.len(),
        "done"
    );

    match args.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Table => print_table(&result),
    }
    Ok(())
}
