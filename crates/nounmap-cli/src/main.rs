//! Nounmap CLI
//!
//! Developer tool for the mention-fusion engine:
//! - Replaying recorded claimant observations over a JSON document
//! - Printing the resulting mentions as a table or JSON
//! - Emitting the default text state configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use nounmap_core::{
    replay, report, MentionReport, MergeStrategyKind, ObservationRecord, TextSpec,
    TextStateConfig,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nounmap")]
#[command(author, version, about = "Nounmap: fuse claimant observations into concept mentions")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay observations over a document and print the resulting mentions.
    Replay {
        /// Document JSON (sentences → phrases → words)
        #[arg(long)]
        text: PathBuf,

        /// Observations JSON (list of {word, kind, claimant, probability})
        #[arg(long)]
        observations: PathBuf,

        /// Text state config JSON; defaults apply to missing keys
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured merge strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,

        /// Print mentions as JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Print the default text state config as JSON.
    DefaultConfig,
}

#[derive(Clone, Copy, ValueEnum)]
enum StrategyArg {
    Fuzzy,
    Strict,
}

impl From<StrategyArg> for MergeStrategyKind {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Fuzzy => MergeStrategyKind::Fuzzy,
            StrategyArg::Strict => MergeStrategyKind::Strict,
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Replay {
            text,
            observations,
            config,
            strategy,
            json,
        } => cmd_replay(&text, &observations, config.as_deref(), strategy, json),
        Commands::DefaultConfig => {
            let json = serde_json::to_string_pretty(&TextStateConfig::default())?;
            println!("{json}");
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn cmd_replay(
    text_path: &Path,
    observations_path: &Path,
    config_path: Option<&Path>,
    strategy: Option<StrategyArg>,
    json: bool,
) -> Result<()> {
    let document: TextSpec = read_json(text_path)?;
    let text = document
        .build()
        .with_context(|| format!("invalid document {}", text_path.display()))?;
    let observations: Vec<ObservationRecord> = read_json(observations_path)?;

    let mut config = match config_path {
        Some(path) => TextStateConfig::load_from_file(path)?,
        None => TextStateConfig::default(),
    };
    if let Some(strategy) = strategy {
        config.merge_strategy = strategy.into();
    }
    info!(
        words = text.words().len(),
        observations = observations.len(),
        strategy = %config.merge_strategy,
        "replaying"
    );

    let state = replay(Arc::new(text), config, &observations)
        .with_context(|| format!("replay of {} failed", observations_path.display()))?;
    state.validate().context("text state failed its invariant audit")?;

    let mentions = report(&state);
    if json {
        println!("{}", serde_json::to_string_pretty(&mentions)?);
    } else {
        print_table(&mentions);
        eprintln!(
            "{} {} mentions, {} phrase mappings ({} strategy)",
            "ok".green().bold(),
            mentions.len(),
            state.phrase_mappings().count(),
            state.config().merge_strategy
        );
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

fn print_table(mentions: &[MentionReport]) {
    println!(
        "{:<6} {:<28} {:<5} {:>6} {:>6} {:>6}  {:<10} {}",
        "id".bold(),
        "reference".bold(),
        "kind".bold(),
        "p".bold(),
        "NAME".bold(),
        "TYPE".bold(),
        "sentences".bold(),
        "surface forms".bold()
    );
    for mention in mentions {
        let sentences: Vec<String> = mention.sentences.iter().map(ToString::to_string).collect();
        println!(
            "{:<6} {:<28} {:<5} {:>6.3} {:>6.3} {:>6.3}  {:<10} {}",
            mention.id.cyan(),
            mention.reference,
            mention.kind.to_string().yellow(),
            mention.probability,
            mention.name_probability,
            mention.type_probability,
            sentences.join(","),
            mention.surface_forms.join(" | ")
        );
        println!("{:<6} claimants: {}", "", mention.claimants.join(", ").dimmed());
    }
}
