//! rust_mda - inspect and expand acquisition sequence files

use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use rust_mda::config::{EngineConfig, DEFAULT_CONFIG_FILE};
use rust_mda::estimate::estimate_duration;
use rust_mda::logging;
use rust_mda::sequence::order::parse_compact;
use rust_mda::{AppResult, MdaEvent, MdaSequence};

#[derive(Parser)]
#[command(name = "rust_mda")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the events of a sequence file
    Events {
        /// Sequence file (.json, .yaml, .yml or .toml)
        file: PathBuf,

        /// Stop after this many events
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Axis order overriding the file's, e.g. "tpgcz"
        #[arg(short, long)]
        order: Option<String>,

        /// Print a YAML list instead of JSON lines
        #[arg(long)]
        yaml: bool,
    },

    /// Estimate how long a sequence takes
    Estimate {
        /// Sequence file
        file: PathBuf,
    },

    /// Validate a sequence file and print its axis sizes
    Check {
        /// Sequence file
        file: PathBuf,
    },

    /// Convert a sequence file between formats
    Convert {
        /// Input file
        input: PathBuf,
        /// Output file; the format follows the extension
        output: PathBuf,
    },
}

fn load(file: &PathBuf) -> Result<MdaSequence> {
    MdaSequence::from_path(file).with_context(|| format!("failed to load {}", file.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EngineConfig::load_from(&cli.config).context("invalid configuration")?;
    logging::init(&config.log);

    match cli.command {
        Commands::Events {
            file,
            limit,
            order,
            yaml,
        } => {
            let seq = load(&file)?;
            if limit.is_none() && !seq.is_finite() {
                bail!("{} has an unbounded axis; pass --limit", file.display());
            }
            let mut options = config.iter_options();
            if let Some(order) = order {
                options.axis_order = Some(parse_compact(&order));
            }
            let events = seq.iter_events_with(&options).take(limit.unwrap_or(usize::MAX));

            let stdout = io::stdout();
            let mut out = stdout.lock();
            if yaml {
                let events: Vec<MdaEvent> = events.collect::<AppResult<_>>()?;
                write!(out, "{}", serde_yaml::to_string(&events)?)?;
            } else {
                for event in events {
                    writeln!(out, "{}", serde_json::to_string(&event?)?)?;
                }
            }
        }
        Commands::Estimate { file } => {
            let seq = load(&file)?;
            let estimate = estimate_duration(&seq)?;
            println!(
                "total: {:.3} s",
                estimate.total_duration.as_secs_f64()
            );
            println!(
                "per time point: {:.3} s",
                estimate.per_t_duration.as_secs_f64()
            );
            if estimate.time_interval_exceeded {
                println!("warning: acquisition at some time points outlasts the interval");
            }
        }
        Commands::Check { file } => {
            let seq = load(&file)?;
            if seq.is_finite() {
                let sizes = seq.sizes()?;
                let shape: Vec<String> = sizes.iter().map(|(k, n)| format!("{k}={n}")).collect();
                println!("ok: {}", shape.join(" "));
            } else {
                println!("ok: unbounded ({})", seq.used_axes().join(""));
            }
        }
        Commands::Convert { input, output } => {
            let seq = load(&input)?;
            seq.write_to(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            tracing::info!(from = %input.display(), to = %output.display(), "converted sequence");
        }
    }

    Ok(())
}
