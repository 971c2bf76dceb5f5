use anyhow::{Context, Result};
use chess_openings::{
    AggregateOutcome, ConfigArgs, IngestOutcome, PipelineConfig, run_aggregate, run_ingest,
    summarize,
};
use clap::{Parser, Subcommand};
use log::info;

#[derive(Parser)]
#[command(name = "chess-openings")]
#[command(about = "Per-opening statistics from compressed PGN archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream every archive into chunk files (clears the output directory first)
    Ingest {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Rebuild the statistics table from the current chunk files
    Aggregate {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the aggregation report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ingest, then aggregate
    Run {
        #[command(flatten)]
        config: ConfigArgs,

        /// Print the run summary and aggregation report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print headline metrics of the statistics table as JSON
    Summary {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("CHESS_LOG", "info"))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest { config, json } => {
            let config = resolve(config)?;
            ingest(&config, json)?;
        }
        Commands::Aggregate { config, json } => {
            let config = resolve(config)?;
            aggregate(&config, json)?;
        }
        Commands::Run { config, json } => {
            let config = resolve(config)?;
            if ingest(&config, json)? {
                aggregate(&config, json)?;
            }
        }
        Commands::Summary { config } => {
            let config = resolve(config)?;
            let summary = summarize(&config.stats_file)
                .with_context(|| format!("reading {}", config.stats_file.display()))?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}

fn resolve(args: ConfigArgs) -> Result<PipelineConfig> {
    let config = args.into_config().context("invalid configuration")?;
    info!(
        "Config: source={} suffix={} output={} stats={} chunk_size={} workers={} max_games={:?}",
        config.source_dir.display(),
        config.archive_suffix,
        config.output_dir.display(),
        config.stats_file.display(),
        config.chunk_size,
        config.workers,
        config.max_games
    );
    Ok(config)
}

/// Returns false when there was nothing to ingest.
fn ingest(config: &PipelineConfig, json: bool) -> Result<bool> {
    match run_ingest(config).context("ingestion failed")? {
        IngestOutcome::NoArchives => Ok(false),
        IngestOutcome::Completed(summary) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            }
            Ok(true)
        }
    }
}

fn aggregate(config: &PipelineConfig, json: bool) -> Result<()> {
    match run_aggregate(config).context("aggregation failed")? {
        AggregateOutcome::NoChunks => {}
        AggregateOutcome::Written(report) => {
            info!(
                "Statistics table ready: {} openings at {}",
                report.openings.len(),
                report.stats_file.display()
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
        }
    }
    Ok(())
}
