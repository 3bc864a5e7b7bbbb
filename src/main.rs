use anyhow::Context;
use clap::Parser;
use donor_tally::{
    open_source, run_sequential_with, ConfigLoader, FinalAggregate, FirstNamePolicy, Pipeline,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, trace};

/// Tally months, distinct donors and the most common first name in a contribution file
#[derive(Parser)]
#[command(name = "donor-tally", version)]
struct Cli {
    /// Pipe-delimited record file
    file: PathBuf,

    /// Use the sequential baseline instead of the concurrent pipeline
    #[arg(long)]
    sequential: bool,

    /// Number of parallel workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Records per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Batches buffered between the reader and the workers
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Emit an empty first name when a name has no ", " separator
    #[arg(long)]
    strict_first_names: bool,

    /// Path to a TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Enable verbose output (-v for debug, -vv for trace, -vvv for all)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_target(cli.verbose >= 2)
        .with_thread_ids(cli.verbose >= 3)
        .with_line_number(cli.verbose >= 3)
        .with_writer(std::io::stderr)
        .init();

    debug!("donor-tally started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    match run(cli).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                error!("Failed to render result: {}", e);
                std::process::exit(1);
            }
        },
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<FinalAggregate> {
    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let mut config = loader.load().await.context("loading configuration")?;

    if let Some(workers) = cli.workers {
        config.worker_count = workers;
    }
    if let Some(batch_size) = cli.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(capacity) = cli.queue_capacity {
        config.queue_capacity = Some(capacity);
    }
    if cli.strict_first_names {
        config.first_name_policy = FirstNamePolicy::EmptyWhenMissing;
    }

    let source = open_source(&cli.file).await?;
    let started = Instant::now();

    let result = if cli.sequential {
        run_sequential_with(source, config.first_name_policy).await?
    } else {
        let pipeline = Pipeline::new(config)?;
        let cancellation = pipeline.cancellation();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancellation.cancel();
            }
        });
        pipeline.run(source).await?
    };

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        strategy = if cli.sequential { "sequential" } else { "concurrent" },
        "Finished {}",
        cli.file.display()
    );

    Ok(result)
}
