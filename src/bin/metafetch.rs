//! metafetch CLI: operator interface to a resumable fetch job.

use clap::{Parser, Subcommand, ValueEnum};
use metafetch::{
    BatchScheduler, Config, Error, ExportSink, FileSink, ItemKey, OutcomeStatus, Result,
    RunOutcome, Selection, run_until_signal,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "metafetch", version, about = "Resumable batch metadata fetcher")]
struct Cli {
    /// JSON configuration file; defaults apply when omitted
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Override the job name from the configuration
    #[arg(long, global = true)]
    job: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add item keys to the job's work set
    Submit {
        /// Keys to add
        keys: Vec<String>,
        /// Read additional keys from a file, one per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Fetch every pending key; Ctrl+C pauses after the current batch
    Run {
        /// Items per batch and in-flight bound
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// Show committed and pending counts
    Status,
    /// List failed keys, optionally clearing them for retry
    Failures {
        /// Regex searched in failure messages
        #[arg(long)]
        pattern: Option<String>,
        /// Delete matched records so the next run retries them
        #[arg(long)]
        delete: bool,
    },
    /// List committed keys by status
    List {
        /// Status to list
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Write successful records as an export artifact
    Export {
        /// Override the configured output directory
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Delete the work set and all records of the job
    Clear,
}

#[derive(Clone, Copy, ValueEnum)]
enum StatusArg {
    Success,
    Failure,
}

impl From<StatusArg> for OutcomeStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Success => OutcomeStatus::Success,
            StatusArg::Failure => OutcomeStatus::Failure,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("metafetch=info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(job) = cli.job {
        config.persistence.job = job;
    }

    let scheduler = BatchScheduler::from_config(&config).await?;

    match cli.command {
        Command::Submit { keys, file } => cmd_submit(&scheduler, keys, file).await,
        Command::Run { concurrency } => {
            if let Some(concurrency) = concurrency {
                config.run.concurrency = concurrency;
            }
            cmd_run(&scheduler, &config).await
        }
        Command::Status => cmd_status(&scheduler).await,
        Command::Failures { pattern, delete } => {
            let keys = scheduler.filter_failures(pattern.as_deref(), delete).await?;
            print_keys(&keys);
            if delete {
                println!("cleared {} record(s)", keys.len());
            }
            Ok(())
        }
        Command::List { status } => {
            let keys = scheduler
                .select(&Selection {
                    status: status.map(Into::into),
                    ..Default::default()
                })
                .await?;
            print_keys(&keys);
            Ok(())
        }
        Command::Export { output_dir } => {
            if let Some(dir) = output_dir {
                config.export.output_dir = dir;
            }
            cmd_export(&scheduler, &config).await
        }
        Command::Clear => {
            scheduler.clear_all().await?;
            println!("cleared job '{}'", config.persistence.job);
            Ok(())
        }
    }
}

async fn cmd_submit(
    scheduler: &BatchScheduler,
    mut keys: Vec<String>,
    file: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = file {
        let raw = tokio::fs::read_to_string(&path).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read key file '{}': {}", path.display(), e),
            ))
        })?;
        keys.extend(raw.lines().map(str::to_string));
    }

    let keys: Vec<ItemKey> = keys
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .map(ItemKey::from)
        .collect();

    let added = scheduler.submit(&keys).await?;
    println!("{added} new key(s), {} submitted", keys.len());
    Ok(())
}

async fn cmd_run(scheduler: &BatchScheduler, config: &Config) -> Result<()> {
    let outcome = run_until_signal(scheduler, config.run.clone()).await?;
    let status = scheduler.status().await?;
    match outcome {
        RunOutcome::Completed => println!("completed"),
        RunOutcome::Paused => println!("paused; run again to resume"),
        RunOutcome::Cancelled => println!("cancelled"),
    }
    println!(
        "{} committed ({} ok, {} failed), {} pending",
        status.committed, status.successful, status.failed, status.pending
    );
    Ok(())
}

async fn cmd_status(scheduler: &BatchScheduler) -> Result<()> {
    let status = scheduler.status().await?;
    println!("job:        {}", scheduler.work_set().job());
    println!("total:      {}", status.total);
    println!("committed:  {}", status.committed);
    println!("successful: {}", status.successful);
    println!("failed:     {}", status.failed);
    println!("pending:    {}", status.pending);
    Ok(())
}

async fn cmd_export(scheduler: &BatchScheduler, config: &Config) -> Result<()> {
    let payload = scheduler.export(&config.export).await?;
    let sink = FileSink::new(&config.export.output_dir, &config.persistence.job);
    match sink.write(&payload).await? {
        Some(path) => println!("wrote {} entries to {}", payload.len(), path.display()),
        None => println!("no successful records to export"),
    }
    Ok(())
}

fn print_keys(keys: &[ItemKey]) {
    for key in keys {
        println!("{key}");
    }
}
