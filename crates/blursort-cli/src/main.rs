use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use blursort_core::{CancellationToken, RunMode, SortOptions};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "blursort", version, about = "Watch a drop folder and sort photos by capture hour and focus")]
struct Cli {
    /// Watched drop directory
    source: Option<PathBuf>,

    /// Root of the sorted output tree
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON options file; command-line flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Laplacian variance below which an image is blurry
    #[arg(long)]
    threshold: Option<f64>,

    /// Threshold multiplier for bouquet-like images
    #[arg(long)]
    bouquet_factor: Option<f64>,

    /// Flower-colour pixel ratio above which an image is bouquet-like
    #[arg(long)]
    bouquet_ratio: Option<f64>,

    /// Wait this long after a file appears before processing it
    #[arg(long)]
    grace_ms: Option<u64>,

    /// Idle poll interval of the watch loop
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Do not process files already in the source directory
    #[arg(long)]
    no_backfill: bool,

    /// Process files already in the source directory, then exit
    #[arg(long)]
    once: bool,

    /// Classification threads for the startup scan (default: one per core)
    #[arg(long)]
    jobs: Option<usize>,

    /// Also append log output to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> anyhow::Result<SortOptions> {
        let mut options = match &self.config {
            Some(path) => SortOptions::load(path)?,
            None => {
                let (Some(source), Some(output)) = (&self.source, &self.output) else {
                    anyhow::bail!("SOURCE and --output are required without --config");
                };
                SortOptions::new(source.clone(), output.clone())
            }
        };

        if let Some(source) = &self.source {
            options.source = source.clone();
        }
        if let Some(output) = &self.output {
            options.destination = output.clone();
        }
        if let Some(v) = self.threshold {
            options.thresholds.laplacian = v;
        }
        if let Some(v) = self.bouquet_factor {
            options.thresholds.bouquet_factor = v;
        }
        if let Some(v) = self.bouquet_ratio {
            options.thresholds.bouquet_ratio = v;
        }
        if let Some(v) = self.grace_ms {
            options.grace_period_ms = v;
        }
        if let Some(v) = self.poll_ms {
            options.poll_interval_ms = v;
        }
        if let Some(v) = self.jobs {
            options.jobs = v;
        }
        if self.no_backfill {
            options.backfill = false;
        }
        Ok(options)
    }
}

fn init_logging(verbose: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.log_file.as_deref())?;
    let options = cli.options()?;
    let t_total = std::time::Instant::now();

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        info!("Interrupt received, finishing the current file");
        handler_token.cancel();
    })?;

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{bar:40}] {pos}/{len} {prefix} {msg}")?,
    );

    let mode = if cli.once { RunMode::Once } else { RunMode::Watch };
    let summary = blursort_core::run(&options, mode, &cancel, &|stage, current, total, message| {
        pb.set_length(total);
        pb.set_position(current + 1);
        pb.set_prefix(stage.to_string());
        pb.set_message(message.to_string());
        if stage == "move" && current + 1 >= total {
            pb.finish_and_clear();
        }
    })?;
    pb.finish_and_clear();

    info!(
        "Done! {} files seen, {} moved, {} skipped, {} failed ({:.2}s)",
        summary.discovered,
        summary.moved,
        summary.skipped,
        summary.failed,
        t_total.elapsed().as_secs_f64()
    );

    Ok(())
}
