//! Sort photos dropped into a watched directory by capture time and focus.
//!
//! Every supported file ends up at
//! `<destination>/<YYYY-MM-DD>/<HH>/<sharp|blurry>/<filename>`.
//! Files already present are handled first ([`pipeline::process_existing`]),
//! then new arrivals as the watcher reports them ([`pipeline::watch_loop`]).

pub mod blur;
pub mod bouquet;
pub mod cancel;
pub mod date;
pub mod error;
pub mod imaging;
pub mod media;
pub mod pipeline;
pub mod placement;
pub mod watch;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use cancel::CancellationToken;
pub use error::SortError;
pub use pipeline::{process_file, FileOutcome, SortSummary};

fn default_grace_period_ms() -> u64 {
    1000
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_true() -> bool {
    true
}

/// Blur and bouquet detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Laplacian variance below which an image is blurry
    pub laplacian: f64,
    /// Multiplier applied to `laplacian` for bouquet-like images
    pub bouquet_factor: f64,
    /// Flower-colour pixel ratio above which an image is bouquet-like
    pub bouquet_ratio: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            laplacian: 100.0,
            bouquet_factor: 0.7,
            bouquet_ratio: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortOptions {
    /// Watched drop directory
    pub source: PathBuf,
    /// Root of the sorted tree
    pub destination: PathBuf,
    #[serde(default)]
    pub thresholds: Thresholds,
    /// Delay between a create notification and processing the file
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// How long the live loop blocks before re-checking for an interrupt
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Process files already in `source` before watching
    #[serde(default = "default_true")]
    pub backfill: bool,
    /// Classification threads for the backfill, 0 = one per core
    #[serde(default)]
    pub jobs: usize,
}

impl SortOptions {
    pub fn new(source: PathBuf, destination: PathBuf) -> Self {
        Self {
            source,
            destination,
            thresholds: Thresholds::default(),
            grace_period_ms: default_grace_period_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            backfill: true,
            jobs: 0,
        }
    }

    /// Load options from a JSON file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let file = File::open(path).with_context(|| format!("opening config {}", path.display()))?;
        let options = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(options)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Type alias for progress callback: (stage, current, total, message)
pub type ProgressCallback<'a> = dyn Fn(&str, u64, u64, &str) + Send + Sync + 'a;

/// Throttled progress reporter, emits at most every 200ms or on completion.
pub struct ThrottledProgress<'a> {
    inner: &'a ProgressCallback<'a>,
    last_emit: std::sync::Mutex<Instant>,
}

impl<'a> ThrottledProgress<'a> {
    pub fn new(inner: &'a ProgressCallback<'a>) -> Self {
        Self {
            inner,
            last_emit: std::sync::Mutex::new(Instant::now() - Duration::from_secs(1)),
        }
    }

    pub fn report(&self, stage: &str, current: u64, total: u64, message: &str) {
        let is_done = current + 1 >= total;
        if !is_done {
            let mut last = self.last_emit.lock().unwrap();
            if last.elapsed().as_millis() < 200 {
                return;
            }
            *last = Instant::now();
        }
        (self.inner)(stage, current, total, message);
    }
}

/// Whether [`run`] keeps watching after the backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Watch,
    Once,
}

/// Backfill (if enabled), then watch `source` until `cancel` fires.
pub fn run(
    options: &SortOptions,
    mode: RunMode,
    cancel: &CancellationToken,
    progress_callback: &ProgressCallback<'_>,
) -> anyhow::Result<SortSummary> {
    info!("Starting image processing system");
    let options = normalize(options)?;

    // Start watching first so files arriving during the backfill are not missed.
    let watcher = match mode {
        RunMode::Watch => Some(
            watch::FsWatcher::watch(&options.source)
                .with_context(|| format!("watching {}", options.source.display()))?,
        ),
        RunMode::Once => None,
    };

    let mut summary = SortSummary::default();
    if options.backfill {
        let tp = ThrottledProgress::new(progress_callback);
        summary.merge(&pipeline::process_existing(&options, &tp, cancel));
    }

    if let Some(mut w) = watcher {
        summary.merge(&pipeline::watch_loop(&mut w, &options, cancel));
        w.stop();
    }

    Ok(summary)
}

/// Create the destination and make both roots absolute, so paths reported
/// by the walker and the watcher compare against them reliably.
fn normalize(options: &SortOptions) -> anyhow::Result<SortOptions> {
    fs::create_dir_all(&options.destination)
        .with_context(|| format!("creating {}", options.destination.display()))?;
    let mut normalized = options.clone();
    normalized.source = fs::canonicalize(&options.source)
        .with_context(|| format!("source directory {}", options.source.display()))?;
    normalized.destination = fs::canonicalize(&options.destination)?;
    Ok(normalized)
}
