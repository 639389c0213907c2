//! Per-file ingestion, the startup backfill, and the live loop.
//!
//! Per file: `Discovered -> Skipped` for unsupported extensions,
//! `Discovered -> Classified -> Relocated` on success, and
//! `FailedLeaveInPlace` on any error. Nothing is retried automatically.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::cancel::CancellationToken;
use crate::media::ImageFile;
use crate::placement::{classify, destination_for, move_file, place, Classification};
use crate::watch::{EventSource, Recv};
use crate::{SortOptions, ThrottledProgress};

#[derive(Debug, Clone)]
pub enum FileOutcome {
    /// Unsupported extension or a file inside the destination tree.
    Skipped,
    Moved {
        destination: PathBuf,
        classification: Classification,
    },
    /// The file was left where it was.
    Failed { error: String },
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FileOutcome::Moved { .. })
    }
}

/// Counts over a batch of processed files.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSummary {
    pub discovered: u64,
    pub moved: u64,
    pub skipped: u64,
    pub failed: u64,
}

impl SortSummary {
    pub fn record(&mut self, outcome: &FileOutcome) {
        self.discovered += 1;
        match outcome {
            FileOutcome::Skipped => self.skipped += 1,
            FileOutcome::Moved { .. } => self.moved += 1,
            FileOutcome::Failed { .. } => self.failed += 1,
        }
    }

    pub fn merge(&mut self, other: &SortSummary) {
        self.discovered += other.discovered;
        self.moved += other.moved;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Files that are never considered, supported or not.
fn is_ignored(path: &Path, options: &SortOptions) -> bool {
    path.starts_with(&options.destination)
}

/// Process one file end to end. Never panics on I/O problems and never
/// propagates an error: failures are logged and returned as
/// [`FileOutcome::Failed`].
pub fn process_file(path: &Path, options: &SortOptions) -> FileOutcome {
    let file = ImageFile::new(path);
    if !file.is_supported() || is_ignored(path, options) {
        debug!("Skipping non-image file: {}", path.display());
        return FileOutcome::Skipped;
    }
    if !file.exists() {
        error!("Error processing {}: file no longer exists", path.display());
        return FileOutcome::Failed {
            error: "file no longer exists".to_string(),
        };
    }

    let result = destination_for(&file, &options.destination, &options.thresholds)
        .and_then(|(dest, classification)| {
            move_file(&file.path, &dest).map(|()| (dest, classification))
        });
    outcome(&file, result)
}

/// Resolve the destination of an already classified file and move it there.
fn relocate(file: &ImageFile, classification: Classification, options: &SortOptions) -> FileOutcome {
    let result = place(&options.destination, file, &classification)
        .and_then(|dest| move_file(&file.path, &dest).map(|()| (dest, classification)));
    outcome(file, result)
}

fn outcome(file: &ImageFile, result: io::Result<(PathBuf, Classification)>) -> FileOutcome {
    match result {
        Ok((destination, classification)) => {
            info!("Processed {} -> {}", file.path.display(), destination.display());
            FileOutcome::Moved {
                destination,
                classification,
            }
        }
        Err(e) => {
            error!("Error processing {}: {}", file.path.display(), e);
            FileOutcome::Failed {
                error: e.to_string(),
            }
        }
    }
}

/// Collect every file under the source tree, pruning the destination tree.
fn discover(options: &SortOptions) -> Vec<PathBuf> {
    WalkDir::new(&options.source)
        .into_iter()
        .filter_entry(|e| !is_ignored(e.path(), options))
        .filter_map(|entry| match entry {
            Ok(e) => Some(e),
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect()
}

/// Process every file already present in the source tree.
///
/// Classification (EXIF + blur scoring, read-only) runs in parallel;
/// destination resolution and moves run one at a time so the collision
/// check is never raced.
pub fn process_existing(
    options: &SortOptions,
    progress: &ThrottledProgress,
    cancel: &CancellationToken,
) -> SortSummary {
    info!("Processing existing files in {}", options.source.display());
    let mut summary = SortSummary::default();

    let mut candidates = Vec::new();
    for path in discover(options) {
        let file = ImageFile::new(&path);
        if file.is_supported() {
            candidates.push(file);
        } else {
            debug!("Skipping non-image file: {}", path.display());
            summary.record(&FileOutcome::Skipped);
        }
    }

    let total = candidates.len() as u64;
    let counter = AtomicU64::new(0);
    let classify_all = || -> Vec<Option<Classification>> {
        candidates
            .par_iter()
            .map(|file| {
                if cancel.is_cancelled() {
                    return None;
                }
                let c = classify(file, &options.thresholds);
                let current = counter.fetch_add(1, Ordering::Relaxed);
                progress.report("classify", current, total, &file.filename.to_string_lossy());
                Some(c)
            })
            .collect()
    };

    let classifications = match build_pool(options.jobs) {
        Some(pool) => pool.install(classify_all),
        None => classify_all(),
    };

    for (i, (file, classification)) in candidates.iter().zip(classifications).enumerate() {
        if cancel.is_cancelled() {
            info!("Backfill interrupted after {} of {} images", i, total);
            break;
        }
        let Some(classification) = classification else {
            continue;
        };
        let outcome = if file.exists() {
            relocate(file, classification, options)
        } else {
            error!("Error processing {}: file no longer exists", file.path.display());
            FileOutcome::Failed {
                error: "file no longer exists".to_string(),
            }
        };
        summary.record(&outcome);
        progress.report("move", i as u64, total, &file.filename.to_string_lossy());
    }

    summary
}

fn build_pool(jobs: usize) -> Option<rayon::ThreadPool> {
    if jobs == 0 {
        return None;
    }
    match rayon::ThreadPoolBuilder::new().num_threads(jobs).build() {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!("Cannot build a {}-thread pool, using the global one: {}", jobs, e);
            None
        }
    }
}

/// Process created files as they are reported, until the source closes or
/// `cancel` fires. An in-flight file is always finished first.
pub fn watch_loop<S: EventSource + ?Sized>(
    source: &mut S,
    options: &SortOptions,
    cancel: &CancellationToken,
) -> SortSummary {
    info!("Monitoring {} for new images...", options.source.display());
    let mut summary = SortSummary::default();

    while !cancel.is_cancelled() {
        match source.next_created(options.poll_interval()) {
            Recv::Created(path) => {
                if path.is_dir() {
                    continue;
                }
                info!("New file detected: {}", path.display());
                thread::sleep(options.grace_period());
                // already moved by the backfill, or deleted before the grace period ended
                if !path.exists() {
                    debug!("{} is gone, nothing to do", path.display());
                    summary.record(&FileOutcome::Skipped);
                    continue;
                }
                summary.record(&process_file(&path, options));
            }
            Recv::Timeout => {}
            Recv::Closed => break,
        }
    }

    info!("Stopping image monitoring");
    summary
}
