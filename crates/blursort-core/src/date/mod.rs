//! Capture-time resolution.
//!
//! Resolution never fails: embedded EXIF wins, then the filesystem creation
//! time, then the modification time, and as a last resort the current time.

pub mod exif;

use std::fs;
use std::path::Path;

use chrono::{DateTime, Local, NaiveDateTime};
use filetime::FileTime;
use tracing::warn;

/// Where a capture timestamp came from (best first).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampSource {
    Exif,
    FileCreated,
    FileModified,
    Now,
}

/// Result of capture-time resolution: date + source, plus why EXIF was not used.
#[derive(Debug, Clone)]
pub struct CaptureTimestamp {
    pub datetime: NaiveDateTime,
    pub source: TimestampSource,
    pub diagnostic: Option<String>,
}

impl CaptureTimestamp {
    /// `YYYY-MM-DD` directory component.
    pub fn date_dir(&self) -> String {
        self.datetime.format("%Y-%m-%d").to_string()
    }

    /// `HH` directory component (24h).
    pub fn hour_dir(&self) -> String {
        self.datetime.format("%H").to_string()
    }
}

/// Resolve the capture time of `path`.
pub fn resolve_capture_time(path: &Path) -> CaptureTimestamp {
    match exif::extract_exif_date(path) {
        Ok(datetime) => CaptureTimestamp {
            datetime,
            source: TimestampSource::Exif,
            diagnostic: None,
        },
        Err(e) => {
            let (datetime, source) = filesystem_time(path);
            warn!(
                "No usable capture date in {} ({}), using {:?} time",
                path.display(),
                e,
                source
            );
            CaptureTimestamp {
                datetime,
                source,
                diagnostic: Some(e.to_string()),
            }
        }
    }
}

/// Filesystem time as local wall-clock time.
fn filesystem_time(path: &Path) -> (NaiveDateTime, TimestampSource) {
    let Ok(meta) = fs::metadata(path) else {
        return (Local::now().naive_local(), TimestampSource::Now);
    };
    let (ft, source) = match FileTime::from_creation_time(&meta) {
        Some(ft) => (ft, TimestampSource::FileCreated),
        None => (
            FileTime::from_last_modification_time(&meta),
            TimestampSource::FileModified,
        ),
    };
    match DateTime::from_timestamp(ft.unix_seconds(), ft.nanoseconds()) {
        Some(utc) => (utc.with_timezone(&Local).naive_local(), source),
        None => (Local::now().naive_local(), TimestampSource::Now),
    }
}
