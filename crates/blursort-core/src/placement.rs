//! Destination path resolution and the move itself.
//!
//! Layout: `<base>/<YYYY-MM-DD>/<HH>/<sharp|blurry>/<filename>`. A name that
//! is already taken gets `_1`, `_2`, ... inserted before the extension.
//! The existence check and the move are not atomic, so callers must not
//! place files into the same directory concurrently.

use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use filetime::FileTime;
use tracing::debug;

use crate::blur::{classify_file, BlurVerdict};
use crate::date::{resolve_capture_time, CaptureTimestamp};
use crate::media::ImageFile;
use crate::Thresholds;

/// Everything the destination depends on.
#[derive(Debug, Clone)]
pub struct Classification {
    pub capture: CaptureTimestamp,
    pub verdict: BlurVerdict,
}

/// Resolve capture time and blur verdict. Both fail open, so this cannot fail.
pub fn classify(file: &ImageFile, thresholds: &Thresholds) -> Classification {
    let capture = resolve_capture_time(&file.path);
    let verdict = classify_file(file, thresholds);
    Classification { capture, verdict }
}

pub fn destination_dir(base: &Path, classification: &Classification) -> PathBuf {
    base.join(classification.capture.date_dir())
        .join(classification.capture.hour_dir())
        .join(classification.verdict.status())
}

/// Create the destination directory and pick a free filename in it.
pub fn place(base: &Path, file: &ImageFile, classification: &Classification) -> io::Result<PathBuf> {
    let sub_dir = destination_dir(base, classification);
    fs::create_dir_all(&sub_dir)?;
    Ok(free_path(&sub_dir, &file.filename))
}

/// Classify `file` and resolve its destination under `base`.
pub fn destination_for(
    file: &ImageFile,
    base: &Path,
    thresholds: &Thresholds,
) -> io::Result<(PathBuf, Classification)> {
    let classification = classify(file, thresholds);
    let dest = place(base, file, &classification)?;
    Ok((dest, classification))
}

/// First of `filename`, `stem_1.ext`, `stem_2.ext`, ... not present in `dir`.
/// Names are handled as `OsStr`, so non-UTF-8 bytes survive unchanged.
pub fn free_path(dir: &Path, filename: impl AsRef<OsStr>) -> PathBuf {
    let filename = Path::new(filename.as_ref());
    let base_dest = dir.join(filename);
    if !base_dest.exists() {
        return base_dest;
    }

    let stem = filename.file_stem().unwrap_or_else(|| OsStr::new("file"));
    let ext = filename.extension();

    let mut counter = 1u64;
    loop {
        let mut new_name = stem.to_os_string();
        new_name.push(format!("_{}", counter));
        if let Some(ext) = ext {
            new_name.push(".");
            new_name.push(ext);
        }
        let candidate = dir.join(&new_name);
        if !candidate.exists() {
            break candidate;
        }
        counter += 1;
    }
}

/// Move `src` to `dest`, which must not exist.
///
/// Falls back to copy + delete only when the rename crosses filesystems;
/// every other rename error is returned as is. On any failure the source is
/// left where it was.
pub fn move_file(src: &Path, dest: &Path) -> io::Result<()> {
    if dest.exists() {
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("destination {} already exists", dest.display()),
        ));
    }

    let Err(rename_err) = fs::rename(src, dest) else {
        return Ok(());
    };
    if !is_cross_device(&rename_err) {
        return Err(rename_err);
    }

    copy_exclusive(src, dest)?;
    if let Err(e) = fs::remove_file(src) {
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

/// EXDEV on unix, ERROR_NOT_SAME_DEVICE on windows.
fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices
}

/// Copy into a freshly created `dest`, keeping the source mtime.
pub(crate) fn copy_exclusive(src: &Path, dest: &Path) -> io::Result<()> {
    let mut input = File::open(src)?;
    let mut out = OpenOptions::new().write(true).create_new(true).open(dest)?;
    if let Err(e) = io::copy(&mut input, &mut out) {
        drop(out);
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    drop(out);

    let meta = input.metadata()?;
    if let Err(e) = filetime::set_file_mtime(dest, FileTime::from_last_modification_time(&meta)) {
        debug!("Could not carry mtime over to {}: {}", dest.display(), e);
    }
    Ok(())
}
