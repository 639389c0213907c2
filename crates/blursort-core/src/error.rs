use thiserror::Error;

/// Errors raised inside the per-file stages. None of these escape the
/// pipeline: they are logged and folded into a verdict or a failed outcome.
#[derive(Error, Debug)]
pub enum SortError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("EXIF error: {0}")]
    Exif(#[from] exif::Error),
    #[error("no DateTimeOriginal or DateTime tag")]
    NoDateTag,
    #[error("unparseable capture date {0:?}")]
    BadDate(String),
    #[error("image decode failed: {0}")]
    Image(#[from] image::ImageError),
    #[error("image decoder panicked")]
    DecoderPanicked,
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, SortError>;
