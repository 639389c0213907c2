use std::ffi::OsString;
use std::path::PathBuf;

/// Extensions eligible for sorting (lower-case, without the dot).
pub const SUPPORTED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "nef", "cr2", "arw", "raw", "dng"];

/// Camera raw formats. These are never blur-analysed.
pub const RAW_EXTENSIONS: &[&str] = &["nef", "cr2", "arw", "raw", "dng"];

/// A file picked up from the watched directory, valid for one processing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    /// Absolute (or caller-supplied) path of the source file
    pub path: PathBuf,
    /// Lower-cased extension, empty when the file has none
    pub extension: String,
    /// Just the filename, byte-for-byte as on disk
    pub filename: OsString,
}

impl ImageFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_ascii_lowercase())
            .unwrap_or_default();
        let filename = path.file_name().map(|s| s.to_os_string()).unwrap_or_default();
        Self {
            path,
            extension,
            filename,
        }
    }

    pub fn is_supported(&self) -> bool {
        SUPPORTED_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn is_raw(&self) -> bool {
        RAW_EXTENSIONS.contains(&self.extension.as_str())
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_is_lowercased() {
        let f = ImageFile::new("/in/DSC_0001.NEF");
        assert_eq!(f.extension, "nef");
        assert_eq!(f.filename, "DSC_0001.NEF");
        assert!(f.is_supported());
        assert!(f.is_raw());
    }

    #[test]
    fn test_supported_set() {
        for name in ["a.jpg", "a.JPEG", "a.cr2", "a.Arw", "a.raw", "a.dng"] {
            assert!(ImageFile::new(name).is_supported(), "{name}");
        }
        for name in ["a.png", "a.txt", "a", "a.jpg.part", ".jpg"] {
            assert!(!ImageFile::new(name).is_supported(), "{name}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_filename_is_kept_verbatim() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let name = OsStr::from_bytes(b"IMG_\xff\xfe.jpg");
        let f = ImageFile::new(PathBuf::from("/in").join(name));
        assert_eq!(f.filename.as_bytes(), b"IMG_\xff\xfe.jpg");
        assert!(f.is_supported());
    }

    #[test]
    fn test_jpeg_is_not_raw() {
        assert!(!ImageFile::new("x.jpg").is_raw());
        assert!(!ImageFile::new("x.jpeg").is_raw());
    }
}
