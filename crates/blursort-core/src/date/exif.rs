use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{Field, In, Reader, Tag, Value};

use crate::error::{Result, SortError};

/// EXIF datetime layout. EXIF datetimes have no timezone info - they are local time as-is.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Tags consulted for the capture time, highest priority first.
const DATE_TAGS: [Tag; 2] = [Tag::DateTimeOriginal, Tag::DateTime];

/// Read the capture time embedded in an image file.
pub fn extract_exif_date(path: &Path) -> Result<NaiveDateTime> {
    let file = File::open(path)?;
    let exif = Reader::new().read_from_container(&mut BufReader::new(file))?;

    let raw = DATE_TAGS
        .iter()
        .find_map(|tag| exif.get_field(*tag, In::PRIMARY).and_then(ascii_value))
        .ok_or(SortError::NoDateTag)?;

    parse_exif_datetime(&raw)
}

fn ascii_value(field: &Field) -> Option<String> {
    match field.value {
        Value::Ascii(ref parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned()),
        _ => None,
    }
}

/// Parse `YYYY:MM:DD HH:MM:SS`. Trailing NULs and padding are ignored, nothing else is.
pub fn parse_exif_datetime(s: &str) -> Result<NaiveDateTime> {
    let cleaned = s.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    NaiveDateTime::parse_from_str(cleaned, EXIF_DATETIME_FORMAT)
        .map_err(|_| SortError::BadDate(s.to_string()))
}
