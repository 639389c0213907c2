//! Fixture builders shared by the unit tests.

use std::io::Cursor;
use std::path::Path;

use exif::experimental::Writer;
use exif::{Field, In, Tag, Value};
use image::{ImageFormat, Rgb, RgbImage};

pub fn solid(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, Rgb(color))
}

/// Black and white squares of `cell` pixels: very high Laplacian variance.
pub fn checkerboard(width: u32, height: u32, cell: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        if (x / cell + y / cell) % 2 == 0 {
            Rgb([0, 0, 0])
        } else {
            Rgb([255, 255, 255])
        }
    })
}

/// First `left_columns` columns in `left`, the rest in `right`.
pub fn split(width: u32, height: u32, left_columns: u32, left: [u8; 3], right: [u8; 3]) -> RgbImage {
    RgbImage::from_fn(width, height, |x, _| {
        if x < left_columns {
            Rgb(left)
        } else {
            Rgb(right)
        }
    })
}

pub fn jpeg_bytes(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Jpeg)
        .unwrap();
    buf
}

/// Insert an APP1 EXIF segment carrying `DateTimeOriginal = date` after SOI.
pub fn with_capture_date(jpeg: &[u8], date: &str) -> Vec<u8> {
    let field = Field {
        tag: Tag::DateTimeOriginal,
        ifd_num: In::PRIMARY,
        value: Value::Ascii(vec![date.as_bytes().to_vec()]),
    };
    let mut writer = Writer::new();
    writer.push_field(&field);
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).unwrap();
    let tiff = tiff.into_inner();

    let len = u16::try_from(2 + 6 + tiff.len()).unwrap();
    let mut out = Vec::with_capacity(jpeg.len() + tiff.len() + 10);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(b"Exif\0\0");
    out.extend_from_slice(&tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// A sharp JPEG with an EXIF capture date.
pub fn jpeg_with_capture_date(date: &str) -> Vec<u8> {
    with_capture_date(&jpeg_bytes(&checkerboard(64, 64, 4)), date)
}

/// A featureless (blurry) JPEG with an EXIF capture date.
pub fn flat_jpeg_with_capture_date(date: &str) -> Vec<u8> {
    with_capture_date(&jpeg_bytes(&solid(64, 64, [90, 110, 90])), date)
}

pub fn write_checkerboard_jpeg(path: &Path) {
    std::fs::write(path, jpeg_bytes(&checkerboard(64, 64, 4))).unwrap();
}

pub fn write_flat_jpeg(path: &Path) {
    std::fs::write(path, jpeg_bytes(&solid(64, 64, [90, 110, 90]))).unwrap();
}
