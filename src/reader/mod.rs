use std::path::{Path, PathBuf};

use image::{DynamicImage, GrayImage};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::common::{RawScanEvent, ScanError, ScanResult};

// Frame decode
//------------------------------------------------------------------------------

/// Every QR payload found in a camera frame, in detection order. Symbols that
/// are located but fail to decode are skipped.
pub fn decode_frame(img: &DynamicImage) -> Vec<String> {
    let luma = img.to_luma8();
    decode_luma(&luma).into_iter().filter_map(Result::ok).collect()
}

/// Turns one frame into scan events sharing the frame timestamp.
pub fn frame_events(img: &DynamicImage, timestamp_ms: i64) -> Vec<RawScanEvent> {
    decode_frame(img).into_iter().map(|v| RawScanEvent::new(v, timestamp_ms)).collect()
}

fn decode_luma(img: &GrayImage) -> Vec<Result<String, String>> {
    let (w, h) = img.dimensions();
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w as usize, h as usize, |x, y| {
        img.get_pixel(x as u32, y as u32).0[0]
    });
    let grids = prepared.detect_grids();
    debug!("Found {} symbol(s) in {w}x{h} image", grids.len());

    grids
        .into_iter()
        .map(|g| {
            g.decode()
                .map(|(meta, content)| {
                    debug!(version = meta.version.0, ecc = meta.ecc_level, "Decoded symbol");
                    content
                })
                .map_err(|e| e.to_string())
        })
        .collect()
}

// Gallery decode
//------------------------------------------------------------------------------

/// Decodes a picked image file. `Ok(None)` when the image has no QR code;
/// `DecodeFailure` when the file can't be read or a code was found but none
/// could be decoded.
pub fn decode_file(path: &Path) -> ScanResult<Option<String>> {
    let img = image::open(path).inspect_err(|e| warn!("Cannot open {}: {e}", path.display()))?;
    decode_image(&img)
}

pub fn decode_image(img: &DynamicImage) -> ScanResult<Option<String>> {
    let mut last_err = None;
    for result in decode_luma(&img.to_luma8()) {
        match result {
            Ok(content) => return Ok(Some(content)),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(ScanError::DecodeFailure(e)),
        None => Ok(None),
    }
}

// Image files
//------------------------------------------------------------------------------

pub fn is_image_file(entry: &DirEntry) -> bool {
    entry.file_type().is_file() && has_image_ext(entry.path())
}

fn has_image_ext(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "jpg" | "jpeg"))
        .unwrap_or(false)
}

/// Image files under `dir`, sorted by path.
pub fn image_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.inspect_err(|e| warn!("Skipping entry: {e}")).ok())
        .filter(is_image_file)
        .map(DirEntry::into_path)
        .collect();
    files.sort();
    files
}

#[cfg(test)]
mod reader_tests {
    use image::{DynamicImage, GrayImage, Luma};

    use super::{decode_file, decode_frame, decode_image, frame_events, image_files};
    use crate::builder::QRBuilder;
    use crate::common::ScanError;

    fn qr(text: &str) -> DynamicImage {
        DynamicImage::ImageRgba8(QRBuilder::new(text).size(256).build().unwrap())
    }

    #[test]
    fn test_decode_frame() {
        assert_eq!(decode_frame(&qr("https://example.com")), vec!["https://example.com"]);

        let blank = DynamicImage::ImageLuma8(GrayImage::from_pixel(64, 64, Luma([255])));
        assert!(decode_frame(&blank).is_empty());
        assert_eq!(decode_image(&blank), Ok(None));
    }

    #[test]
    fn test_frame_events() {
        let events = frame_events(&qr("hello"), 42);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, "hello");
        assert_eq!(events[0].timestamp_ms, 42);
    }

    #[test]
    fn test_decode_file() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("code.png");
        qr("user@example.com").save(&png).unwrap();
        assert_eq!(decode_file(&png).unwrap().as_deref(), Some("user@example.com"));

        let bogus = dir.path().join("bogus.png");
        std::fs::write(&bogus, b"not an image").unwrap();
        assert!(matches!(decode_file(&bogus), Err(ScanError::DecodeFailure(_))));
    }

    #[test]
    fn test_image_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.PNG", "a.jpg", "sub/c.jpeg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        let names: Vec<_> = image_files(dir.path())
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().to_string_lossy().replace('\\', "/"))
            .collect();
        assert_eq!(names, vec!["a.jpg", "b.PNG", "sub/c.jpeg"]);
    }
}
