//! Image encoding: PNG bytes, content hashes and VLM attachments.
//!
//! Every raster leaving the pre-pass is PNG. Region names carry the first 12
//! hex digits of the SHA-256 of the encoded bytes, so identical pixels always
//! map to the same name across runs.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use sha2::{Digest, Sha256};
use std::io::Cursor;
use tracing::debug;

/// Encode an image as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// First 12 hex digits of the SHA-256 of `bytes`.
pub fn content_hash12(bytes: &[u8]) -> String {
    let mut hex = format!("{:x}", Sha256::digest(bytes));
    hex.truncate(12);
    hex
}

/// `image_{page}_{hash12}.png`
pub fn embedded_name(page: usize, png: &[u8]) -> String {
    format!("image_{}_{}.png", page, content_hash12(png))
}

/// `drawing_{page}_{cluster}_{hash12}.png`
pub fn drawing_name(page: usize, cluster: usize, png: &[u8]) -> String {
    format!("drawing_{}_{}_{}.png", page, cluster, content_hash12(png))
}

/// Wrap an encoded page PNG for the VLM API.
///
/// `detail: "high"` keeps the provider from downsampling to a single
/// overview tile, which loses fine print and small tables.
pub fn page_attachment(png: &[u8]) -> ImageData {
    let b64 = STANDARD.encode(png);
    debug!("Encoded page → {} bytes base64", b64.len());
    ImageData::new(b64, "image/png").with_detail("high")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([255, 0, 0])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");
        let decoded = image::load_from_memory(&png).expect("valid png");
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }

    #[test]
    fn hash_is_stable_and_short() {
        let a = content_hash12(b"hello");
        assert_eq!(a.len(), 12);
        assert_eq!(a, content_hash12(b"hello"));
        assert_ne!(a, content_hash12(b"hellp"));
        // sha256("hello") = 2cf24dba5fb0a30e...
        assert_eq!(a, "2cf24dba5fb0");
    }

    #[test]
    fn names_follow_pattern() {
        assert_eq!(embedded_name(4, b"hello"), "image_4_2cf24dba5fb0.png");
        assert_eq!(drawing_name(0, 2, b"hello"), "drawing_0_2_2cf24dba5fb0.png");
    }

    #[test]
    fn attachment_is_valid_base64() {
        let data = page_attachment(b"\x89PNG fake");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(decoded, b"\x89PNG fake");
    }
}
