// Image decoding and perceptual fingerprinting.
//
// The fingerprint is a 64-bit average hash: the image is converted to
// grayscale, downscaled to 8x8, and each pixel contributes one bit (set when
// brighter than the mean). Re-encodes, resizes and light edits of the same
// picture land on the same hash, which is exactly what repost detection
// wants; unrelated images occasionally collide, and that is accepted.

use image::imageops::{self, FilterType};
use image::DynamicImage;

use crate::error::DecodeError;

/// Side length of the downscaled grid the hash is computed over.
const HASH_SIZE: u32 = 8;

/// A decoded image, reduced to what classification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// 16 lowercase hex characters.
    pub fingerprint: String,
}

/// Image decode collaborator. Synchronous and CPU-bound; callers run it on
/// a blocking thread.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError>;
}

/// Decodes with the `image` crate and fingerprints with [`average_hash`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AverageHashDecoder;

impl ImageDecoder for AverageHashDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
        let img = image::load_from_memory(bytes).map_err(|e| DecodeError(e.to_string()))?;
        Ok(DecodedImage {
            width: img.width(),
            height: img.height(),
            fingerprint: average_hash(&img),
        })
    }
}

/// Compute the 64-bit average hash of an image as 16 hex characters.
///
/// Bits are laid out row-major, most significant bit first.
pub fn average_hash(img: &DynamicImage) -> String {
    let gray = img.to_luma8();
    let small = imageops::resize(&gray, HASH_SIZE, HASH_SIZE, FilterType::Lanczos3);

    let pixels: Vec<u8> = small.pixels().map(|p| p.0[0]).collect();
    let mean = pixels.iter().map(|&p| f64::from(p)).sum::<f64>() / pixels.len() as f64;

    let hash = pixels
        .iter()
        .fold(0u64, |acc, &p| (acc << 1) | u64::from(f64::from(p) > mean));

    format!("{hash:016x}")
}
