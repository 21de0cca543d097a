use anyhow::{Context, Result};
use image::DynamicImage;
use img_hash::{image as img_hash_image, HashAlg, HasherConfig};
use std::path::{Path, PathBuf};

use super::is_image_file;

const HASH_EDGE: u32 = 256;

/// Nearest-neighbor lookup over the images of one folder.
pub trait FeatureIndex {
    /// Index every image directly inside `folder`. Returns how many were
    /// indexed; any previous contents of the index are discarded.
    fn build(&mut self, folder: &Path) -> Result<usize>;

    /// The `k` indexed images closest to the query image, best match first.
    fn query(&self, image: &Path, k: usize) -> Result<Vec<PathBuf>>;
}

/// Crop to a centered square and resize to standard dimensions before
/// hashing. This keeps the central content, which stays consistent across
/// different sizes and aspect ratios of the same shot.
fn normalize_for_hash(img: &DynamicImage) -> image::RgbaImage {
    use image::GenericImageView;
    let (width, height) = img.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    img.crop_imm(x, y, side, side)
        .resize_exact(HASH_EDGE, HASH_EDGE, image::imageops::FilterType::Lanczos3)
        .to_rgba8()
}

/// Decoding goes through the main `image` crate; the `image` version
/// `img_hash` re-exports is built without any format decoders, so pixels
/// cross into it as a raw buffer.
pub fn perceptual_hash(image_path: &Path) -> Result<Vec<u8>> {
    let img = image::open(image_path)
        .with_context(|| format!("Failed to open image {}", image_path.display()))?;

    let normalized = normalize_for_hash(&img);
    let (width, height) = normalized.dimensions();
    let buffer = img_hash_image::RgbaImage::from_raw(width, height, normalized.into_raw())
        .context("Failed to stage pixels for hashing")?;

    let hasher = HasherConfig::new()
        .hash_alg(HashAlg::Blockhash)
        .hash_size(8, 8)
        .to_hasher();

    Ok(hasher
        .hash_image(&img_hash_image::DynamicImage::ImageRgba8(buffer))
        .as_bytes()
        .to_vec())
}

pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Result<u32> {
    if hash1.len() != hash2.len() {
        anyhow::bail!("Hashes must be the same length");
    }
    Ok(hash1
        .iter()
        .zip(hash2.iter())
        .map(|(byte1, byte2)| (byte1 ^ byte2).count_ones())
        .sum())
}

/// In-memory perceptual-hash index. Ranking is by Hamming distance, with
/// folder order breaking ties.
#[derive(Default)]
pub struct PhashIndex {
    entries: Vec<(PathBuf, Vec<u8>)>,
}

impl FeatureIndex for PhashIndex {
    fn build(&mut self, folder: &Path) -> Result<usize> {
        self.entries.clear();
        let mut paths: Vec<PathBuf> = std::fs::read_dir(folder)
            .with_context(|| format!("Failed to read folder {}", folder.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        paths.sort();
        for path in paths {
            let hash = perceptual_hash(&path)?;
            self.entries.push((path, hash));
        }
        log::debug!(
            "indexed {} images in {}",
            self.entries.len(),
            folder.display()
        );
        Ok(self.entries.len())
    }

    fn query(&self, image: &Path, k: usize) -> Result<Vec<PathBuf>> {
        let needle = perceptual_hash(image)?;
        let mut scored = Vec::with_capacity(self.entries.len());
        for (path, hash) in &self.entries {
            scored.push((hamming_distance(&needle, hash)?, path));
        }
        scored.sort_by_key(|(distance, _)| *distance);
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(_, path)| path.clone())
            .collect())
    }
}

/// Hands back a preset result list; lets the clustering stage be tested
/// without hashing real images.
pub struct StubIndex {
    pub results: Vec<PathBuf>,
}

impl FeatureIndex for StubIndex {
    fn build(&mut self, _folder: &Path) -> Result<usize> {
        Ok(self.results.len())
    }

    fn query(&self, _image: &Path, k: usize) -> Result<Vec<PathBuf>> {
        Ok(self.results.iter().take(k).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn write_gradient(path: &Path) {
        RgbImage::from_fn(64, 64, |x, _| Rgb([(x * 4) as u8; 3]))
            .save(path)
            .expect("write gradient image");
    }

    #[test]
    fn test_hamming_distance() {
        let hash1 = vec![0b11110000, 0b10101010];
        let hash2 = vec![0b11110000, 0b10101010];
        assert_eq!(hamming_distance(&hash1, &hash2).unwrap(), 0);

        let hash3 = vec![0b11110000, 0b00000000];
        let hash4 = vec![0b00001111, 0b11111111];
        assert_eq!(hamming_distance(&hash3, &hash4).unwrap(), 16);
    }

    #[test]
    fn hashing_decodes_real_image_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let png = dir.path().join("a.png");
        write_gradient(&png);
        let jpg = dir.path().join("b.jpg");
        RgbImage::from_pixel(64, 64, Rgb([9, 9, 9]))
            .save(&jpg)
            .expect("write jpeg image");

        assert_eq!(perceptual_hash(&png).expect("hash png").len(), 8);
        assert_eq!(perceptual_hash(&jpg).expect("hash jpeg").len(), 8);
    }

    #[test]
    fn hamming_distance_rejects_mismatched_lengths() {
        assert!(hamming_distance(&[0u8], &[0u8, 0u8]).is_err());
    }

    #[test]
    fn query_ranks_identical_images_first() {
        let dir = tempfile::tempdir().expect("temp dir");
        let corpus = dir.path().join("corpus");
        std::fs::create_dir(&corpus).expect("corpus dir");
        write_gradient(&corpus.join("a.png"));
        write_gradient(&corpus.join("b.png"));
        RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]))
            .save(corpus.join("c.png"))
            .expect("write solid image");
        let needle = dir.path().join("needle.png");
        write_gradient(&needle);

        let mut index = PhashIndex::default();
        assert_eq!(index.build(&corpus).expect("build"), 3);

        let top = index.query(&needle, 2).expect("query");
        assert_eq!(top, vec![corpus.join("a.png"), corpus.join("b.png")]);
    }

    #[test]
    fn build_skips_caption_sidecars() {
        let dir = tempfile::tempdir().expect("temp dir");
        write_gradient(&dir.path().join("a.png"));
        std::fs::write(dir.path().join("a.txt"), "a caption").expect("write sidecar");

        let mut index = PhashIndex::default();
        assert_eq!(index.build(dir.path()).expect("build"), 1);
    }
}
