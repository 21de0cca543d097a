use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use super::decode::FrameStream;

/// JPEG quality for saved still frames.
pub const JPEG_QUALITY: u8 = 95;

/// Saves selected frames of a video to disk. The plan maps a frame index
/// to the file that frame should be written to.
pub trait FrameGrabber {
    /// Returns how many planned frames were actually written.
    fn grab(&self, video: &Path, plan: &BTreeMap<u64, PathBuf>) -> Result<usize>;
}

/// Decodes the video once, front to back, saving each planned frame as it
/// streams past. Stops as soon as the highest planned index is written.
pub struct DecodingGrabber;

impl FrameGrabber for DecodingGrabber {
    fn grab(&self, video: &Path, plan: &BTreeMap<u64, PathBuf>) -> Result<usize> {
        let Some(&last_wanted) = plan.keys().next_back() else {
            return Ok(0);
        };
        let mut stream = FrameStream::open(video).context("Failed to open video for frame export")?;
        let mut saved = 0;
        while let Some((index, frame)) = stream.next_frame()? {
            if let Some(path) = plan.get(&index) {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create frame file {}", path.display()))?;
                let encoder = JpegEncoder::new_with_quality(BufWriter::new(file), JPEG_QUALITY);
                frame
                    .write_with_encoder(encoder)
                    .with_context(|| format!("Failed to encode frame {} as JPEG", index))?;
                saved += 1;
            }
            if index >= last_wanted {
                break;
            }
        }
        if saved < plan.len() {
            log::warn!(
                "saved {} of {} planned frames from {}",
                saved,
                plan.len(),
                video.display()
            );
        }
        Ok(saved)
    }
}

/// Touches an empty file for every planned frame; stands in for the
/// decoder in stage tests.
pub struct StubGrabber;

impl FrameGrabber for StubGrabber {
    fn grab(&self, _video: &Path, plan: &BTreeMap<u64, PathBuf>) -> Result<usize> {
        for path in plan.values() {
            std::fs::write(path, "")
                .with_context(|| format!("Failed to create {}", path.display()))?;
        }
        Ok(plan.len())
    }
}
