use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use super::corpus::CorpusRegistry;
use super::sidecar_path;
use crate::media::captioner::Captioner;

#[derive(Debug, Clone, Copy)]
pub struct CaptionOptions {
    /// Replace captions that already exist. Off means incremental: only
    /// images without a sidecar are captioned.
    pub overwrite: bool,
}

impl Default for CaptionOptions {
    fn default() -> Self {
        Self { overwrite: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CaptionReport {
    pub written: usize,
    pub skipped: usize,
}

/// Caption every image directly inside `folder`, writing each caption to
/// the image's sidecar. A failure to read an image or produce a caption
/// stops the run.
pub fn caption_folder(
    folder: &Path,
    options: CaptionOptions,
    captioner: &mut dyn Captioner,
) -> Result<CaptionReport> {
    let registry = CorpusRegistry::scan(folder)?;
    let mut report = CaptionReport {
        written: 0,
        skipped: 0,
    };
    for record in registry.records() {
        if !options.overwrite && record.caption_path.is_some() {
            report.skipped += 1;
            continue;
        }
        let image = image::open(&record.image_path)
            .with_context(|| format!("Failed to open image {}", record.image_path.display()))?
            .to_rgb8();
        let text = captioner.caption(&image)?;
        let sidecar = sidecar_path(&record.image_path);
        std::fs::write(&sidecar, text.trim())
            .with_context(|| format!("Failed to write caption {}", sidecar.display()))?;
        report.written += 1;
    }
    log::debug!(
        "captioned {} images in {} ({} skipped)",
        report.written,
        folder.display(),
        report.skipped
    );
    Ok(report)
}
