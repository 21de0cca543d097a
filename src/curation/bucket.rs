use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use super::Resolution;
use crate::media::is_media_file;
use crate::media::transcode::{FilterSpec, Transcoder};

/// Target sizes every bucketing run produces, one subfolder each.
pub const BUCKET_PRESETS: [&str; 2] = ["576x320", "1024x576"];

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub processed: Vec<String>,
    pub errors: Vec<String>,
}

/// Re-render every media file directly inside `input` at the target size,
/// writing results under `output`. One file failing does not stop the
/// rest of the batch.
pub fn bucket_media(
    input: &Path,
    output: &Path,
    target: Resolution,
    transcoder: &dyn Transcoder,
) -> Result<BucketReport> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create folder {}", output.display()))?;
    let mut files: Vec<_> = std::fs::read_dir(input)
        .with_context(|| format!("Failed to read folder {}", input.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_media_file(path))
        .collect();
    files.sort();

    let spec = FilterSpec::CropScale {
        width: target.width,
        height: target.height,
    };
    let mut report = BucketReport::default();
    for path in files {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match transcoder.run(&path, &spec, &output.join(&name)) {
            Ok(()) => report.processed.push(path.display().to_string()),
            Err(err) => report
                .errors
                .push(format!("Error processing {}: {err:#}", path.display())),
        }
    }
    log::debug!(
        "bucketed {} files into {} ({} errors)",
        report.processed.len(),
        output.display(),
        report.errors.len()
    );
    Ok(report)
}
