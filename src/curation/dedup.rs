use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

use super::move_file;

/// How two files are decided to be the same.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MatchMode {
    /// Same file name. No decoding, no reads; the historical behavior.
    #[default]
    FileName,
    /// Same file contents, byte for byte.
    ContentHash,
}

/// What a pass moved and what it could not process
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct DedupReport {
    pub moved: Vec<String>,
    pub errors: Vec<String>,
}

fn file_identity(path: &Path, mode: MatchMode) -> Result<String> {
    match mode {
        MatchMode::FileName => Ok(path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()),
        MatchMode::ContentHash => {
            let mut file = std::fs::File::open(path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            let mut hasher = blake3::Hasher::new();
            std::io::copy(&mut file, &mut hasher)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(hasher.finalize().to_hex().to_string())
        }
    }
}

fn folder_files(folder: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files: Vec<_> = std::fs::read_dir(folder)
        .with_context(|| format!("Failed to read folder {}", folder.display()))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Move every file in `compare` whose identity also appears in `reference`
/// into `output`. Matching covers arbitrary files, videos and stills
/// alike; a caption sidecar moves only when the reference set names it
/// too. The reference folder is never modified.
pub fn deduplicate(
    reference: &Path,
    compare: &Path,
    output: &Path,
    mode: MatchMode,
) -> Result<DedupReport> {
    let mut known = HashSet::new();
    for path in folder_files(reference)? {
        known.insert(file_identity(&path, mode)?);
    }
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create folder {}", output.display()))?;

    let mut report = DedupReport::default();
    for path in folder_files(compare)? {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identity = match file_identity(&path, mode) {
            Ok(identity) => identity,
            Err(err) => {
                report
                    .errors
                    .push(format!("Error processing {}: {err:#}", path.display()));
                continue;
            }
        };
        if !known.contains(&identity) {
            continue;
        }
        match move_file(&path, &output.join(&name)) {
            Ok(()) => report.moved.push(name),
            Err(err) => report
                .errors
                .push(format!("Error processing {}: {err:#}", path.display())),
        }
    }
    log::debug!(
        "deduplicated {}: {} moved to {}",
        compare.display(),
        report.moved.len(),
        output.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn setup(reference: &[(&str, &str)], compare: &[(&str, &str)]) -> (tempfile::TempDir, PathBuf, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let reference_dir = dir.path().join("reference");
        let compare_dir = dir.path().join("compare");
        let output_dir = dir.path().join("duplicates");
        std::fs::create_dir(&reference_dir).unwrap();
        std::fs::create_dir(&compare_dir).unwrap();
        for (name, contents) in reference {
            std::fs::write(reference_dir.join(name), contents).unwrap();
        }
        for (name, contents) in compare {
            std::fs::write(compare_dir.join(name), contents).unwrap();
        }
        (dir, reference_dir, compare_dir, output_dir)
    }

    #[test]
    fn name_matches_move_and_the_rest_stay() {
        let (_dir, reference, compare, output) = setup(
            &[("a.jpg", "1"), ("b.jpg", "2")],
            &[("a.jpg", "other"), ("b.png", "2"), ("c.jpg", "3")],
        );

        let report = deduplicate(&reference, &compare, &output, MatchMode::FileName).unwrap();

        assert_eq!(report.moved, vec!["a.jpg".to_string()]);
        assert!(report.errors.is_empty());
        assert!(output.join("a.jpg").is_file());
        assert!(compare.join("b.png").is_file());
        assert!(compare.join("c.jpg").is_file());
        assert!(reference.join("a.jpg").is_file());
    }

    #[test]
    fn content_matches_ignore_the_file_name() {
        let (_dir, reference, compare, output) = setup(
            &[("original.jpg", "same bytes")],
            &[("renamed.jpg", "same bytes"), ("fresh.jpg", "new bytes")],
        );

        let report = deduplicate(&reference, &compare, &output, MatchMode::ContentHash).unwrap();

        assert_eq!(report.moved, vec!["renamed.jpg".to_string()]);
        assert!(output.join("renamed.jpg").is_file());
        assert!(compare.join("fresh.jpg").is_file());

        let by_name = deduplicate(&reference, &compare, &output, MatchMode::FileName).unwrap();
        assert!(by_name.moved.is_empty());
    }

    #[test]
    fn non_image_duplicates_move_too() {
        let (_dir, reference, compare, output) = setup(
            &[("clip.mp4", "v1"), ("a.jpg", "1")],
            &[("clip.mp4", "v2"), ("other.mp4", "v3")],
        );

        let report = deduplicate(&reference, &compare, &output, MatchMode::FileName).unwrap();

        assert_eq!(report.moved, vec!["clip.mp4".to_string()]);
        assert!(output.join("clip.mp4").is_file());
        assert!(!compare.join("clip.mp4").exists());
        assert!(compare.join("other.mp4").is_file());
        assert!(reference.join("clip.mp4").is_file());
    }

    #[test]
    fn caption_sidecars_are_left_behind() {
        let (_dir, reference, compare, output) = setup(
            &[("a.jpg", "1")],
            &[("a.jpg", "1"), ("a.txt", "caption")],
        );

        let report = deduplicate(&reference, &compare, &output, MatchMode::FileName).unwrap();

        assert_eq!(report.moved, vec!["a.jpg".to_string()]);
        assert!(compare.join("a.txt").is_file());
        assert!(!output.join("a.txt").exists());
        assert!(reference.exists());
    }
}
