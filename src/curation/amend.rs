use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use super::corpus::CorpusRegistry;
use super::CAPTION_EXTENSION;
use crate::media::has_extension_in;

/// Where the fragment goes relative to the existing caption text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AmendPosition {
    Prefix,
    Suffix,
}

impl AmendPosition {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "prefix" => Some(Self::Prefix),
            "suffix" => Some(Self::Suffix),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct AmendReport {
    pub modified: Vec<String>,
    pub errors: Vec<String>,
}

/// Names of images in `folder` that have no caption sidecar.
pub fn check_captions(folder: &Path) -> Result<Vec<String>> {
    Ok(CorpusRegistry::scan(folder)?.missing_captions())
}

/// Splice `fragment` into every caption file directly inside `folder`.
/// Problems are collected as diagnostics rather than stopping the batch.
pub fn amend_captions(folder: &Path, fragment: &str, position: &str) -> AmendReport {
    let mut report = AmendReport::default();
    let Some(position) = AmendPosition::parse(position) else {
        report
            .errors
            .push("Invalid append position. Please enter 'prefix' or 'suffix'.".to_string());
        return report;
    };
    let entries = match std::fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(_) => {
            report.errors.push("Folder not found.".to_string());
            return report;
        }
    };
    let mut captions: Vec<_> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_extension_in(path, &[CAPTION_EXTENSION]))
        .collect();
    captions.sort();
    for path in captions {
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        match amend_one(&path, fragment, position) {
            Ok(()) => report.modified.push(name),
            Err(err) => report.errors.push(format!("An error occurred: {err:#}")),
        }
    }
    report
}

fn amend_one(path: &Path, fragment: &str, position: AmendPosition) -> Result<()> {
    let existing = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let amended = match position {
        AmendPosition::Prefix => format!("{fragment}{existing}"),
        AmendPosition::Suffix => format!("{existing}{fragment}"),
    };
    std::fs::write(path, amended).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_goes_in_front_of_the_caption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "sunset over water").unwrap();

        let report = amend_captions(dir.path(), "photo of ", "prefix");

        assert_eq!(report.modified, vec!["a.txt".to_string()]);
        assert!(report.errors.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "photo of sunset over water"
        );
    }

    #[test]
    fn suffix_goes_after_the_caption() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "sunset").unwrap();
        std::fs::write(dir.path().join("b.txt"), "harbor").unwrap();
        std::fs::write(dir.path().join("c.jpg"), "binary").unwrap();

        let report = amend_captions(dir.path(), ", film still", "suffix");

        assert_eq!(
            report.modified,
            vec!["a.txt".to_string(), "b.txt".to_string()]
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "sunset, film still"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("c.jpg")).unwrap(),
            "binary"
        );
    }

    #[test]
    fn unknown_positions_are_rejected_before_touching_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "sunset").unwrap();

        let report = amend_captions(dir.path(), "x", "middle");

        assert_eq!(
            report.errors,
            vec!["Invalid append position. Please enter 'prefix' or 'suffix'.".to_string()]
        );
        assert!(report.modified.is_empty());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "sunset"
        );
    }

    #[test]
    fn a_missing_folder_is_a_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        let report = amend_captions(&dir.path().join("nowhere"), "x", "suffix");

        assert_eq!(report.errors, vec!["Folder not found.".to_string()]);
    }

    #[test]
    fn check_reports_images_without_captions() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]))
            .save(dir.path().join("a.png"))
            .unwrap();
        image::RgbImage::from_pixel(2, 2, image::Rgb([0, 0, 0]))
            .save(dir.path().join("b.png"))
            .unwrap();
        std::fs::write(dir.path().join("a.txt"), "captioned").unwrap();

        assert_eq!(check_captions(dir.path()).unwrap(), vec!["b.png".to_string()]);
    }
}
