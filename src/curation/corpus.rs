use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{move_file, sidecar_path};
use crate::media::is_image_file;

/// One curated image and, when present, its caption sidecar. The pairing
/// is resolved once at scan time and owned here, so a relocation updates
/// a single record instead of every stage re-deriving the sidecar.
#[derive(Debug, Clone)]
pub struct ImageRecord {
    pub id: Uuid,
    pub image_path: PathBuf,
    pub caption_path: Option<PathBuf>,
}

impl ImageRecord {
    pub fn base_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Both files of a relocated record, at their new locations.
#[derive(Debug, Clone, PartialEq)]
pub struct RelocatedImage {
    pub image: PathBuf,
    pub caption: Option<PathBuf>,
}

/// The images directly inside one corpus folder.
pub struct CorpusRegistry {
    root: PathBuf,
    records: Vec<ImageRecord>,
}

impl CorpusRegistry {
    pub fn scan(root: &Path) -> Result<Self> {
        let mut images: Vec<PathBuf> = std::fs::read_dir(root)
            .with_context(|| format!("Failed to read folder {}", root.display()))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_image_file(path))
            .collect();
        images.sort();
        let records = images
            .into_iter()
            .map(|image_path| {
                let sidecar = sidecar_path(&image_path);
                ImageRecord {
                    id: Uuid::new_v4(),
                    caption_path: sidecar.is_file().then_some(sidecar),
                    image_path,
                }
            })
            .collect();
        Ok(Self {
            root: root.to_path_buf(),
            records,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn records(&self) -> &[ImageRecord] {
        &self.records
    }

    /// Names of images that have no caption sidecar yet.
    pub fn missing_captions(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|record| record.caption_path.is_none())
            .map(ImageRecord::base_name)
            .collect()
    }

    /// Move an image into `dest_dir`, taking its caption along. If the
    /// caption cannot be moved the image is put back, so the pair never
    /// ends up split across folders.
    pub fn relocate(&mut self, image_path: &Path, dest_dir: &Path) -> Result<RelocatedImage> {
        let record = self
            .records
            .iter_mut()
            .find(|record| record.image_path == image_path)
            .with_context(|| format!("{} is not part of this corpus", image_path.display()))?;
        let file_name = record
            .image_path
            .file_name()
            .with_context(|| format!("{} has no file name", record.image_path.display()))?;
        let moved_image = dest_dir.join(file_name);
        move_file(&record.image_path, &moved_image)?;

        // The sidecar is re-resolved at move time; one may have appeared
        // since the scan.
        let sidecar = sidecar_path(&record.image_path);
        let moved_caption = if sidecar.is_file() {
            let caption_dest = sidecar_path(&moved_image);
            if let Err(err) = move_file(&sidecar, &caption_dest) {
                move_file(&moved_image, &record.image_path).ok();
                return Err(err.context(format!(
                    "Failed to move caption for {}",
                    record.image_path.display()
                )));
            }
            Some(caption_dest)
        } else {
            None
        };

        record.image_path = moved_image.clone();
        record.caption_path = moved_caption.clone();
        Ok(RelocatedImage {
            image: moved_image,
            caption: moved_caption,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        std::fs::write(path, "x").expect("write test file");
    }

    #[test]
    fn scan_pairs_images_with_their_sidecars() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("a.txt"));
        touch(&dir.path().join("b.PNG"));
        touch(&dir.path().join("notes.txt"));
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let registry = CorpusRegistry::scan(dir.path()).unwrap();

        assert_eq!(registry.records().len(), 2);
        assert_eq!(registry.records()[0].base_name(), "a.jpg");
        assert!(registry.records()[0].caption_path.is_some());
        assert!(registry.records()[1].caption_path.is_none());
        assert_eq!(registry.missing_captions(), vec!["b.PNG".to_string()]);
    }

    #[test]
    fn relocate_moves_image_and_caption_together() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("picked");
        std::fs::create_dir(&dest).unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("a.txt"));

        let mut registry = CorpusRegistry::scan(dir.path()).unwrap();
        let moved = registry
            .relocate(&dir.path().join("a.jpg"), &dest)
            .unwrap();

        assert_eq!(moved.image, dest.join("a.jpg"));
        assert_eq!(moved.caption, Some(dest.join("a.txt")));
        assert!(dest.join("a.jpg").is_file());
        assert!(dest.join("a.txt").is_file());
        assert!(!dir.path().join("a.jpg").exists());
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(registry.records()[0].image_path, dest.join("a.jpg"));
    }

    #[test]
    fn relocate_handles_an_uncaptioned_image() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("picked");
        std::fs::create_dir(&dest).unwrap();
        touch(&dir.path().join("b.png"));

        let mut registry = CorpusRegistry::scan(dir.path()).unwrap();
        let moved = registry
            .relocate(&dir.path().join("b.png"), &dest)
            .unwrap();

        assert_eq!(moved.caption, None);
        assert!(dest.join("b.png").is_file());
    }

    #[test]
    fn relocate_rejects_paths_outside_the_corpus() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.jpg"));

        let mut registry = CorpusRegistry::scan(dir.path()).unwrap();
        let err = registry
            .relocate(Path::new("elsewhere/a.jpg"), dir.path())
            .unwrap_err();

        assert!(err.to_string().contains("not part of this corpus"));
    }

    #[test]
    fn relocate_restores_the_image_when_the_caption_cannot_move() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("picked");
        std::fs::create_dir(&dest).unwrap();
        // A directory squatting on the caption's destination name makes the
        // caption move fail after the image move succeeded.
        std::fs::create_dir(dest.join("a.txt")).unwrap();
        touch(&dir.path().join("a.jpg"));
        touch(&dir.path().join("a.txt"));

        let mut registry = CorpusRegistry::scan(dir.path()).unwrap();
        let result = registry.relocate(&dir.path().join("a.jpg"), &dest);

        assert!(result.is_err());
        assert!(dir.path().join("a.jpg").is_file());
        assert!(dir.path().join("a.txt").is_file());
        assert!(!dest.join("a.jpg").exists());
    }
}
