use anyhow::{Context, Result};
use regex::Regex;
use std::fmt;
use std::path::{Path, PathBuf};

pub mod amend;
pub mod bucket;
pub mod caption;
pub mod cluster;
pub mod corpus;
pub mod dedup;
pub mod layout;
pub mod scene;

/// Caption sidecars share the image's name with this extension.
pub const CAPTION_EXTENSION: &str = "txt";

/// The caption file paired with an image.
pub fn sidecar_path(image: &Path) -> PathBuf {
    image.with_extension(CAPTION_EXTENSION)
}

/// Move a file, falling back to copy-and-delete when rename fails across
/// filesystems.
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)
        .with_context(|| format!("Failed to move {} to {}", from.display(), to.display()))?;
    std::fs::remove_file(from)
        .with_context(|| format!("Failed to remove {} after copying", from.display()))?;
    Ok(())
}

/// A target frame size, written as WIDTHxHEIGHT.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn parse(text: &str) -> Result<Self> {
        let pattern = Regex::new(r"^(\d{1,5})x(\d{1,5})$").context("Invalid resolution pattern")?;
        let captures = pattern
            .captures(text.trim())
            .with_context(|| format!("'{text}' is not a WIDTHxHEIGHT resolution"))?;
        let parsed = Self {
            width: captures[1].parse().context("Invalid resolution width")?,
            height: captures[2].parse().context("Invalid resolution height")?,
        };
        if parsed.width == 0 || parsed.height == 0 {
            anyhow::bail!("Resolution dimensions must be non-zero");
        }
        Ok(parsed)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolution_parses_the_preset_form() {
        let res = Resolution::parse("1024x576").unwrap();
        assert_eq!(res.width, 1024);
        assert_eq!(res.height, 576);
        assert_eq!(res.to_string(), "1024x576");
    }

    #[test]
    fn resolution_rejects_malformed_text() {
        assert!(Resolution::parse("1024").is_err());
        assert!(Resolution::parse("1024x").is_err());
        assert!(Resolution::parse("wide x tall").is_err());
        assert!(Resolution::parse("0x576").is_err());
    }

    #[test]
    fn sidecar_swaps_only_the_extension() {
        assert_eq!(
            sidecar_path(Path::new("frames/shot-01.jpg")),
            PathBuf::from("frames/shot-01.txt")
        );
    }

    #[test]
    fn move_file_replaces_the_source() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("a.txt");
        let to = dir.path().join("sub").join("a.txt");
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(&from, "payload").unwrap();

        move_file(&from, &to).unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read_to_string(&to).unwrap(), "payload");
    }
}
