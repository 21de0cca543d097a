use std::path::Path;

pub mod captioner;
pub mod decode;
pub mod detect;
pub mod frames;
pub mod index;
pub mod transcode;

/// Still-image types the tool curates.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Everything the bucketing stage will feed through ffmpeg.
pub const MEDIA_EXTENSIONS: [&str; 9] = [
    "mp4", "avi", "mkv", "mov", "jpg", "jpeg", "png", "bmp", "gif",
];

/// Extension match, case-insensitive. Files without an extension never match.
pub fn has_extension_in(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

pub fn is_image_file(path: &Path) -> bool {
    has_extension_in(path, &IMAGE_EXTENSIONS)
}

pub fn is_media_file(path: &Path) -> bool {
    has_extension_in(path, &MEDIA_EXTENSIONS)
}
