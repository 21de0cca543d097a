use anyhow::{Context, Result};
use image::RgbImage;
use serde::Serialize;
use std::path::Path;

use super::decode::FrameStream;

/// Default content-change threshold, on the 0-255 mean pixel delta scale.
pub const DEFAULT_THRESHOLD: f32 = 27.0;
/// A new cut must be at least this many frames after the previous one.
pub const DEFAULT_MIN_SCENE_LEN: u64 = 15;
/// Frames are downscaled to at most this width before scoring.
const ANALYSIS_WIDTH: u32 = 256;

/// One detected scene: the frame range [start_frame, end_frame) and the
/// matching time range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneSpan {
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: f64,
    pub end_time: f64,
}

impl SceneSpan {
    pub fn frame_len(&self) -> u64 {
        self.end_frame - self.start_frame
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Boundary detection over a source video.
pub trait SceneDetector {
    /// Ordered scene intervals covering the whole video. A decodable,
    /// non-empty video yields at least one interval.
    fn detect(&self, video: &Path) -> Result<Vec<SceneSpan>>;
}

/// Streaming cut finder: feed frames in order, then convert the cut list
/// into spans. Kept free of any decoding so threshold behavior can be
/// exercised with synthetic frames.
#[derive(Debug)]
pub struct CutTracker {
    threshold: f32,
    min_scene_len: u64,
    prev: Option<RgbImage>,
    next_index: u64,
    last_cut: u64,
    cuts: Vec<u64>,
}

impl CutTracker {
    pub fn new(threshold: f32, min_scene_len: u64) -> Self {
        Self {
            threshold,
            min_scene_len,
            prev: None,
            next_index: 0,
            last_cut: 0,
            cuts: Vec::new(),
        }
    }

    /// Score the next frame against its predecessor and record a cut when
    /// the change clears the threshold and the current scene is long enough.
    pub fn push(&mut self, frame: RgbImage) {
        let index = self.next_index;
        self.next_index += 1;
        if let Some(prev) = &self.prev {
            let score = frame_change_score(prev, &frame);
            if score >= self.threshold && index - self.last_cut >= self.min_scene_len {
                self.cuts.push(index);
                self.last_cut = index;
            }
        }
        self.prev = Some(frame);
    }

    pub fn frames_seen(&self) -> u64 {
        self.next_index
    }

    /// Contiguous spans covering every frame seen, split at the cuts.
    pub fn into_spans(self, fps: f64) -> Vec<SceneSpan> {
        let total = self.next_index;
        if total == 0 {
            return Vec::new();
        }
        let mut bounds = Vec::with_capacity(self.cuts.len() + 2);
        bounds.push(0);
        bounds.extend(&self.cuts);
        bounds.push(total);
        bounds
            .windows(2)
            .map(|pair| SceneSpan {
                start_frame: pair[0],
                end_frame: pair[1],
                start_time: pair[0] as f64 / fps,
                end_time: pair[1] as f64 / fps,
            })
            .collect()
    }
}

/// Mean absolute per-channel pixel difference, 0-255. Frames of unequal
/// dimensions count as a full change.
pub fn frame_change_score(a: &RgbImage, b: &RgbImage) -> f32 {
    if a.dimensions() != b.dimensions() {
        return 255.0;
    }
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw().iter())
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum();
    total as f32 / a.as_raw().len() as f32
}

/// Finds cuts by thresholding the content change between consecutive
/// decoded frames. Higher threshold means fewer, larger scenes.
pub struct ContentDetector {
    pub threshold: f32,
    pub min_scene_len: u64,
}

impl ContentDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            ..Self::default()
        }
    }
}

impl Default for ContentDetector {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_scene_len: DEFAULT_MIN_SCENE_LEN,
        }
    }
}

impl SceneDetector for ContentDetector {
    fn detect(&self, video: &Path) -> Result<Vec<SceneSpan>> {
        let mut stream = FrameStream::open_scaled(video, ANALYSIS_WIDTH)
            .context("Failed to open video for scene detection")?;
        let mut tracker = CutTracker::new(self.threshold, self.min_scene_len);
        while let Some((_, frame)) = stream.next_frame()? {
            tracker.push(frame);
        }
        if tracker.frames_seen() == 0 {
            anyhow::bail!("No video frames could be decoded from {}", video.display());
        }
        let spans = tracker.into_spans(stream.fps());
        log::debug!("detected {} scenes in {}", spans.len(), video.display());
        Ok(spans)
    }
}

/// Returns a preset span list; lets stage tests run without video input.
pub struct FixedSpanDetector {
    spans: Vec<SceneSpan>,
}

impl FixedSpanDetector {
    pub fn new(spans: Vec<SceneSpan>) -> Self {
        Self { spans }
    }
}

impl SceneDetector for FixedSpanDetector {
    fn detect(&self, _video: &Path) -> Result<Vec<SceneSpan>> {
        Ok(self.spans.clone())
    }
}
