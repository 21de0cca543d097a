use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::media::detect::{SceneDetector, SceneSpan};
use crate::media::frames::FrameGrabber;
use crate::media::transcode::{FilterSpec, Transcoder};

/// Saved stills keep this many frames away from a scene's first cut.
pub const FRAME_MARGIN: u64 = 1;
pub const CLIP_EXTENSION: &str = "mp4";
pub const FRAME_EXTENSION: &str = "jpg";

/// Counts from one extraction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SceneReport {
    pub scenes: usize,
    pub clips_written: usize,
    pub frames_written: usize,
}

/// Digits needed to number `count` items, at least `min` wide.
fn index_width(count: usize, min: usize) -> usize {
    count.to_string().len().max(min)
}

fn clip_file_name(base: &str, scene_number: usize, scene_width: usize) -> String {
    format!("{base}-Scene-{scene_number:0scene_width$}.{CLIP_EXTENSION}")
}

fn frame_file_name(
    base: &str,
    scene_number: usize,
    scene_width: usize,
    image_number: usize,
    image_width: usize,
) -> String {
    format!(
        "{base}-Scene-{scene_number:0scene_width$}-{image_number:0image_width$}.{FRAME_EXTENSION}"
    )
}

/// Which frames of a span to save as stills. The span is divided into
/// `count` runs of near-equal length; the pick is the first run's start
/// pushed in by `margin`, the last run's end pulled back by `margin`, and
/// the middle of every run in between. A single still comes from the
/// middle of the whole span. Spans shorter than `count` yield one still
/// per frame.
pub fn plan_frame_indices(span: &SceneSpan, count: usize, margin: u64) -> Vec<u64> {
    let len = span.frame_len();
    if len == 0 || count == 0 {
        return Vec::new();
    }
    if count == 1 {
        return vec![span.start_frame + len / 2];
    }
    let chunks = (count as u64).min(len);
    let base = len / chunks;
    let remainder = (len % chunks) as usize;
    let mut indices = Vec::with_capacity(chunks as usize);
    let mut cursor = span.start_frame;
    for chunk_index in 0..chunks as usize {
        let chunk_len = base + u64::from(chunk_index < remainder);
        let first = cursor;
        let last = cursor + chunk_len - 1;
        let pick = if chunk_index == 0 {
            (first + margin).min(last)
        } else if chunk_index == chunks as usize - 1 {
            last.saturating_sub(margin).max(first)
        } else {
            first + chunk_len / 2
        };
        indices.push(pick);
        cursor += chunk_len;
    }
    indices
}

/// Split one video into per-scene clips and per-scene stills. Clips land
/// in `clips_dir`, stills in `frames_dir`, both named after the source
/// video with 1-based scene numbers.
pub fn extract_scenes(
    video: &Path,
    clips_dir: &Path,
    frames_dir: &Path,
    frames_per_scene: usize,
    detector: &dyn SceneDetector,
    transcoder: &dyn Transcoder,
    grabber: &dyn FrameGrabber,
) -> Result<SceneReport> {
    let base = video
        .file_stem()
        .and_then(|stem| stem.to_str())
        .with_context(|| format!("{} has no usable file name", video.display()))?;

    // Detection finishes before any output file is written.
    let spans = detector.detect(video)?;

    let scene_width = index_width(spans.len(), 3);
    let image_width = index_width(frames_per_scene, 2);
    let mut plan = BTreeMap::new();
    let mut clips_written = 0;
    for (scene_index, span) in spans.iter().enumerate() {
        let scene_number = scene_index + 1;
        let clip = clips_dir.join(clip_file_name(base, scene_number, scene_width));
        transcoder
            .run(
                video,
                &FilterSpec::Clip {
                    start: span.start_time,
                    duration: span.duration(),
                },
                &clip,
            )
            .with_context(|| format!("Failed to write scene clip {}", clip.display()))?;
        clips_written += 1;

        for (image_index, frame) in plan_frame_indices(span, frames_per_scene, FRAME_MARGIN)
            .into_iter()
            .enumerate()
        {
            let name = frame_file_name(base, scene_number, scene_width, image_index + 1, image_width);
            plan.insert(frame, frames_dir.join(name));
        }
    }

    let frames_written = grabber.grab(video, &plan)?;
    log::debug!(
        "extracted {} scenes from {}: {} clips, {} stills",
        spans.len(),
        video.display(),
        clips_written,
        frames_written
    );
    Ok(SceneReport {
        scenes: spans.len(),
        clips_written,
        frames_written,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(start_frame: u64, end_frame: u64) -> SceneSpan {
        SceneSpan {
            start_frame,
            end_frame,
            start_time: 0.0,
            end_time: 0.0,
        }
    }

    #[test]
    fn picks_spread_across_the_span_with_margins() {
        assert_eq!(plan_frame_indices(&span(0, 100), 3, 1), vec![1, 50, 98]);
    }

    #[test]
    fn a_single_still_comes_from_the_middle() {
        assert_eq!(plan_frame_indices(&span(0, 100), 1, 1), vec![50]);
        assert_eq!(plan_frame_indices(&span(40, 41), 1, 1), vec![40]);
    }

    #[test]
    fn short_spans_yield_one_still_per_frame() {
        assert_eq!(plan_frame_indices(&span(10, 12), 3, 1), vec![10, 11]);
        assert_eq!(plan_frame_indices(&span(7, 8), 5, 1), vec![7]);
    }

    #[test]
    fn empty_spans_and_zero_counts_yield_nothing() {
        assert!(plan_frame_indices(&span(5, 5), 3, 1).is_empty());
        assert!(plan_frame_indices(&span(0, 100), 0, 1).is_empty());
    }

    #[test]
    fn picks_are_strictly_increasing() {
        let picks = plan_frame_indices(&span(3, 47), 6, 1);
        assert!(picks.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn file_names_zero_pad_scene_and_still_numbers() {
        assert_eq!(clip_file_name("shoot", 1, 3), "shoot-Scene-001.mp4");
        assert_eq!(
            frame_file_name("shoot", 12, 3, 2, 2),
            "shoot-Scene-012-02.jpg"
        );
    }

    #[test]
    fn numbering_widens_past_the_minimum_when_needed() {
        assert_eq!(index_width(1500, 3), 4);
        assert_eq!(index_width(7, 3), 3);
        assert_eq!(index_width(120, 2), 3);
    }
}
