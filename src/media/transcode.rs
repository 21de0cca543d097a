use anyhow::{bail, Context, Result};
use std::cell::RefCell;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// What to do to the media stream on the way to the output file.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterSpec {
    /// Re-encode the interval starting at `start` seconds, `duration`
    /// seconds long, into its own file.
    Clip { start: f64, duration: f64 },
    /// Crop to 16:9 around the center, then scale to the exact target size.
    CropScale { width: u32, height: u32 },
}

/// Runs one media conversion from `input` to `output`.
pub trait Transcoder {
    fn run(&self, input: &Path, spec: &FilterSpec, output: &Path) -> Result<()>;
}

/// Argument list handed to the ffmpeg binary for a given conversion.
pub fn ffmpeg_args(input: &Path, spec: &FilterSpec, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = vec!["-nostdin".into(), "-y".into()];
    match spec {
        FilterSpec::Clip { start, duration } => {
            args.extend([
                "-ss".into(),
                format!("{start:.3}"),
                "-i".into(),
                input.display().to_string(),
                "-t".into(),
                format!("{duration:.3}"),
                "-map".into(),
                "0".into(),
                "-c:v".into(),
                "libx264".into(),
                "-preset".into(),
                "veryfast".into(),
                "-crf".into(),
                "22".into(),
                "-c:a".into(),
                "aac".into(),
            ]);
        }
        FilterSpec::CropScale { width, height } => {
            args.extend([
                "-i".into(),
                input.display().to_string(),
                "-vf".into(),
                format!("crop=ih*16/9:ih,scale={width}:{height}"),
                "-c:a".into(),
                "copy".into(),
                "-strict".into(),
                "experimental".into(),
            ]);
        }
    }
    args.push(output.display().to_string());
    args
}

/// Shells out to the `ffmpeg` binary on PATH.
pub struct FfmpegCli;

impl Transcoder for FfmpegCli {
    fn run(&self, input: &Path, spec: &FilterSpec, output: &Path) -> Result<()> {
        let args = ffmpeg_args(input, spec, output);
        log::debug!("ffmpeg {}", args.join(" "));
        let result = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .context("Failed to run ffmpeg (is it installed and on PATH?)")?;
        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            bail!(
                "ffmpeg exited with {} for {}: {}",
                result.status,
                input.display(),
                stderr.trim()
            );
        }
        Ok(())
    }
}

/// Records every requested conversion and fakes the output file by copying
/// the input, so stages can be tested without ffmpeg.
#[derive(Default)]
pub struct RecordingTranscoder {
    jobs: RefCell<Vec<(PathBuf, FilterSpec, PathBuf)>>,
    fail_on: Option<String>,
}

impl RecordingTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails any conversion whose input file has the given name.
    pub fn failing_on(name: &str) -> Self {
        Self {
            jobs: RefCell::new(Vec::new()),
            fail_on: Some(name.to_string()),
        }
    }

    pub fn jobs(&self) -> Vec<(PathBuf, FilterSpec, PathBuf)> {
        self.jobs.borrow().clone()
    }
}

impl Transcoder for RecordingTranscoder {
    fn run(&self, input: &Path, spec: &FilterSpec, output: &Path) -> Result<()> {
        if let Some(fail) = &self.fail_on {
            if input.file_name() == Some(OsStr::new(fail)) {
                bail!("conversion refused for {}", input.display());
            }
        }
        self.jobs
            .borrow_mut()
            .push((input.to_path_buf(), spec.clone(), output.to_path_buf()));
        if input.is_file() {
            std::fs::copy(input, output)
                .with_context(|| format!("Failed to copy {}", input.display()))?;
        } else {
            std::fs::write(output, "")
                .with_context(|| format!("Failed to create {}", output.display()))?;
        }
        Ok(())
    }
}
