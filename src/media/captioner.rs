use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

/// Bridge executable spoken to over stdin/stdout, one image path in per
/// line, one caption out per line.
pub const DEFAULT_CAPTION_COMMAND: &str = "blip2-caption";
/// Upper bound on generated caption length, in model tokens.
pub const MAX_NEW_TOKENS: u32 = 20;

/// Where the caption model runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Accel {
    Cuda,
    Cpu,
}

impl Accel {
    /// Probes for a visible CUDA device once; falls back to CPU.
    pub fn detect() -> Self {
        let probe = Command::new("nvidia-smi")
            .arg("-L")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match probe {
            Ok(status) if status.success() => Accel::Cuda,
            _ => {
                log::debug!("no CUDA device visible, captioning on CPU");
                Accel::Cpu
            }
        }
    }

    pub fn as_flag(&self) -> &'static str {
        match self {
            Accel::Cuda => "cuda",
            Accel::Cpu => "cpu",
        }
    }
}

/// Produces one caption per image.
pub trait Captioner {
    fn caption(&mut self, image: &RgbImage) -> Result<String>;
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

/// Speaks to a long-lived caption process so the model is loaded once and
/// reused for every image of a run. The process is started on the first
/// caption request and stopped when this value is dropped.
pub struct CommandCaptioner {
    program: String,
    device: Accel,
    max_new_tokens: u32,
    scratch: TempDir,
    bridge: Option<Bridge>,
}

impl CommandCaptioner {
    pub fn new(program: &str) -> Result<Self> {
        let scratch =
            tempfile::tempdir().context("Failed to create scratch folder for captioning")?;
        Ok(Self {
            program: program.to_string(),
            device: Accel::detect(),
            max_new_tokens: MAX_NEW_TOKENS,
            scratch,
            bridge: None,
        })
    }

    fn spawn_bridge(&self) -> Result<Bridge> {
        let mut child = Command::new(&self.program)
            .args([
                "--device",
                self.device.as_flag(),
                "--max-new-tokens",
                &self.max_new_tokens.to_string(),
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .with_context(|| {
                format!(
                    "Failed to start caption process '{}' (is it on PATH?)",
                    self.program
                )
            })?;
        let stdin = child.stdin.take().context("caption process has no stdin")?;
        let stdout = child
            .stdout
            .take()
            .map(BufReader::new)
            .context("caption process has no stdout")?;
        log::debug!("caption process '{}' started on {}", self.program, self.device.as_flag());
        Ok(Bridge {
            child,
            stdin,
            stdout,
        })
    }

    fn bridge(&mut self) -> Result<&mut Bridge> {
        if self.bridge.is_none() {
            self.bridge = Some(self.spawn_bridge()?);
        }
        self.bridge
            .as_mut()
            .context("caption process is not running")
    }
}

impl Captioner for CommandCaptioner {
    fn caption(&mut self, image: &RgbImage) -> Result<String> {
        let path = self.scratch.path().join("caption-input.png");
        image
            .save(&path)
            .context("Failed to stage image for captioning")?;
        let bridge = self.bridge()?;
        writeln!(bridge.stdin, "{}", path.display())
            .context("Failed to send image to the caption process")?;
        bridge
            .stdin
            .flush()
            .context("Failed to send image to the caption process")?;
        let mut line = String::new();
        let read = bridge
            .stdout
            .read_line(&mut line)
            .context("Failed to read from the caption process")?;
        if read == 0 {
            bail!("caption process closed its output stream");
        }
        Ok(line.trim().to_string())
    }
}

impl Drop for CommandCaptioner {
    fn drop(&mut self) {
        if let Some(bridge) = &mut self.bridge {
            bridge.child.kill().ok();
            bridge.child.wait().ok();
        }
    }
}

/// Answers every request with the same text; counts how often it was asked.
pub struct FixedCaptioner {
    text: String,
    pub calls: usize,
}

impl FixedCaptioner {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            calls: 0,
        }
    }
}

impl Captioner for FixedCaptioner {
    fn caption(&mut self, _image: &RgbImage) -> Result<String> {
        self.calls += 1;
        Ok(self.text.clone())
    }
}
