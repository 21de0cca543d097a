use anyhow::{Context, Result};
use ffmpeg_next as ffmpeg;
use image::RgbImage;
use std::path::Path;

/// Initialize FFmpeg (must be called once at startup)
pub fn init_ffmpeg() -> Result<()> {
    ffmpeg::init().context("Failed to initialize FFmpeg")?;

    Ok(())
}

/// Sequential RGB24 frame reader over a video's best video stream.
///
/// Frames come out in presentation order, numbered from zero. Corrupt
/// packets are tolerated (the decoder simply yields fewer frames); failing
/// to open the file or set up the decoder is an error.
pub struct FrameStream {
    input: ffmpeg::format::context::Input,
    decoder: ffmpeg::decoder::Video,
    scaler: ffmpeg::software::scaling::context::Context,
    stream_index: usize,
    fps: f64,
    next_index: u64,
    eof_sent: bool,
}

impl FrameStream {
    /// Open at the source resolution.
    pub fn open<P: AsRef<Path>>(video_path: P) -> Result<Self> {
        Self::with_max_width(video_path, None)
    }

    /// Open with frames downscaled so their width does not exceed `max_width`.
    pub fn open_scaled<P: AsRef<Path>>(video_path: P, max_width: u32) -> Result<Self> {
        Self::with_max_width(video_path, Some(max_width))
    }

    fn with_max_width<P: AsRef<Path>>(video_path: P, max_width: Option<u32>) -> Result<Self> {
        let input = ffmpeg::format::input(&video_path).context("Failed to open video file")?;

        let stream = input
            .streams()
            .best(ffmpeg::media::Type::Video)
            .context("Could not find video stream")?;
        let stream_index = stream.index();

        let rate = stream.avg_frame_rate();
        let rate = if rate.numerator() > 0 { rate } else { stream.rate() };
        if rate.numerator() <= 0 {
            anyhow::bail!("Could not determine the video frame rate");
        }
        let fps = f64::from(rate);

        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("Failed to create codec context")?
            .decoder()
            .video()
            .context("Failed to create video decoder")?;

        let (out_width, out_height) = scaled_dimensions(decoder.width(), decoder.height(), max_width);

        let scaler = ffmpeg::software::scaling::context::Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            ffmpeg::format::Pixel::RGB24,
            out_width,
            out_height,
            ffmpeg::software::scaling::flag::Flags::BILINEAR,
        )
        .context("Failed to create scaler")?;

        Ok(Self {
            input,
            decoder,
            scaler,
            stream_index,
            fps,
            next_index: 0,
            eof_sent: false,
        })
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    /// Decode the next video frame as (frame index, RGB8 image).
    pub fn next_frame(&mut self) -> Result<Option<(u64, RgbImage)>> {
        let mut decoded = ffmpeg::util::frame::video::Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb = ffmpeg::util::frame::video::Video::empty();
                self.scaler
                    .run(&decoded, &mut rgb)
                    .context("Failed to scale frame")?;
                let image = rgb_image_from_frame(&rgb)?;
                let index = self.next_index;
                self.next_index += 1;
                return Ok(Some((index, image)));
            }
            if self.eof_sent {
                return Ok(None);
            }
            let next = self.input.packets().next().map(|(s, p)| (s.index(), p));
            match next {
                Some((index, packet)) if index == self.stream_index => {
                    self.decoder.send_packet(&packet).ok();
                }
                Some(_) => {}
                None => {
                    self.decoder.send_eof().ok();
                    self.eof_sent = true;
                }
            }
        }
    }
}

fn scaled_dimensions(width: u32, height: u32, max_width: Option<u32>) -> (u32, u32) {
    match max_width {
        Some(max) if width > max => {
            let scaled = (height as u64 * max as u64 / width as u64) as u32;
            // swscale wants even output dimensions
            (max, scaled.max(2) & !1)
        }
        _ => (width, height),
    }
}

/// Copy a decoded RGB24 frame into an image buffer, honoring the row stride.
fn rgb_image_from_frame(frame: &ffmpeg::util::frame::video::Video) -> Result<RgbImage> {
    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut pixels = Vec::with_capacity(width * height * 3);
    for row in data.chunks(stride).take(height) {
        pixels.extend_from_slice(&row[..width * 3]);
    }

    RgbImage::from_raw(frame.width(), frame.height(), pixels)
        .context("Failed to create image buffer from frame")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_dimensions_caps_width_and_keeps_aspect() {
        assert_eq!(scaled_dimensions(1920, 1080, Some(256)), (256, 144));
        assert_eq!(scaled_dimensions(160, 90, Some(256)), (160, 90));
        assert_eq!(scaled_dimensions(1920, 1080, None), (1920, 1080));
    }

    #[test]
    fn scaled_dimensions_rounds_to_even() {
        let (_, height) = scaled_dimensions(1000, 333, Some(256));
        assert_eq!(height % 2, 0);
    }
}
