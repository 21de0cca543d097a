use anyhow::Result;

fn main() -> Result<()> {
    env_logger::init();
    vidcurate::media::decode::init_ffmpeg()?;
    vidcurate::menu::run()
}
