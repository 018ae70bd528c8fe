use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

/// Plays an audio asset to completion on the calling thread.
///
/// Called from notifier threads; several calls may overlap.
pub trait SoundPlayer: Send + Sync {
    fn name(&self) -> &'static str;

    fn play(&self, asset: &Path) -> Result<()>;
}

/// Terminal bell fallback for builds without an audio backend.
///
/// The asset is still opened so unreadable files are reported the same way a
/// real decoder would report them.
#[derive(Clone, Copy, Debug, Default)]
pub struct BellPlayer;

impl SoundPlayer for BellPlayer {
    fn name(&self) -> &'static str {
        "bell"
    }

    fn play(&self, asset: &Path) -> Result<()> {
        std::fs::File::open(asset)
            .with_context(|| format!("cannot open {}", asset.display()))?;
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07").context("write terminal bell")?;
        stderr.flush().context("flush terminal bell")?;
        Ok(())
    }
}

/// Decodes and plays the asset through the default output device.
#[cfg(feature = "audio-rodio")]
#[derive(Clone, Copy, Debug, Default)]
pub struct RodioPlayer;

#[cfg(feature = "audio-rodio")]
impl SoundPlayer for RodioPlayer {
    fn name(&self) -> &'static str {
        "rodio"
    }

    fn play(&self, asset: &Path) -> Result<()> {
        let file = std::fs::File::open(asset)
            .with_context(|| format!("cannot open {}", asset.display()))?;
        let (_stream, handle) =
            rodio::OutputStream::try_default().context("no audio output device")?;
        let sink = rodio::Sink::try_new(&handle).context("create audio sink")?;
        let source = rodio::Decoder::new(std::io::BufReader::new(file))
            .with_context(|| format!("cannot decode {}", asset.display()))?;
        sink.append(source);
        sink.sleep_until_end();
        Ok(())
    }
}

/// The best player compiled into this build.
pub fn default_player() -> Arc<dyn SoundPlayer> {
    #[cfg(feature = "audio-rodio")]
    {
        Arc::new(RodioPlayer)
    }
    #[cfg(not(feature = "audio-rodio"))]
    {
        Arc::new(BellPlayer)
    }
}
