use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Config;
use crate::toolchain::Toolchain;

const TEMP_DIR: &str = "temp";

/// Shared per-process state. Each request gets its own scratch directory
/// under `temp_dir`; nothing here is mutated after startup.
#[derive(Clone)]
pub struct AppState {
    pub client: reqwest::Client,
    pub toolchain: Toolchain,
    temp_dir: PathBuf,
}

impl AppState {
    pub async fn new(config: &Config) -> anyhow::Result<Self> {
        let temp_dir = Path::new(&config.workspace).join(TEMP_DIR);
        tokio::fs::create_dir_all(&temp_dir).await?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.download_timeout_secs))
            .build()?;

        let toolchain = Toolchain {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
            preset: config.preset.clone(),
            audio_bitrate: config.audio_bitrate.clone(),
        };

        Ok(Self {
            client,
            toolchain,
            temp_dir,
        })
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.as_path()
    }
}
