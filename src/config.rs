use anyhow::Result;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure that can be loaded from CLI args or a file
///
/// Example configuration file content
/// # Video Compositor Configuration
///
/// # Server configuration
/// listen_on_port = 8080
/// workspace = "./data"
///
/// # Toolchain configuration
/// ffmpeg = "ffmpeg"
/// ffprobe = "ffprobe"
/// preset = "fast"
/// audio_bitrate = "192k"
///
/// # Input download timeout in seconds
/// download_timeout_secs = 60
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(version, about, long_about = None)]
#[serde(default)]
pub struct Config {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    #[serde(default = "default_port")]
    pub listen_on_port: u16,

    /// Working directory for request-scoped files
    #[arg(short = 'w', long, default_value = ".")]
    #[serde(default = "default_workspace")]
    pub workspace: String,

    /// Configuration file path (CLI arguments take precedence)
    #[arg(short, long)]
    #[serde(skip)]
    pub config: Option<String>,

    /// ffmpeg binary to invoke
    #[arg(long, default_value = "ffmpeg")]
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg: String,

    /// ffprobe binary to invoke
    #[arg(long, default_value = "ffprobe")]
    #[serde(default = "default_ffprobe")]
    pub ffprobe: String,

    /// x264 encoder preset used for merge output
    #[arg(long, default_value = "fast")]
    #[serde(default = "default_preset")]
    pub preset: String,

    /// AAC bitrate for merge output, e.g. "192k"
    #[arg(long, default_value = "192k")]
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Timeout for downloading each input URL, in seconds
    #[arg(long, default_value_t = 60)]
    #[serde(default = "default_download_timeout")]
    pub download_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_on_port: default_port(),
            workspace: default_workspace(),
            config: None,
            ffmpeg: default_ffmpeg(),
            ffprobe: default_ffprobe(),
            preset: default_preset(),
            audio_bitrate: default_audio_bitrate(),
            download_timeout_secs: default_download_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from CLI args, optionally merging with a config file
    pub fn load() -> Result<Self> {
        let mut config = Config::parse();

        if let Some(config_path) = &config.config {
            let file_config = Self::from_file(Path::new(config_path))?;
            config = config.merge_with_file(file_config);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merge with file config, CLI args take precedence
    fn merge_with_file(mut self, file_config: Config) -> Self {
        // If the CLI value is still the default, take the file's value
        if self.listen_on_port == default_port() {
            self.listen_on_port = file_config.listen_on_port;
        }
        if self.workspace == default_workspace() {
            self.workspace = file_config.workspace;
        }
        if self.ffmpeg == default_ffmpeg() {
            self.ffmpeg = file_config.ffmpeg;
        }
        if self.ffprobe == default_ffprobe() {
            self.ffprobe = file_config.ffprobe;
        }
        if self.preset == default_preset() {
            self.preset = file_config.preset;
        }
        if self.audio_bitrate == default_audio_bitrate() {
            self.audio_bitrate = file_config.audio_bitrate;
        }
        if self.download_timeout_secs == default_download_timeout() {
            self.download_timeout_secs = file_config.download_timeout_secs;
        }

        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ffmpeg.is_empty() || self.ffprobe.is_empty() {
            return Err(anyhow::anyhow!("Toolchain binary paths cannot be empty"));
        }

        if self.preset.is_empty() {
            return Err(anyhow::anyhow!("Encoder preset cannot be empty"));
        }

        if self.audio_bitrate.is_empty() {
            return Err(anyhow::anyhow!("Audio bitrate cannot be empty"));
        }

        if self.download_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Download timeout must be at least 1 second"));
        }

        Ok(())
    }
}

// Default value functions
fn default_port() -> u16 {
    8080
}

fn default_workspace() -> String {
    ".".to_string()
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_ffprobe() -> String {
    "ffprobe".to_string()
}

fn default_preset() -> String {
    "fast".to_string()
}

fn default_audio_bitrate() -> String {
    "192k".to_string()
}

fn default_download_timeout() -> u64 {
    60
}
