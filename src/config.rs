use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::playback::MAX_POLL_INTERVAL;

/// Names the config file when no path is given on the command line.
pub const CONFIG_ENV: &str = "HORNCLIP_CONFIG";

pub const MP3_BITRATES_KBPS: &[u32] = &[
    8, 16, 24, 32, 40, 48, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mp3Quality {
    #[default]
    Best,
    Good,
    Fast,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mp3Config {
    pub bitrate_kbps: u32,
    pub quality: Mp3Quality,
    /// Encode mono sources as two identical channels.
    pub force_stereo: bool,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self {
            bitrate_kbps: 128,
            quality: Mp3Quality::Best,
            force_stereo: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub width: usize,
    pub height: f32,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            width: 500,
            height: 200.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    pub poll_interval_ms: u64,
    pub volume: f32,
    pub mp3: Mp3Config,
    pub waveform: WaveformConfig,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: MAX_POLL_INTERVAL.as_millis() as u64,
            volume: 1.0,
            mp3: Mp3Config::default(),
            waveform: WaveformConfig::default(),
        }
    }
}

impl EditorConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let cfg: EditorConfig = toml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reads `path`; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(text) => Self::from_toml(&text),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "config not found, using defaults");
                Ok(Self::default())
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// `explicit`, else `$HORNCLIP_CONFIG`, else defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
        match path {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !MP3_BITRATES_KBPS.contains(&self.mp3.bitrate_kbps) {
            return Err(ConfigError::Bitrate(self.mp3.bitrate_kbps));
        }
        Ok(())
    }

    /// Clamped to 1..=100 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms).clamp(Duration::from_millis(1), MAX_POLL_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg = EditorConfig::from_toml("[mp3]\nbitrate_kbps = 192\n").unwrap();
        assert_eq!(cfg.mp3.bitrate_kbps, 192);
        assert_eq!(cfg.mp3.quality, Mp3Quality::Best);
        assert_eq!(cfg.waveform.width, 500);
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
    }

    #[test]
    fn odd_bitrate_is_rejected() {
        let err = EditorConfig::from_toml("[mp3]\nbitrate_kbps = 100\n").unwrap_err();
        assert!(matches!(err, ConfigError::Bitrate(100)));
    }

    #[test]
    fn poll_interval_is_clamped() {
        let cfg = EditorConfig::from_toml("poll_interval_ms = 500\n").unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(100));
        let cfg = EditorConfig::from_toml("poll_interval_ms = 0\n").unwrap();
        assert_eq!(cfg.poll_interval(), Duration::from_millis(1));
    }

    #[test]
    fn missing_file_means_defaults() {
        let cfg = EditorConfig::load(Path::new("/definitely/not/here/hornclip.toml")).unwrap();
        assert_eq!(cfg, EditorConfig::default());
    }
}
