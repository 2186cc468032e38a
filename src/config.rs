use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

use crate::{
    encoder::OutputOptions,
    error::{ConfigError, Result},
};

/// Main configuration for the media compositor
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// External tool locations and process settings
    pub encoder: EncoderConfig,

    /// Upload, output and staging directories
    pub storage: StorageConfig,

    /// Remote resource fetching
    pub download: DownloadConfig,

    /// Output options used when a request does not override them
    pub output: OutputOptions,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.encoder.validate()?;
        self.download.validate()?;
        self.output.validate().map_err(|e| ConfigError::InvalidValue {
            key: "output".to_string(),
            value: e.to_string(),
        })?;
        Ok(())
    }
}

/// External process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Explicit ffmpeg executable; looked up on PATH when unset
    pub ffmpeg_path: Option<PathBuf>,

    /// Explicit ImageMagick executable; `magick` then `convert` when unset
    pub magick_path: Option<PathBuf>,

    /// Encoder thread count passed as `-threads` (0 lets ffmpeg decide)
    pub threads: usize,

    /// Kill the encoder after this many seconds; runs to completion when unset
    pub timeout_secs: Option<u64>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            magick_path: None,
            threads: num_cpus::get(),
            timeout_secs: None,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "encoder.timeout_secs".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

/// Directories the compositor reads from and writes to
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// User supplied source files
    pub upload_dir: PathBuf,

    /// Rendered results
    pub output_dir: PathBuf,

    /// Downloads and intermediate chain outputs
    pub staging_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            output_dir: PathBuf::from("outputs"),
            staging_dir: PathBuf::from("uploads/staging"),
        }
    }
}

/// Remote resource download settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,

    /// User-Agent header sent with downloads
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: format!("media-compositor/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl DownloadConfig {
    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "download.timeout_secs".to_string(),
                value: self.timeout_secs.to_string()
            }.into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.encoder.timeout_secs = Some(600);
        original_config.output.width = 1280;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(loaded_config.encoder.timeout_secs, Some(600));
        assert_eq!(loaded_config.output.width, 1280);
        assert_eq!(loaded_config.storage.output_dir, PathBuf::from("outputs"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("partial.toml");
        std::fs::write(&file_path, "[output]\nfps = 24.0\n").unwrap();

        let config = Config::from_file(&file_path).unwrap();
        assert_eq!(config.output.fps, 24.0);
        assert_eq!(config.output.width, OutputOptions::default().width);
        assert_eq!(config.download.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_download_timeout() {
        let mut config = Config::default();
        config.download.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = Config::from_file("/definitely/not/here.toml");
        assert!(matches!(
            result,
            Err(crate::error::ComposerError::Config(ConfigError::FileNotFound { .. }))
        ));
    }
}
