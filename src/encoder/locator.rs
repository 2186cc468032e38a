use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::EncoderConfig;
use crate::encoder::runner::EncoderRunner;
use crate::error::{EncoderError, Result};

/// ImageMagick 7 name first, then the legacy IM6 entry point
const MAGICK_CANDIDATES: &[&str] = &["magick", "convert"];

/// Resolved locations of the external tools
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderPaths {
    pub ffmpeg: PathBuf,
    pub magick: Option<PathBuf>,
}

impl EncoderPaths {
    pub fn new<P: Into<PathBuf>>(ffmpeg: P) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            magick: None,
        }
    }

    pub fn with_magick<P: Into<PathBuf>>(mut self, magick: P) -> Self {
        self.magick = Some(magick.into());
        self
    }

    /// ImageMagick path, or `NotInstalled` when none was found
    pub fn require_magick(&self) -> Result<&Path> {
        self.magick.as_deref().ok_or_else(|| {
            EncoderError::NotInstalled {
                tool: "ImageMagick".to_string(),
            }
            .into()
        })
    }
}

/// Finds ffmpeg and ImageMagick
#[derive(Debug, Clone, Default)]
pub struct EncoderLocator {
    ffmpeg_override: Option<PathBuf>,
    magick_override: Option<PathBuf>,
}

impl EncoderLocator {
    /// Use explicit paths; `None` falls back to a PATH lookup
    pub fn new(ffmpeg: Option<PathBuf>, magick: Option<PathBuf>) -> Self {
        Self {
            ffmpeg_override: ffmpeg,
            magick_override: magick,
        }
    }

    pub fn from_config(config: &EncoderConfig) -> Self {
        Self::new(config.ffmpeg_path.clone(), config.magick_path.clone())
    }

    /// Resolve both tools; only ffmpeg is required
    pub fn locate(&self) -> Result<EncoderPaths> {
        let ffmpeg = match &self.ffmpeg_override {
            Some(path) => resolve_explicit(path, "ffmpeg")?,
            None => which::which("ffmpeg").map_err(|_| EncoderError::NotInstalled {
                tool: "ffmpeg".to_string(),
            })?,
        };
        debug!("Using ffmpeg at {}", ffmpeg.display());

        let magick = match &self.magick_override {
            Some(path) => Some(resolve_explicit(path, "ImageMagick")?),
            None => MAGICK_CANDIDATES.iter().find_map(|name| which::which(name).ok()),
        };
        match &magick {
            Some(path) => debug!("Using ImageMagick at {}", path.display()),
            None => debug!("ImageMagick not found, image operations are unavailable"),
        }

        Ok(EncoderPaths { ffmpeg, magick })
    }

    /// Locate the tools and make sure each one starts
    pub async fn verify(&self) -> Result<EncoderPaths> {
        let paths = self.locate()?;
        let runner = EncoderRunner::new();

        let output = runner.run_args(&paths.ffmpeg, vec!["-version".to_string()]).await;
        output.map_err(|e| EncoderError::NotInstalled {
            tool: format!("ffmpeg ({})", e),
        })?;
        info!("ffmpeg is available at {}", paths.ffmpeg.display());

        if let Some(magick) = &paths.magick {
            runner.run_args(magick, vec!["-version".to_string()]).await?;
            info!("ImageMagick is available at {}", magick.display());
        }

        Ok(paths)
    }
}

/// Configured paths may be absolute or a bare name to look up
fn resolve_explicit(path: &Path, tool: &str) -> Result<PathBuf> {
    if path.components().count() > 1 || path.is_absolute() {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(EncoderError::NotInstalled {
            tool: format!("{} ({})", tool, path.display()),
        }
        .into());
    }

    which::which(path).map_err(|_| {
        EncoderError::NotInstalled {
            tool: format!("{} ({})", tool, path.display()),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ComposerError;

    #[test]
    fn test_explicit_path_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let magick = dir.path().join("magick");
        std::fs::write(&ffmpeg, b"").unwrap();
        std::fs::write(&magick, b"").unwrap();

        let paths = EncoderLocator::new(Some(ffmpeg.clone()), Some(magick.clone()))
            .locate()
            .unwrap();
        assert_eq!(paths, EncoderPaths::new(ffmpeg).with_magick(magick));
    }

    #[test]
    fn test_missing_explicit_path_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let locator = EncoderLocator::new(Some(dir.path().join("missing/ffmpeg")), None);
        assert!(matches!(
            locator.locate(),
            Err(ComposerError::Encoder(EncoderError::NotInstalled { .. }))
        ));
    }

    #[test]
    fn test_locate_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        std::fs::write(&ffmpeg, b"").unwrap();

        let locator = EncoderLocator::new(Some(ffmpeg), None);
        let first = locator.locate().unwrap();
        let second = locator.locate().unwrap();
        assert_eq!(first.ffmpeg, second.ffmpeg);
    }

    #[test]
    fn test_require_magick() {
        let paths = EncoderPaths::new("ffmpeg");
        assert!(matches!(
            paths.require_magick(),
            Err(ComposerError::Encoder(EncoderError::NotInstalled { .. }))
        ));
        assert_eq!(
            paths.with_magick("/usr/bin/magick").require_magick().unwrap(),
            Path::new("/usr/bin/magick")
        );
    }
}
