use serde::{Deserialize, Serialize};

use crate::error::{CompositionError, Result};

/// Codecs tuned by a quality target (`-crf`) instead of a fixed bitrate
const RATE_DISTORTION_CODECS: &[&str] = &["libx264", "libx265", "libvpx-vp9", "libaom-av1", "libsvtav1"];

/// Codecs that understand the x264-style `-preset` names
const PRESET_CODECS: &[&str] = &["libx264", "libx265"];

/// Highest CRF value the x264 family accepts
pub const MAX_CRF: u8 = 51;

/// Output canvas and encoding settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputOptions {
    /// Canvas width in pixels
    pub width: u32,

    /// Canvas height in pixels
    pub height: u32,

    /// Output frame rate
    pub fps: f64,

    /// Color used for bars, padding and rotated corners
    pub background_color: String,

    pub video_codec: String,

    /// Speed/quality preset for codecs that support it
    pub preset: String,

    /// Constant rate factor (0-51); bitrate is used when unset
    pub crf: Option<u8>,

    pub video_bitrate: String,

    pub audio_codec: String,

    pub audio_bitrate: String,

    pub audio_sample_rate: u32,

    pub audio_channels: u8,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: 25.0,
            background_color: "black".to_string(),
            video_codec: "libx264".to_string(),
            preset: "medium".to_string(),
            crf: Some(23),
            video_bitrate: "2M".to_string(),
            audio_codec: "aac".to_string(),
            audio_bitrate: "128k".to_string(),
            audio_sample_rate: 44100,
            audio_channels: 2,
        }
    }
}

impl OutputOptions {
    /// Check the invariants the filter graph and encoder rely on
    pub fn validate(&self) -> Result<()> {
        let invalid = |details: String| -> Result<()> {
            Err(CompositionError::InvalidOutputOptions { details }.into())
        };

        if self.width == 0 || self.height == 0 {
            return invalid(format!("width and height must be positive, got {}x{}", self.width, self.height));
        }
        if !self.fps.is_finite() || self.fps <= 0.0 {
            return invalid(format!("fps must be a positive number, got {}", self.fps));
        }
        if let Some(crf) = self.crf {
            if crf > MAX_CRF {
                return invalid(format!("crf must be within 0-{}, got {}", MAX_CRF, crf));
            }
        }
        if self.video_codec.trim().is_empty() {
            return invalid("video codec must not be empty".to_string());
        }
        if self.background_color.trim().is_empty() {
            return invalid("background color must not be empty".to_string());
        }
        if self.audio_sample_rate == 0 || self.audio_channels == 0 {
            return invalid(format!(
                "audio sample rate and channels must be positive, got {} Hz / {} ch",
                self.audio_sample_rate, self.audio_channels
            ));
        }
        Ok(())
    }

    /// Whether the video codec is tuned by CRF rather than bitrate
    pub fn is_rate_distortion_codec(&self) -> bool {
        RATE_DISTORTION_CODECS.contains(&self.video_codec.as_str())
    }

    /// Whether `-preset` should be passed for the video codec
    pub fn supports_preset(&self) -> bool {
        PRESET_CODECS.contains(&self.video_codec.as_str())
    }

    /// Copy of these options with every set override applied
    pub fn with_overrides(&self, overrides: &OutputOverrides) -> Self {
        let mut options = self.clone();
        if let Some(v) = overrides.width {
            options.width = v;
        }
        if let Some(v) = overrides.height {
            options.height = v;
        }
        if let Some(v) = overrides.fps {
            options.fps = v;
        }
        if let Some(v) = &overrides.background_color {
            options.background_color = v.clone();
        }
        if let Some(v) = &overrides.video_codec {
            options.video_codec = v.clone();
        }
        if let Some(v) = &overrides.preset {
            options.preset = v.clone();
        }
        if let Some(v) = overrides.crf {
            options.crf = Some(v);
        }
        if let Some(v) = &overrides.video_bitrate {
            options.video_bitrate = v.clone();
            // an explicit bitrate without an explicit crf means "use the bitrate"
            if overrides.crf.is_none() {
                options.crf = None;
            }
        }
        if let Some(v) = &overrides.audio_codec {
            options.audio_codec = v.clone();
        }
        if let Some(v) = &overrides.audio_bitrate {
            options.audio_bitrate = v.clone();
        }
        if let Some(v) = overrides.audio_sample_rate {
            options.audio_sample_rate = v;
        }
        if let Some(v) = overrides.audio_channels {
            options.audio_channels = v;
        }
        options
    }
}

/// Per-request output settings; unset fields keep the configured defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OutputOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    pub background_color: Option<String>,
    pub video_codec: Option<String>,
    pub preset: Option<String>,
    pub crf: Option<u8>,
    pub video_bitrate: Option<String>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<String>,
    pub audio_sample_rate: Option<u32>,
    pub audio_channels: Option<u8>,
}
