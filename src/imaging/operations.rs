use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CompositionError, Result};
use crate::graph::fmt_num;
use crate::resource::Position;

/// One step of a processing chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ImageOperation {
    /// Fit into `width`x`height`; a missing side follows the aspect ratio
    Resize {
        width: Option<u32>,
        height: Option<u32>,
        #[serde(default)]
        ignore_aspect: bool,
    },
    Crop {
        width: u32,
        height: u32,
        #[serde(default)]
        x: u32,
        #[serde(default)]
        y: u32,
    },
    Rotate {
        degrees: f64,
    },
    /// Mirror top to bottom
    Flip,
    /// Mirror left to right
    Flop,
    Grayscale,
    Blur {
        #[serde(default)]
        radius: f64,
        sigma: f64,
    },
    Sharpen {
        #[serde(default)]
        radius: f64,
        sigma: f64,
    },
    /// Percentages where 100 leaves the channel unchanged
    Modulate {
        #[serde(default = "default_percent")]
        brightness: f64,
        #[serde(default = "default_percent")]
        saturation: f64,
        #[serde(default = "default_percent")]
        hue: f64,
    },
    /// Output quality 1-100
    Quality {
        value: u8,
    },
    TextWatermark(TextWatermark),
    ImageWatermark(ImageWatermark),
}

fn default_percent() -> f64 {
    100.0
}

fn default_opacity() -> f64 {
    50.0
}

fn default_margin() -> u32 {
    10
}

fn default_font_size() -> u32 {
    32
}

fn default_font_color() -> String {
    "white".to_string()
}

fn default_scale() -> f64 {
    20.0
}

/// Text rendered onto the resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextWatermark {
    pub text: String,

    #[serde(default = "default_position")]
    pub position: Position,

    #[serde(default = "default_font_size")]
    pub font_size: u32,

    #[serde(default = "default_font_color")]
    pub color: String,

    #[serde(default = "default_opacity")]
    pub opacity_percent: f64,

    /// Distance from the anchored edges, in pixels
    #[serde(default = "default_margin")]
    pub margin: u32,
}

/// Another image composited onto the resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageWatermark {
    pub source: PathBuf,

    #[serde(default = "default_position")]
    pub position: Position,

    /// Size relative to the watermark image itself
    #[serde(default = "default_scale")]
    pub scale_percent: f64,

    #[serde(default = "default_opacity")]
    pub opacity_percent: f64,

    #[serde(default = "default_margin")]
    pub margin: u32,
}

fn default_position() -> Position {
    Position::BottomRight
}

impl TextWatermark {
    pub fn new<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            position: default_position(),
            font_size: default_font_size(),
            color: default_font_color(),
            opacity_percent: default_opacity(),
            margin: default_margin(),
        }
    }
}

impl ImageWatermark {
    pub fn new<P: Into<PathBuf>>(source: P) -> Self {
        Self {
            source: source.into(),
            position: default_position(),
            scale_percent: default_scale(),
            opacity_percent: default_opacity(),
            margin: default_margin(),
        }
    }
}

/// Geometry offset for a gravity-anchored overlay; centered overlays ignore the margin
pub fn geometry(position: Position, margin: u32) -> String {
    match position {
        Position::Center => "+0+0".to_string(),
        _ => format!("+{}+{}", margin, margin),
    }
}

impl ImageOperation {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Resize { .. } => "resize",
            Self::Crop { .. } => "crop",
            Self::Rotate { .. } => "rotate",
            Self::Flip => "flip",
            Self::Flop => "flop",
            Self::Grayscale => "grayscale",
            Self::Blur { .. } => "blur",
            Self::Sharpen { .. } => "sharpen",
            Self::Modulate { .. } => "modulate",
            Self::Quality { .. } => "quality",
            Self::TextWatermark(_) => "textWatermark",
            Self::ImageWatermark(_) => "imageWatermark",
        }
    }

    /// Check parameters; `index` is the step's position in its chain
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |details: String| -> Result<()> {
            Err(CompositionError::InvalidOperation { index, details }.into())
        };
        let percent_ok = |value: f64| value.is_finite() && (0.0..=100.0).contains(&value);

        match self {
            Self::Resize { width, height, .. } => {
                if width.is_none() && height.is_none() {
                    return invalid("resize needs a width or a height".to_string());
                }
                if *width == Some(0) || *height == Some(0) {
                    return invalid("resize dimensions must be positive".to_string());
                }
            }
            Self::Crop { width, height, .. } if *width == 0 || *height == 0 => {
                return invalid("crop dimensions must be positive".to_string());
            }
            Self::Rotate { degrees } if !degrees.is_finite() => {
                return invalid(format!("rotation must be a number, got {}", degrees));
            }
            Self::Blur { radius, sigma } | Self::Sharpen { radius, sigma } => {
                if *radius < 0.0 || *sigma <= 0.0 || !radius.is_finite() || !sigma.is_finite() {
                    return invalid(format!("{} needs radius >= 0 and sigma > 0", self.name()));
                }
            }
            Self::Modulate { brightness, saturation, hue } => {
                let values = [*brightness, *saturation, *hue];
                if values.iter().any(|v| !v.is_finite() || *v < 0.0 || *v > 200.0) {
                    return invalid("modulate values must be within 0-200".to_string());
                }
            }
            Self::Quality { value } if *value == 0 || *value > 100 => {
                return invalid(format!("quality must be within 1-100, got {}", value));
            }
            Self::TextWatermark(mark) => {
                if mark.text.trim().is_empty() {
                    return invalid("watermark text must not be empty".to_string());
                }
                if mark.font_size == 0 || !percent_ok(mark.opacity_percent) {
                    return invalid("watermark needs a font size and an opacity within 0-100".to_string());
                }
            }
            Self::ImageWatermark(mark) => {
                if !mark.scale_percent.is_finite() || mark.scale_percent <= 0.0 {
                    return invalid(format!("watermark scale must be positive, got {}", mark.scale_percent));
                }
                if !percent_ok(mark.opacity_percent) {
                    return invalid(format!("watermark opacity must be within 0-100, got {}", mark.opacity_percent));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// ImageMagick flags placed between input and output; `None` for watermarks
    pub fn magick_flags(&self) -> Option<Vec<String>> {
        let flags = match self {
            Self::Resize { width, height, ignore_aspect } => {
                let mut geometry = match (width, height) {
                    (Some(w), Some(h)) => format!("{}x{}", w, h),
                    (Some(w), None) => w.to_string(),
                    (None, Some(h)) => format!("x{}", h),
                    (None, None) => String::new(),
                };
                if *ignore_aspect {
                    geometry.push('!');
                }
                vec!["-resize".to_string(), geometry]
            }
            Self::Crop { width, height, x, y } => vec![
                "-crop".to_string(),
                format!("{}x{}+{}+{}", width, height, x, y),
                "+repage".to_string(),
            ],
            Self::Rotate { degrees } => vec!["-rotate".to_string(), fmt_num(*degrees)],
            Self::Flip => vec!["-flip".to_string()],
            Self::Flop => vec!["-flop".to_string()],
            Self::Grayscale => vec!["-colorspace".to_string(), "Gray".to_string()],
            Self::Blur { radius, sigma } => {
                vec!["-blur".to_string(), format!("{}x{}", fmt_num(*radius), fmt_num(*sigma))]
            }
            Self::Sharpen { radius, sigma } => {
                vec!["-sharpen".to_string(), format!("{}x{}", fmt_num(*radius), fmt_num(*sigma))]
            }
            Self::Modulate { brightness, saturation, hue } => vec![
                "-modulate".to_string(),
                format!("{},{},{}", fmt_num(*brightness), fmt_num(*saturation), fmt_num(*hue)),
            ],
            Self::Quality { value } => vec!["-quality".to_string(), value.to_string()],
            Self::TextWatermark(_) | Self::ImageWatermark(_) => return None,
        };
        Some(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_operation_list() {
        let json = r#"[
            {"type": "resize", "width": 640},
            {"type": "crop", "width": 100, "height": 50, "x": 10},
            {"type": "grayscale"},
            {"type": "modulate", "brightness": 120},
            {"type": "textWatermark", "text": "(c) studio", "position": "top-left", "fontSize": 18}
        ]"#;
        let ops: Vec<ImageOperation> = serde_json::from_str(json).unwrap();

        assert_eq!(
            ops[0],
            ImageOperation::Resize { width: Some(640), height: None, ignore_aspect: false }
        );
        assert_eq!(ops[1], ImageOperation::Crop { width: 100, height: 50, x: 10, y: 0 });
        assert_eq!(ops[2], ImageOperation::Grayscale);
        assert_eq!(
            ops[3],
            ImageOperation::Modulate { brightness: 120.0, saturation: 100.0, hue: 100.0 }
        );
        match &ops[4] {
            ImageOperation::TextWatermark(mark) => {
                assert_eq!(mark.position, Position::TopLeft);
                assert_eq!(mark.font_size, 18);
                assert_eq!(mark.opacity_percent, 50.0);
            }
            other => panic!("unexpected operation: {:?}", other),
        }
    }

    #[test]
    fn test_magick_flags() {
        let resize = ImageOperation::Resize { width: None, height: Some(480), ignore_aspect: false };
        assert_eq!(resize.magick_flags().unwrap(), vec!["-resize", "x480"]);

        let stretch = ImageOperation::Resize { width: Some(320), height: Some(240), ignore_aspect: true };
        assert_eq!(stretch.magick_flags().unwrap(), vec!["-resize", "320x240!"]);

        let crop = ImageOperation::Crop { width: 100, height: 50, x: 5, y: 7 };
        assert_eq!(crop.magick_flags().unwrap(), vec!["-crop", "100x50+5+7", "+repage"]);

        let blur = ImageOperation::Blur { radius: 0.0, sigma: 2.5 };
        assert_eq!(blur.magick_flags().unwrap(), vec!["-blur", "0x2.5"]);

        let modulate = ImageOperation::Modulate { brightness: 110.0, saturation: 90.0, hue: 100.0 };
        assert_eq!(modulate.magick_flags().unwrap(), vec!["-modulate", "110,90,100"]);

        let mark = ImageOperation::TextWatermark(TextWatermark::new("hello"));
        assert!(mark.magick_flags().is_none());
    }

    #[test]
    fn test_validation() {
        assert!(ImageOperation::Resize { width: None, height: None, ignore_aspect: false }
            .validate(0)
            .is_err());
        assert!(ImageOperation::Quality { value: 0 }.validate(0).is_err());
        assert!(ImageOperation::Quality { value: 85 }.validate(0).is_ok());
        assert!(ImageOperation::Blur { radius: 0.0, sigma: 0.0 }.validate(0).is_err());
        assert!(ImageOperation::TextWatermark(TextWatermark::new("  ")).validate(0).is_err());

        let mut mark = ImageWatermark::new("logo.png");
        mark.opacity_percent = 150.0;
        match ImageOperation::ImageWatermark(mark).validate(3) {
            Err(crate::error::ComposerError::Composition(CompositionError::InvalidOperation { index, .. })) => {
                assert_eq!(index, 3)
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_geometry() {
        assert_eq!(geometry(Position::Center, 10), "+0+0");
        assert_eq!(geometry(Position::BottomRight, 12), "+12+12");
    }
}
