use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{ComposerError, Result};

/// Seconds used when a transition is requested without a duration
pub const DEFAULT_TRANSITION_DURATION: f64 = 1.0;

/// Seconds used when an audio fade is requested without a duration
pub const DEFAULT_FADE_DURATION: f64 = 1.0;

/// The three kinds of media a composition accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Image,
    Video,
    Audio,
}

impl ResourceKind {
    /// Images and videos end up on the video track
    pub fn is_visual(self) -> bool {
        matches!(self, Self::Image | Self::Video)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

/// How a visual resource is fitted into the output canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum ScaleMode {
    /// Shrink inside the canvas, keeping aspect ratio
    #[default]
    Fit,
    /// Grow to cover the canvas, keeping aspect ratio
    Fill,
    /// Cover the canvas and cut to its exact size
    Crop,
}

impl From<String> for ScaleMode {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fill" => Self::Fill,
            "crop" => Self::Crop,
            _ => Self::Fit,
        }
    }
}

/// Anchor of a visual resource inside the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum Position {
    #[default]
    Center,
    Top,
    Bottom,
    Left,
    Right,
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Horizontal or vertical placement along one axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

impl Position {
    /// Placement on the x axis
    pub fn horizontal(self) -> Anchor {
        match self {
            Self::Left | Self::TopLeft | Self::BottomLeft => Anchor::Start,
            Self::Right | Self::TopRight | Self::BottomRight => Anchor::End,
            _ => Anchor::Middle,
        }
    }

    /// Placement on the y axis
    pub fn vertical(self) -> Anchor {
        match self {
            Self::Top | Self::TopLeft | Self::TopRight => Anchor::Start,
            Self::Bottom | Self::BottomLeft | Self::BottomRight => Anchor::End,
            _ => Anchor::Middle,
        }
    }

    /// ImageMagick gravity name for this position
    pub fn gravity(self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::Top => "north",
            Self::Bottom => "south",
            Self::Left => "west",
            Self::Right => "east",
            Self::TopLeft => "northwest",
            Self::TopRight => "northeast",
            Self::BottomLeft => "southwest",
            Self::BottomRight => "southeast",
        }
    }
}

impl From<String> for Position {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "top" => Self::Top,
            "bottom" => Self::Bottom,
            "left" => Self::Left,
            "right" => Self::Right,
            "topleft" => Self::TopLeft,
            "topright" => Self::TopRight,
            "bottomleft" => Self::BottomLeft,
            "bottomright" => Self::BottomRight,
            _ => Self::Center,
        }
    }
}

/// Entry effect applied to a visual resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum Transition {
    #[default]
    None,
    Fade,
    FadeIn,
    FadeOut,
    SlideLeft,
    SlideRight,
    SlideUp,
    SlideDown,
    ZoomIn,
    ZoomOut,
}

impl From<String> for Transition {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "fade" => Self::Fade,
            "fadein" => Self::FadeIn,
            "fadeout" => Self::FadeOut,
            "slideleft" => Self::SlideLeft,
            "slideright" => Self::SlideRight,
            "slideup" => Self::SlideUp,
            "slidedown" => Self::SlideDown,
            "zoomin" => Self::ZoomIn,
            "zoomout" => Self::ZoomOut,
            _ => Self::None,
        }
    }
}

/// Audio fade applied at the start and/or end of an audio resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "String")]
pub enum FadeMode {
    #[default]
    None,
    In,
    Out,
    Both,
}

impl FadeMode {
    pub fn fades_in(self) -> bool {
        matches!(self, Self::In | Self::Both)
    }

    pub fn fades_out(self) -> bool {
        matches!(self, Self::Out | Self::Both)
    }
}

impl From<String> for FadeMode {
    fn from(name: String) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "in" => Self::In,
            "out" => Self::Out,
            "both" | "inout" => Self::Both,
            _ => Self::None,
        }
    }
}

/// One resource as it arrives in a compose request
///
/// `source` is either a local path or an `http(s)` URL. When `kind` is
/// omitted it is inferred from the file extension.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSpec {
    pub source: String,
    #[serde(rename = "type")]
    pub kind: Option<ResourceKind>,
    pub duration: Option<f64>,
    pub start_time: Option<f64>,
    pub transition: Transition,
    pub transition_duration: Option<f64>,
    pub position: Position,
    pub scale_mode: ScaleMode,
    pub rotation: f64,
    pub opacity: f64,
    pub fade: FadeMode,
    pub fade_duration: Option<f64>,
    pub volume: f64,
}

impl Default for ResourceSpec {
    fn default() -> Self {
        Self {
            source: String::new(),
            kind: None,
            duration: None,
            start_time: None,
            transition: Transition::None,
            transition_duration: None,
            position: Position::Center,
            scale_mode: ScaleMode::Fit,
            rotation: 0.0,
            opacity: 100.0,
            fade: FadeMode::None,
            fade_duration: None,
            volume: 100.0,
        }
    }
}

impl ResourceSpec {
    /// Convenience constructor used by callers that build requests in code
    pub fn new<S: Into<String>>(source: S) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }
}

/// A resolved resource: local file, known kind, all attributes filled in
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub source_path: PathBuf,
    pub duration: Option<f64>,
    pub start_time: Option<f64>,
    pub transition: Transition,
    pub transition_duration: f64,
    pub position: Position,
    pub scale_mode: ScaleMode,
    pub rotation_degrees: f64,
    pub opacity_percent: f64,
    pub fade_mode: FadeMode,
    pub fade_duration: f64,
    pub volume_percent: f64,
}

impl ResourceDescriptor {
    /// Create a descriptor with neutral attributes
    pub fn new<P: Into<PathBuf>>(kind: ResourceKind, source_path: P) -> Self {
        Self {
            kind,
            source_path: source_path.into(),
            duration: None,
            start_time: None,
            transition: Transition::None,
            transition_duration: DEFAULT_TRANSITION_DURATION,
            position: Position::Center,
            scale_mode: ScaleMode::Fit,
            rotation_degrees: 0.0,
            opacity_percent: 100.0,
            fade_mode: FadeMode::None,
            fade_duration: DEFAULT_FADE_DURATION,
            volume_percent: 100.0,
        }
    }

    /// Build a descriptor from a request entry and its resolved local path
    pub fn from_spec<P: Into<PathBuf>>(spec: &ResourceSpec, kind: ResourceKind, source_path: P) -> Self {
        Self {
            kind,
            source_path: source_path.into(),
            duration: spec.duration,
            start_time: spec.start_time,
            transition: spec.transition,
            transition_duration: spec.transition_duration.unwrap_or(DEFAULT_TRANSITION_DURATION),
            position: spec.position,
            scale_mode: spec.scale_mode,
            rotation_degrees: spec.rotation,
            opacity_percent: spec.opacity,
            fade_mode: spec.fade,
            fade_duration: spec.fade_duration.unwrap_or(DEFAULT_FADE_DURATION),
            volume_percent: spec.volume,
        }
    }

    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }

    pub fn with_start_time(mut self, seconds: f64) -> Self {
        self.start_time = Some(seconds);
        self
    }

    pub fn with_transition(mut self, transition: Transition, seconds: f64) -> Self {
        self.transition = transition;
        self.transition_duration = seconds;
        self
    }

    pub fn is_visual(&self) -> bool {
        self.kind.is_visual()
    }

    /// Reject geometry and timing values that would produce a broken graph
    ///
    /// `index` is the position in the request and only used for the message.
    pub fn validate(&self, index: usize) -> Result<()> {
        let invalid = |details: String| Err(ComposerError::invalid_resource(index, details));

        for (name, value) in [("duration", self.duration), ("startTime", self.start_time)] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return invalid(format!("{} must be a non-negative number, got {}", name, v));
                }
            }
        }

        if self.kind == ResourceKind::Image && !self.duration.is_some_and(|d| d > 0.0) {
            return invalid("image resources need a positive duration".to_string());
        }

        if self.duration == Some(0.0) {
            return invalid("duration must be greater than zero".to_string());
        }

        if self.is_visual() {
            if !self.transition_duration.is_finite() || self.transition_duration < 0.0 {
                return invalid(format!(
                    "transitionDuration must be a non-negative number, got {}",
                    self.transition_duration
                ));
            }
            if !self.rotation_degrees.is_finite() {
                return invalid(format!("rotation must be finite, got {}", self.rotation_degrees));
            }
            if !(0.0..=100.0).contains(&self.opacity_percent) {
                return invalid(format!("opacity must be within 0-100, got {}", self.opacity_percent));
            }
        } else {
            if !self.volume_percent.is_finite() || self.volume_percent < 0.0 {
                return invalid(format!("volume must be a non-negative number, got {}", self.volume_percent));
            }
            if !self.fade_duration.is_finite() || self.fade_duration < 0.0 {
                return invalid(format!(
                    "fadeDuration must be a non-negative number, got {}",
                    self.fade_duration
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_names_fall_back_to_defaults() {
        assert_eq!(ScaleMode::from("stretch".to_string()), ScaleMode::Fit);
        assert_eq!(Position::from("middle".to_string()), Position::Center);
        assert_eq!(Transition::from("wipe".to_string()), Transition::None);
        assert_eq!(FadeMode::from("sideways".to_string()), FadeMode::None);
    }

    #[test]
    fn test_names_are_case_insensitive() {
        assert_eq!(Transition::from("slideLeft".to_string()), Transition::SlideLeft);
        assert_eq!(Transition::from("ZOOMOUT".to_string()), Transition::ZoomOut);
        assert_eq!(Position::from("bottom-right".to_string()), Position::BottomRight);
        assert_eq!(Position::from("topLeft".to_string()), Position::TopLeft);
    }

    #[test]
    fn test_spec_deserializes_from_camel_case_json() {
        let json = r#"{
            "source": "clips/intro.png",
            "type": "image",
            "duration": 3,
            "transition": "fade",
            "transitionDuration": 0.5,
            "scaleMode": "crop",
            "position": "bottomLeft"
        }"#;
        let spec: ResourceSpec = serde_json::from_str(json).unwrap();
        assert_eq!(spec.kind, Some(ResourceKind::Image));
        assert_eq!(spec.duration, Some(3.0));
        assert_eq!(spec.transition, Transition::Fade);
        assert_eq!(spec.scale_mode, ScaleMode::Crop);
        assert_eq!(spec.position, Position::BottomLeft);
        assert_eq!(spec.opacity, 100.0);
        assert_eq!(spec.volume, 100.0);
    }

    #[test]
    fn test_image_without_duration_is_rejected() {
        let image = ResourceDescriptor::new(ResourceKind::Image, "a.png");
        assert!(image.validate(0).is_err());
        assert!(image.clone().with_duration(0.0).validate(0).is_err());
        assert!(image.with_duration(2.0).validate(0).is_ok());
    }

    #[test]
    fn test_non_finite_values_are_rejected() {
        let mut video = ResourceDescriptor::new(ResourceKind::Video, "a.mp4");
        video.rotation_degrees = f64::NAN;
        assert!(video.validate(1).is_err());

        let video = ResourceDescriptor::new(ResourceKind::Video, "a.mp4").with_start_time(-1.0);
        assert!(video.validate(1).is_err());

        let mut audio = ResourceDescriptor::new(ResourceKind::Audio, "a.mp3");
        audio.volume_percent = f64::INFINITY;
        assert!(audio.validate(2).is_err());
    }

    #[test]
    fn test_opacity_out_of_range() {
        let mut video = ResourceDescriptor::new(ResourceKind::Video, "a.mp4");
        video.opacity_percent = 120.0;
        let err = video.validate(4).unwrap_err();
        assert!(err.to_string().contains("#4"));
    }
}
