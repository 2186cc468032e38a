//! Per-resource filter chains
//!
//! Every visual resource becomes one chain from its input stream to a unique
//! output pad: fit into the canvas, place, rotate, fade the alpha, pin the frame
//! rate, run its transition and finally reset the sample aspect. Audio resources get a shorter chain for
//! volume and fades, or no chain at all when nothing applies.

use crate::encoder::OutputOptions;
use crate::error::{ComposerError, Result};
use crate::graph::ir::{fmt_num, Filter, FilterChain, Pad};
use crate::graph::transition::transition_filters;
use crate::resource::{Anchor, Indexed, ResourceKind, ScaleMode};

/// Geometry and timing every visual fragment is normalized to
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub background: String,
}

impl Canvas {
    pub fn new(width: u32, height: u32, fps: f64, background: impl Into<String>) -> Self {
        Self {
            width,
            height,
            fps,
            background: background.into(),
        }
    }

    pub fn from_options(options: &OutputOptions) -> Self {
        Self::new(options.width, options.height, options.fps, options.background_color.clone())
    }
}

/// Offset of the smaller side inside the larger one along one axis
///
/// Used both for `pad` (input inside output) and for `crop` (window inside input).
fn anchored_offset(anchor: Anchor, outer: &str, inner: &str) -> String {
    match anchor {
        Anchor::Start => "0".to_string(),
        Anchor::Middle => format!("({}-{})/2", outer, inner),
        Anchor::End => format!("{}-{}", outer, inner),
    }
}

/// Scale, pad, rotate and opacity filters shared by images and videos
fn placement_filters(item: Indexed<'_>, canvas: &Canvas) -> Vec<Filter> {
    let resource = item.resource;
    let (w, h) = (canvas.width, canvas.height);
    let mut filters = Vec::new();

    let aspect = match resource.scale_mode {
        ScaleMode::Fit => "decrease",
        ScaleMode::Fill | ScaleMode::Crop => "increase",
    };
    filters.push(
        Filter::new("scale")
            .named("w", w)
            .named("h", h)
            .named("force_original_aspect_ratio", aspect),
    );

    match resource.scale_mode {
        ScaleMode::Fit => {}
        ScaleMode::Fill => filters.push(
            Filter::new("crop")
                .named("w", w)
                .named("h", h)
                .named("x", anchored_offset(resource.position.horizontal(), "iw", "ow"))
                .named("y", anchored_offset(resource.position.vertical(), "ih", "oh")),
        ),
        ScaleMode::Crop => filters.push(Filter::new("crop").named("w", w).named("h", h)),
    }

    filters.push(
        Filter::new("pad")
            .named("w", w)
            .named("h", h)
            .named("x", anchored_offset(resource.position.horizontal(), "ow", "iw"))
            .named("y", anchored_offset(resource.position.vertical(), "oh", "ih"))
            .named("color", &canvas.background),
    );

    if resource.rotation_degrees % 360.0 != 0.0 {
        filters.push(
            Filter::new("rotate")
                .named("a", fmt_num(resource.rotation_degrees.to_radians()))
                .named("ow", w)
                .named("oh", h)
                .named("c", &canvas.background),
        );
    }

    if resource.opacity_percent < 100.0 {
        filters.push(Filter::new("format").arg("rgba"));
        filters.push(
            Filter::new("colorchannelmixer").named("aa", fmt_num(resource.opacity_percent / 100.0)),
        );
    }

    filters
}

/// Build the chain for one image or video, ending at `output`
///
/// The resource must already have passed `ResourceDescriptor::validate`.
pub fn visual_fragment(item: Indexed<'_>, canvas: &Canvas, output: Pad) -> Result<FilterChain> {
    let resource = item.resource;
    let mut filters = Vec::new();

    if resource.kind == ResourceKind::Image {
        filters.push(Filter::new("loop").named("loop", -1).named("size", 1).named("start", 0));
    }

    filters.extend(placement_filters(item, canvas));
    filters.push(Filter::new("fps").arg(fmt_num(canvas.fps)));

    if resource.kind == ResourceKind::Image {
        let duration = resource.duration.ok_or_else(|| {
            ComposerError::invalid_resource(item.index, "image resources need a positive duration")
        })?;
        filters.push(Filter::new("trim").named("duration", fmt_num(duration)));
    }
    filters.push(Filter::new("setpts").arg("PTS-STARTPTS"));

    filters.extend(transition_filters(resource, canvas));
    // last, so a transition's rounding can't leave a stray aspect for concat
    filters.push(Filter::new("setsar").arg(1));

    Ok(FilterChain::linear(Pad::video(item.index), filters, output))
}

/// Where an audio resource enters the mix
#[derive(Debug, Clone, PartialEq)]
pub enum AudioSource {
    /// Volume or fades apply; `chain` ends at `output`
    Filtered { chain: FilterChain, output: Pad },
    /// Nothing to do; the input stream is used as is
    Raw(Pad),
}

impl AudioSource {
    pub fn pad(&self) -> Pad {
        match self {
            Self::Filtered { output, .. } => output.clone(),
            Self::Raw(pad) => pad.clone(),
        }
    }
}

/// Build the volume/fade chain for one audio resource, labelled `a<index>`
pub fn audio_fragment(item: Indexed<'_>) -> AudioSource {
    let resource = item.resource;
    let mut filters = Vec::new();

    if resource.volume_percent != 100.0 {
        filters.push(Filter::new("volume").arg(fmt_num(resource.volume_percent / 100.0)));
    }

    let fade = match resource.duration {
        Some(duration) => resource.fade_duration.min(duration),
        None => resource.fade_duration,
    };

    if fade > 0.0 {
        if resource.fade_mode.fades_in() {
            filters.push(
                Filter::new("afade")
                    .named("t", "in")
                    .named("st", 0)
                    .named("d", fmt_num(fade)),
            );
        }
        if let (true, Some(duration)) = (resource.fade_mode.fades_out(), resource.duration) {
            filters.push(
                Filter::new("afade")
                    .named("t", "out")
                    .named("st", fmt_num((duration - fade).max(0.0)))
                    .named("d", fmt_num(fade)),
            );
        }
    }

    if filters.is_empty() {
        AudioSource::Raw(Pad::audio(item.index))
    } else {
        let output = Pad::label(format!("a{}", item.index));
        AudioSource::Filtered {
            chain: FilterChain::linear(Pad::audio(item.index), filters, output.clone()),
            output,
        }
    }
}
