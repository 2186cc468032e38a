//! Entry transitions for visual fragments
//!
//! Every transition runs on the resource's own timeline (its timestamps start
//! at zero after `setpts`), so `t` in the expressions below is seconds since
//! the resource appeared.

use crate::graph::fragment::Canvas;
use crate::graph::ir::{fmt_num, Filter};
use crate::resource::{ResourceDescriptor, Transition};

/// `0 → 1` over the transition, then held at 1
fn progress(td: f64) -> String {
    format!("min(1,t/{})", fmt_num(td))
}

/// `1 → 0` over the transition, then held at 0
fn remaining(td: f64) -> String {
    format!("max(0,1-t/{})", fmt_num(td))
}

fn fade_filters(transition: Transition, td: f64, duration: Option<f64>) -> Vec<Filter> {
    let mut filters = Vec::new();

    if matches!(transition, Transition::Fade | Transition::FadeIn) {
        filters.push(
            Filter::new("fade")
                .named("t", "in")
                .named("st", 0)
                .named("d", fmt_num(td)),
        );
    }

    if matches!(transition, Transition::Fade | Transition::FadeOut) {
        if let Some(duration) = duration {
            let td = td.min(duration);
            filters.push(
                Filter::new("fade")
                    .named("t", "out")
                    .named("st", fmt_num((duration - td).max(0.0)))
                    .named("d", fmt_num(td)),
            );
        }
    }

    filters
}

/// Double the canvas along the slide axis, park the content on one half and
/// move a canvas-sized window across so the content travels in from off-canvas
fn slide_filters(transition: Transition, td: f64, canvas: &Canvas) -> Vec<Filter> {
    let (w, h) = (canvas.width, canvas.height);

    // (pad w, pad h, content x, content y, window x, window y)
    let (pad_w, pad_h, x, y, window_x, window_y) = match transition {
        Transition::SlideLeft => (2 * w, h, w, 0, format!("{}*{}", w, progress(td)), "0".to_string()),
        Transition::SlideRight => (2 * w, h, 0, 0, format!("{}*{}", w, remaining(td)), "0".to_string()),
        Transition::SlideUp => (w, 2 * h, 0, h, "0".to_string(), format!("{}*{}", h, progress(td))),
        Transition::SlideDown => (w, 2 * h, 0, 0, "0".to_string(), format!("{}*{}", h, remaining(td))),
        _ => return Vec::new(),
    };

    vec![
        Filter::new("pad")
            .named("w", pad_w)
            .named("h", pad_h)
            .named("x", x)
            .named("y", y)
            .named("color", &canvas.background),
        Filter::new("crop")
            .named("w", w)
            .named("h", h)
            .named("x", window_x)
            .named("y", window_y),
    ]
}

/// Per-frame scale from 0.5 (zoomIn) or 1.5 (zoomOut) to 1.0, kept at the canvas size
///
/// zoomIn shrinks the frame, so the `pad` after it re-evaluates its offsets on
/// every frame. zoomOut is a centered `zoompan` window emitting one frame per
/// input frame, which keeps the link size fixed.
fn zoom_filters(transition: Transition, td: f64, canvas: &Canvas) -> Vec<Filter> {
    let (w, h) = (canvas.width, canvas.height);

    match transition {
        Transition::ZoomIn => {
            let factor = format!("(0.5+0.5*{})", progress(td));
            vec![
                Filter::new("scale")
                    .named("w", format!("trunc({}*{}/2)*2", w, factor))
                    .named("h", format!("trunc({}*{}/2)*2", h, factor))
                    .named("eval", "frame"),
                Filter::new("pad")
                    .named("w", w)
                    .named("h", h)
                    .named("x", "(ow-iw)/2")
                    .named("y", "(oh-ih)/2")
                    .named("color", &canvas.background)
                    .named("eval", "frame"),
            ]
        }
        Transition::ZoomOut => {
            // zoompan exposes the input time as `it`, not `t`
            let progress = format!("min(1,it/{})", fmt_num(td));
            vec![Filter::new("zoompan")
                .named("z", format!("1.5-0.5*{}", progress))
                .named("x", "iw/2-iw/zoom/2")
                .named("y", "ih/2-ih/zoom/2")
                .named("d", 1)
                .named("s", format!("{}x{}", w, h))
                .named("fps", fmt_num(canvas.fps))]
        }
        _ => Vec::new(),
    }
}

/// Filters implementing the resource's transition; empty for `none`
pub fn transition_filters(resource: &ResourceDescriptor, canvas: &Canvas) -> Vec<Filter> {
    let td = resource.transition_duration;
    if td <= 0.0 {
        return Vec::new();
    }

    match resource.transition {
        Transition::None => Vec::new(),
        Transition::Fade | Transition::FadeIn | Transition::FadeOut => {
            fade_filters(resource.transition, td, resource.duration)
        }
        Transition::SlideLeft | Transition::SlideRight | Transition::SlideUp | Transition::SlideDown => {
            slide_filters(resource.transition, td, canvas)
        }
        Transition::ZoomIn | Transition::ZoomOut => zoom_filters(resource.transition, td, canvas),
    }
}
