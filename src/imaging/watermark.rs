//! Two-step watermarking: prepare an overlay image, then composite it

use std::path::Path;

use crate::graph::fmt_num;
use crate::imaging::operations::{geometry, ImageWatermark, TextWatermark};
use crate::resource::Position;

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Flags scaling the alpha channel by `opacity_percent`
fn alpha_flags(opacity_percent: f64) -> Vec<String> {
    vec![
        "-alpha".to_string(),
        "set".to_string(),
        "-channel".to_string(),
        "A".to_string(),
        "-evaluate".to_string(),
        "multiply".to_string(),
        fmt_num(opacity_percent / 100.0),
        "+channel".to_string(),
    ]
}

/// Render the text on a transparent background
pub fn text_overlay_args(mark: &TextWatermark, overlay: &Path) -> Vec<String> {
    let mut args = vec![
        "-background".to_string(),
        "none".to_string(),
        "-fill".to_string(),
        mark.color.clone(),
        "-pointsize".to_string(),
        mark.font_size.to_string(),
        format!("label:{}", mark.text),
    ];
    args.extend(alpha_flags(mark.opacity_percent));
    args.push(path_arg(overlay));
    args
}

/// Scale the watermark image and fade it
pub fn image_overlay_args(mark: &ImageWatermark, overlay: &Path) -> Vec<String> {
    let mut args = vec![
        path_arg(&mark.source),
        "-resize".to_string(),
        format!("{}%", fmt_num(mark.scale_percent)),
    ];
    args.extend(alpha_flags(mark.opacity_percent));
    args.push(path_arg(overlay));
    args
}

/// Place `overlay` on `base` at the anchored position
pub fn composite_args(base: &Path, overlay: &Path, position: Position, margin: u32, output: &Path) -> Vec<String> {
    vec![
        path_arg(base),
        path_arg(overlay),
        "-gravity".to_string(),
        position.gravity().to_string(),
        "-geometry".to_string(),
        geometry(position, margin),
        "-composite".to_string(),
        path_arg(output),
    ]
}
