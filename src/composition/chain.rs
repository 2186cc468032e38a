use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::encoder::{InvocationPlan, OutputOptions};
use crate::error::{CompositionError, Result};
use crate::graph::{fmt_num, Filter, FilterChain, FilterGraph, Pad, OUTPUT_VIDEO};
use crate::imaging::{ImageOperation, ImageTool, ImageWatermark, TextWatermark};
use crate::resource::{random_file_name, Anchor, Position, StagedFiles};

/// Apply an ordered list of operations to one resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRequest {
    /// Local path, upload name or URL
    pub source: String,

    pub operations: Vec<ImageOperation>,

    /// Stem of the result file; derived from the source when unset
    #[serde(default)]
    pub output_name: Option<String>,
}

impl ProcessRequest {
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(CompositionError::InvalidOperation {
                index: 0,
                details: "operation list is empty".to_string(),
            }
            .into());
        }
        for (index, operation) in self.operations.iter().enumerate() {
            operation.validate(index)?;
        }
        Ok(())
    }
}

/// Run each operation through ImageMagick, feeding every result into the next
///
/// Intermediate files live in `staging_dir` and are removed on every path.
pub async fn process_image(
    tool: &ImageTool,
    operations: &[ImageOperation],
    input: &Path,
    output: &Path,
    staging_dir: &Path,
) -> Result<()> {
    let extension = output.extension().and_then(|e| e.to_str());
    let mut staged = StagedFiles::new();
    let mut current: PathBuf = input.to_path_buf();

    for (index, operation) in operations.iter().enumerate() {
        let step_output = if index + 1 == operations.len() {
            output.to_path_buf()
        } else {
            let intermediate = staging_dir.join(random_file_name(extension));
            staged.track(&intermediate);
            intermediate
        };

        info!("   Step {}/{}: {}", index + 1, operations.len(), operation.name());
        tool.apply(operation, &current, &step_output).await?;
        current = step_output;
    }

    debug!("Removing {} intermediate files", staged.len());
    staged.cleanup();
    Ok(())
}

/// Horizontal offset expression for an overlay of width `inner` inside `outer`
fn offset_expr(anchor: Anchor, outer: &str, inner: &str, margin: u32) -> String {
    match anchor {
        Anchor::Start => margin.to_string(),
        Anchor::Middle => format!("({}-{})/2", outer, inner),
        Anchor::End => format!("{}-{}-{}", outer, inner, margin),
    }
}

fn drawtext(mark: &TextWatermark) -> Filter {
    Filter::new("drawtext")
        .named("text", &mark.text)
        .named("fontsize", mark.font_size)
        .named(
            "fontcolor",
            format!("{}@{}", mark.color, fmt_num(mark.opacity_percent / 100.0)),
        )
        .named("x", offset_expr(mark.position.horizontal(), "w", "text_w", mark.margin))
        .named("y", offset_expr(mark.position.vertical(), "h", "text_h", mark.margin))
}

/// Video filters equivalent to one operation
///
/// Image watermarks need a second input and quality is an encoder flag, so
/// both yield no filters here.
pub fn video_filters(operation: &ImageOperation) -> Vec<Filter> {
    match operation {
        ImageOperation::Resize { width, height, ignore_aspect } => {
            let w = width.map_or("-2".to_string(), |w| w.to_string());
            let h = height.map_or("-2".to_string(), |h| h.to_string());
            let mut scale = Filter::new("scale").named("w", w).named("h", h);
            if width.is_some() && height.is_some() && !ignore_aspect {
                scale = scale.named("force_original_aspect_ratio", "decrease");
            }
            vec![scale]
        }
        ImageOperation::Crop { width, height, x, y } => vec![Filter::new("crop")
            .named("w", width)
            .named("h", height)
            .named("x", x)
            .named("y", y)],
        ImageOperation::Rotate { degrees } => {
            let radians = fmt_num(degrees.to_radians());
            vec![Filter::new("rotate")
                .named("a", &radians)
                .named("ow", format!("rotw({})", radians))
                .named("oh", format!("roth({})", radians))
                .named("c", "black")]
        }
        ImageOperation::Flip => vec![Filter::new("vflip")],
        ImageOperation::Flop => vec![Filter::new("hflip")],
        ImageOperation::Grayscale => vec![Filter::new("hue").named("s", 0)],
        ImageOperation::Blur { sigma, .. } => {
            vec![Filter::new("gblur").named("sigma", fmt_num(*sigma))]
        }
        ImageOperation::Sharpen { radius, sigma } => {
            // matrix size must be odd and within 3..=23
            let size = 2 * radius.round().clamp(1.0, 11.0) as u32 + 1;
            vec![Filter::new("unsharp")
                .named("luma_msize_x", size)
                .named("luma_msize_y", size)
                .named("luma_amount", fmt_num(sigma.clamp(0.0, 5.0)))]
        }
        ImageOperation::Modulate { brightness, saturation, hue } => {
            let mut filters = vec![Filter::new("eq")
                .named("brightness", fmt_num((brightness - 100.0) / 100.0))
                .named("saturation", fmt_num(saturation / 100.0))];
            // 100 is unchanged, 0 and 200 are half a turn either way
            if (hue - 100.0).abs() > f64::EPSILON {
                filters.push(Filter::new("hue").named("h", fmt_num((hue - 100.0) * 1.8)));
            }
            filters
        }
        ImageOperation::TextWatermark(mark) => vec![drawtext(mark)],
        ImageOperation::Quality { .. } | ImageOperation::ImageWatermark(_) => Vec::new(),
    }
}

fn overlay_input(mark: &ImageWatermark, input: usize, output: Pad) -> FilterChain {
    FilterChain::linear(
        Pad::video(input),
        vec![
            Filter::new("scale")
                .named("w", format!("iw*{}", fmt_num(mark.scale_percent / 100.0)))
                .named("h", -1),
            Filter::new("format").arg("rgba"),
            Filter::new("colorchannelmixer").named("aa", fmt_num(mark.opacity_percent / 100.0)),
        ],
        output,
    )
}

fn overlay(position: Position, margin: u32) -> Filter {
    Filter::new("overlay")
        .named("x", offset_expr(position.horizontal(), "W", "w", margin))
        .named("y", offset_expr(position.vertical(), "H", "h", margin))
}

/// CRF for a 1-100 quality value
fn quality_to_crf(quality: u8) -> u8 {
    let quality = u32::from(quality.clamp(1, 100));
    ((100 - quality) * 51 / 100) as u8
}

/// One ffmpeg invocation applying every operation to a video
pub fn video_plan(
    ffmpeg: &Path,
    operations: &[ImageOperation],
    input: &Path,
    output: &Path,
    options: &OutputOptions,
) -> Result<InvocationPlan> {
    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];
    args.extend(["-i".to_string(), input.to_string_lossy().into_owned()]);

    let watermarks: Vec<&ImageWatermark> = operations
        .iter()
        .filter_map(|op| match op {
            ImageOperation::ImageWatermark(mark) => Some(mark),
            _ => None,
        })
        .collect();
    for mark in &watermarks {
        args.extend(["-i".to_string(), mark.source.to_string_lossy().into_owned()]);
    }

    if watermarks.is_empty() {
        let filters: Vec<String> =
            operations.iter().flat_map(video_filters).map(|f| f.to_string()).collect();
        if !filters.is_empty() {
            args.extend(["-vf".to_string(), filters.join(",")]);
        }
    } else {
        let mut graph = FilterGraph::new();
        let mut inputs = vec![Pad::video(0)];
        let mut filters = Vec::new();
        let mut marks = 0;

        for operation in operations {
            if let ImageOperation::ImageWatermark(mark) = operation {
                let base = Pad::label(format!("base{}", marks));
                let layer = Pad::label(format!("wm{}", marks));
                if filters.is_empty() && inputs == [Pad::video(0)] {
                    // nothing to apply before the first overlay
                    let null = vec![Filter::new("null")];
                    graph.push(FilterChain::linear(Pad::video(0), null, base.clone()));
                } else {
                    let pending = std::mem::take(&mut filters);
                    graph.push(FilterChain::new(inputs, pending, vec![base.clone()]));
                }
                graph.push(overlay_input(mark, marks + 1, layer.clone()));
                inputs = vec![base, layer];
                filters.push(overlay(mark.position, mark.margin));
                marks += 1;
            } else {
                filters.extend(video_filters(operation));
            }
        }
        graph.push(FilterChain::new(inputs, filters, vec![Pad::label(OUTPUT_VIDEO)]));

        args.extend(["-filter_complex".to_string(), graph.to_string()]);
        args.extend(["-map".to_string(), format!("[{}]", OUTPUT_VIDEO)]);
        args.extend(["-map".to_string(), "0:a?".to_string()]);
    }

    let quality = operations.iter().rev().find_map(|op| match op {
        ImageOperation::Quality { value } => Some(*value),
        _ => None,
    });

    args.extend(["-c:v".to_string(), options.video_codec.clone()]);
    if options.is_rate_distortion_codec() {
        if options.supports_preset() {
            args.extend(["-preset".to_string(), options.preset.clone()]);
        }
        match quality.map(quality_to_crf).or(options.crf) {
            Some(crf) => args.extend(["-crf".to_string(), crf.to_string()]),
            None => args.extend(["-b:v".to_string(), options.video_bitrate.clone()]),
        }
    } else {
        args.extend(["-b:v".to_string(), options.video_bitrate.clone()]);
    }
    args.extend(["-pix_fmt".to_string(), "yuv420p".to_string()]);
    args.extend(["-c:a".to_string(), "copy".to_string()]);
    args.push(output.to_string_lossy().into_owned());

    Ok(InvocationPlan::new(ffmpeg, args))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::EncoderRunner;

    fn plan(operations: &[ImageOperation]) -> InvocationPlan {
        video_plan(
            Path::new("ffmpeg"),
            operations,
            Path::new("in.mp4"),
            Path::new("out.mp4"),
            &OutputOptions::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_request_validation() {
        let empty = ProcessRequest {
            source: "a.png".to_string(),
            operations: Vec::new(),
            output_name: None,
        };
        assert!(empty.validate().is_err());

        let request: ProcessRequest = serde_json::from_str(
            r#"{"source": "a.png", "operations": [{"type": "flip"}, {"type": "quality", "value": 0}]}"#,
        )
        .unwrap();
        assert!(matches!(
            request.validate(),
            Err(crate::error::ComposerError::Composition(CompositionError::InvalidOperation {
                index: 1,
                ..
            }))
        ));
    }

    #[test]
    fn test_video_filter_chain() {
        let plan = plan(&[
            ImageOperation::Resize { width: Some(640), height: None, ignore_aspect: false },
            ImageOperation::Grayscale,
            ImageOperation::Flop,
            ImageOperation::Blur { radius: 0.0, sigma: 2.0 },
        ]);
        assert_eq!(
            plan.value_of("-vf"),
            Some("scale=w=640:h=-2,hue=s=0,hflip,gblur=sigma=2")
        );
        assert_eq!(plan.value_of("-filter_complex"), None);
        assert_eq!(plan.value_of("-crf"), Some("23"));
        assert_eq!(plan.args.last().unwrap(), "out.mp4");
    }

    #[test]
    fn test_modulate_and_sharpen() {
        let filters: Vec<String> = video_filters(&ImageOperation::Modulate {
            brightness: 120.0,
            saturation: 50.0,
            hue: 150.0,
        })
        .iter()
        .map(|f| f.to_string())
        .collect();
        assert_eq!(filters, vec!["eq=brightness=0.2:saturation=0.5", "hue=h=90"]);

        let sharpen = &video_filters(&ImageOperation::Sharpen { radius: 0.0, sigma: 1.0 })[0];
        assert_eq!(sharpen.to_string(), "unsharp=luma_msize_x=3:luma_msize_y=3:luma_amount=1");
    }

    #[test]
    fn test_huge_sharpen_radius_is_clamped() {
        let operation = ImageOperation::Sharpen { radius: 3.0e9, sigma: 1.0 };
        assert!(operation.validate(0).is_ok());

        let sharpen = &video_filters(&operation)[0];
        assert_eq!(sharpen.get("luma_msize_x"), Some("23"));
        assert_eq!(sharpen.get("luma_msize_y"), Some("23"));

        let middle = &video_filters(&ImageOperation::Sharpen { radius: 4.4, sigma: 1.0 })[0];
        assert_eq!(middle.get("luma_msize_x"), Some("9"));
    }

    #[test]
    fn test_text_watermark_drawtext() {
        let mut mark = TextWatermark::new("Hello World");
        mark.position = Position::TopLeft;
        mark.margin = 12;
        let filter = drawtext(&mark).to_string();
        assert!(filter.starts_with("drawtext=text='Hello World':fontsize=32:fontcolor=white@0.5"));
        assert!(filter.ends_with(":x=12:y=12"));
    }

    #[test]
    fn test_image_watermark_uses_overlay() {
        let plan = plan(&[
            ImageOperation::Grayscale,
            ImageOperation::ImageWatermark(ImageWatermark::new("logo.png")),
        ]);

        assert_eq!(plan.args.iter().filter(|a| *a == "-i").count(), 2);
        assert_eq!(
            plan.value_of("-filter_complex"),
            Some(
                "[0:v]hue=s=0[base0];\
                 [1:v]scale=w=iw*0.2:h=-1,format=rgba,colorchannelmixer=aa=0.5[wm0];\
                 [base0][wm0]overlay=x=W-w-10:y=H-h-10[outv]"
            )
        );
        assert_eq!(plan.value_of("-map"), Some("[outv]"));
        assert_eq!(plan.value_of("-vf"), None);
    }

    #[test]
    fn test_quality_maps_to_crf() {
        assert_eq!(quality_to_crf(100), 0);
        assert_eq!(quality_to_crf(1), 50);
        let plan = plan(&[ImageOperation::Quality { value: 80 }]);
        assert_eq!(plan.value_of("-crf"), Some("10"));
        assert_eq!(plan.value_of("-vf"), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_image_chain_cleans_intermediates() {
        let staging = tempfile::tempdir().unwrap();
        let tool = ImageTool::new("true", staging.path(), EncoderRunner::new());
        let operations = vec![
            ImageOperation::Grayscale,
            ImageOperation::Flip,
            ImageOperation::Quality { value: 90 },
        ];

        process_image(&tool, &operations, Path::new("in.png"), Path::new("out.png"), staging.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }
}
