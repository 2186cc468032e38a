//! # Image Tool
//!
//! ImageMagick invocations for single-image operations. Plain operations are
//! one `magick <in> <flags> <out>` call; watermarks first prepare an overlay
//! image in the staging directory and then composite it.

pub mod operations;
pub mod watermark;

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoder::{EncoderRunner, RunOutput};
use crate::error::Result;
use crate::resource::{random_file_name, StagedFiles};

pub use operations::{ImageOperation, ImageWatermark, TextWatermark};

/// Runs ImageMagick for one operation at a time
#[derive(Debug, Clone)]
pub struct ImageTool {
    magick: PathBuf,
    staging_dir: PathBuf,
    runner: EncoderRunner,
}

impl ImageTool {
    pub fn new<P: Into<PathBuf>, S: Into<PathBuf>>(magick: P, staging_dir: S, runner: EncoderRunner) -> Self {
        Self {
            magick: magick.into(),
            staging_dir: staging_dir.into(),
            runner,
        }
    }

    /// Argument list for a non-watermark operation
    pub fn operation_args(operation: &ImageOperation, input: &Path, output: &Path) -> Option<Vec<String>> {
        let flags = operation.magick_flags()?;
        let mut args = Vec::with_capacity(flags.len() + 2);
        args.push(input.to_string_lossy().into_owned());
        args.extend(flags);
        args.push(output.to_string_lossy().into_owned());
        Some(args)
    }

    /// Apply `operation` to `input`, writing `output`
    pub async fn apply(&self, operation: &ImageOperation, input: &Path, output: &Path) -> Result<()> {
        debug!("Applying {} to {:?}", operation.name(), input);

        if let Some(args) = Self::operation_args(operation, input, output) {
            self.run(args).await?;
            return Ok(());
        }

        // overlay is removed when `staged` drops, whichever way we leave
        let mut staged = StagedFiles::new();
        let overlay = self.staging_dir.join(random_file_name(Some("png")));
        staged.track(&overlay);

        match operation {
            ImageOperation::TextWatermark(mark) => {
                self.run(watermark::text_overlay_args(mark, &overlay)).await?;
                self.run(watermark::composite_args(input, &overlay, mark.position, mark.margin, output))
                    .await?;
            }
            ImageOperation::ImageWatermark(mark) => {
                self.run(watermark::image_overlay_args(mark, &overlay)).await?;
                self.run(watermark::composite_args(input, &overlay, mark.position, mark.margin, output))
                    .await?;
            }
            _ => {}
        }

        staged.cleanup();
        Ok(())
    }

    async fn run(&self, args: Vec<String>) -> Result<RunOutput> {
        self.runner.run_args(&self.magick, args).await
    }
}
