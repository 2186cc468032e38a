use std::path::{Path, PathBuf};

use tracing::debug;

use crate::encoder::options::OutputOptions;
use crate::error::Result;
use crate::graph::{assemble, fmt_num, AssembledGraph, Canvas};
use crate::resource::{partition, ResourceDescriptor, ResourceKind};

/// Pixel format every output is forced to for player compatibility
const OUTPUT_PIXEL_FORMAT: &str = "yuv420p";

/// A ready-to-run external process invocation
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationPlan {
    pub program: PathBuf,
    pub args: Vec<String>,

    /// Seconds of output the process is expected to produce, for progress
    pub expected_duration: Option<f64>,
}

impl InvocationPlan {
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            expected_duration: None,
        }
    }

    /// The invocation as a single shell-quoted line
    pub fn command_line(&self) -> String {
        let program = self.program.to_string_lossy();
        shell_words::join(std::iter::once(program.as_ref()).chain(self.args.iter().map(String::as_str)))
    }

    /// Argument following the first occurrence of `flag`
    pub fn value_of(&self, flag: &str) -> Option<&str> {
        let position = self.args.iter().position(|arg| arg == flag)?;
        self.args.get(position + 1).map(String::as_str)
    }
}

/// Serializes resources, options and the assembled graph into encoder arguments
pub struct InvocationBuilder<'a> {
    program: PathBuf,
    options: &'a OutputOptions,
    threads: usize,
}

impl<'a> InvocationBuilder<'a> {
    pub fn new<P: Into<PathBuf>>(program: P, options: &'a OutputOptions) -> Self {
        Self {
            program: program.into(),
            options,
            threads: 0,
        }
    }

    /// Pass `-threads`; 0 leaves the choice to the encoder
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    /// Validate the options, assemble the graph and produce the full argument list
    pub fn build(&self, resources: &[ResourceDescriptor], destination: &Path) -> Result<InvocationPlan> {
        self.options.validate()?;
        let assembled = assemble(resources, &Canvas::from_options(self.options))?;
        Ok(self.build_with_graph(resources, &assembled, destination))
    }

    /// Produce the argument list for an already assembled graph
    pub fn build_with_graph(
        &self,
        resources: &[ResourceDescriptor],
        assembled: &AssembledGraph,
        destination: &Path,
    ) -> InvocationPlan {
        let options = self.options;
        let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

        for resource in resources {
            // seek/limit flags bind to the next -i, so they must come first
            if resource.kind != ResourceKind::Image {
                if let Some(start) = resource.start_time {
                    args.extend(["-ss".to_string(), fmt_num(start)]);
                }
                if let Some(duration) = resource.duration {
                    args.extend(["-t".to_string(), fmt_num(duration)]);
                }
            }
            args.extend(["-i".to_string(), resource.source_path.to_string_lossy().into_owned()]);
        }

        args.extend(["-filter_complex".to_string(), assembled.graph.to_string()]);
        args.extend(["-map".to_string(), assembled.video_output.map_selector()]);

        let copy_video_audio = match &assembled.audio_output {
            Some(pad) => {
                args.extend(["-map".to_string(), pad.map_selector()]);
                false
            }
            None => match partition(resources).first_video() {
                Some(video) => {
                    args.extend(["-map".to_string(), format!("{}:a?", video.index)]);
                    true
                }
                None => false,
            },
        };

        args.extend(["-c:v".to_string(), options.video_codec.clone()]);
        if options.is_rate_distortion_codec() {
            if options.supports_preset() {
                args.extend(["-preset".to_string(), options.preset.clone()]);
            }
            match options.crf {
                Some(crf) => args.extend(["-crf".to_string(), crf.to_string()]),
                None => args.extend(["-b:v".to_string(), options.video_bitrate.clone()]),
            }
        } else {
            args.extend(["-b:v".to_string(), options.video_bitrate.clone()]);
        }
        args.extend(["-pix_fmt".to_string(), OUTPUT_PIXEL_FORMAT.to_string()]);
        args.extend(["-r".to_string(), fmt_num(options.fps)]);

        if self.threads > 0 {
            args.extend(["-threads".to_string(), self.threads.to_string()]);
        }

        if assembled.audio_output.is_some() {
            args.extend([
                "-c:a".to_string(),
                options.audio_codec.clone(),
                "-b:a".to_string(),
                options.audio_bitrate.clone(),
                "-ar".to_string(),
                options.audio_sample_rate.to_string(),
                "-ac".to_string(),
                options.audio_channels.to_string(),
            ]);
        } else if copy_video_audio {
            args.extend(["-c:a".to_string(), "copy".to_string()]);
        }

        args.push("-shortest".to_string());
        args.push(destination.to_string_lossy().into_owned());

        debug!("Built invocation with {} arguments", args.len());

        InvocationPlan {
            program: self.program.clone(),
            args,
            expected_duration: assembled.expected_duration,
        }
    }
}
