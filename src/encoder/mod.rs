//! # Encoder
//!
//! Everything between an assembled filter graph and a finished file: output
//! settings, the ordered ffmpeg argument list, locating the external tools
//! and running them with progress reporting.

pub mod invocation;
pub mod locator;
pub mod options;
pub mod runner;

pub use invocation::{InvocationBuilder, InvocationPlan};
pub use locator::{EncoderLocator, EncoderPaths};
pub use options::{OutputOptions, OutputOverrides, MAX_CRF};
pub use runner::{EncoderRunner, Progress, ProgressParser, RunOutput};
