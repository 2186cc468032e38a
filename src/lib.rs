//! # Media-Compositor
//!
//! Compose images, videos and audio tracks into a single video by building an
//! FFmpeg filter graph and running the encoder, plus ImageMagick-driven
//! single-image processing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use media_compositor::{
//!     composition::{ComposeRequest, CompositionEngine},
//!     config::Config,
//!     encoder::EncoderLocator,
//!     resource::ResourceSpec,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let paths = EncoderLocator::from_config(&config.encoder).locate()?;
//!
//! let mut slide = ResourceSpec::new("slide.png");
//! slide.duration = Some(3.0);
//! let request = ComposeRequest {
//!     resources: vec![slide, ResourceSpec::new("music.mp3")],
//!     ..ComposeRequest::default()
//! };
//!
//! let engine = CompositionEngine::new(config, paths);
//! let outcome = engine.compose(&request, None).await?;
//! println!("{}", outcome.output_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Data flows one way through the library:
//!
//! - [`resource`] - request entries, classification and remote downloads
//! - [`graph`] - per-resource filter chains assembled into one filter graph
//! - [`encoder`] - output options, the encoder argument list and the process runner
//! - [`imaging`] - ImageMagick operations and watermarks
//! - [`composition`] - the engine orchestrating compose and processing requests
//! - [`storage`] - upload/output file areas
//! - [`config`] - configuration management
//!
//! ## Building a graph without running anything
//!
//! ```rust
//! use media_compositor::graph::{assemble, Canvas};
//! use media_compositor::resource::{ResourceDescriptor, ResourceKind};
//!
//! let resources = vec![
//!     ResourceDescriptor::new(ResourceKind::Image, "a.png").with_duration(2.0),
//!     ResourceDescriptor::new(ResourceKind::Video, "b.mp4"),
//! ];
//! let assembled = assemble(&resources, &Canvas::new(1280, 720, 25.0, "black")).unwrap();
//! assert!(assembled.graph.to_string().ends_with("concat=n=2:v=1:a=0[outv]"));
//! ```

pub mod composition;
pub mod config;
pub mod encoder;
pub mod error;
pub mod graph;
pub mod imaging;
pub mod resource;
pub mod storage;

// Re-export commonly used types for convenience
pub use crate::{
    composition::{ComposeRequest, CompositionEngine, ProcessRequest},
    config::Config,
    encoder::{EncoderLocator, EncoderPaths},
    error::{ComposerError, Result},
};
