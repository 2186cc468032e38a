//! # Filter Graph Builder
//!
//! Turns an ordered list of resources into one FFmpeg filter graph.
//!
//! - [`fragment`] - one chain per resource (placement, timing, audio volume/fades)
//! - [`transition`] - fade, slide and zoom entry effects
//! - [`assembler`] - concatenation, audio mixing and canonical output pads
//! - [`ir`] - the typed graph and its text serialization

pub mod assembler;
pub mod fragment;
pub mod ir;
pub mod transition;

pub use assembler::{assemble, expected_duration, AssembledGraph, OUTPUT_AUDIO, OUTPUT_VIDEO};
pub use fragment::{audio_fragment, visual_fragment, AudioSource, Canvas};
pub use ir::{fmt_num, Filter, FilterChain, FilterGraph, Pad};
