//! # Resources
//!
//! Request entries, their resolved descriptors, classification by kind and
//! the downloader that turns remote URLs into local staged files.

pub mod classifier;
pub mod download;
pub mod types;

pub use classifier::{
    classify, ensure_exists, kind_for_extension, kind_from_extension, partition, Indexed, Partition,
};
pub(crate) use download::url_extension;
pub use download::{is_remote, random_file_name, Downloader, StagedFiles};
pub use types::{
    Anchor, FadeMode, Position, ResourceDescriptor, ResourceKind, ResourceSpec, ScaleMode, Transition,
};
